use std::collections::{HashMap, HashSet};

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::models::event::{
    validate_comment, validate_duration, validate_event_name, EventAccess, EventRecord,
    EventView, EVENT_SELECT,
};
use crate::models::member::{MemberSummary, Role, Viewer};
use crate::models::task::{ensure_no_task, NewTask, Task, TaskPatch};
use crate::relations::{replace_links, EVENT_MEMBERS};
use crate::tasks::{fetch_task, remove_task, update_task_with_access};
use crate::AppState;

// ============================================================================
// Payloads and projections
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub event_type_id: i32,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_content_hidden: bool,
    #[serde(default)]
    pub venue_or_link: String,
    pub participant_ids: Option<Vec<i32>>,
    pub task: Option<NewTask>,
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_event_name(&self.name)?;
        validate_duration(self.duration_minutes)?;
        if let Some(task) = &self.task {
            task.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub event_type_id: Option<i32>,
    pub name: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub content: Option<String>,
    pub is_content_hidden: Option<bool>,
    pub venue_or_link: Option<String>,
    /// Absent leaves attendees alone; `[]` removes all of them.
    pub participant_ids: Option<Vec<i32>>,
}

impl UpdateEventRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_event_name(name)?;
        }
        // A present zero is rejected, never treated as "unchanged".
        if let Some(duration) = self.duration_minutes {
            validate_duration(duration)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub is_attending: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceView {
    pub event_id: i32,
    pub member: MemberSummary,
    pub is_attending: bool,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i32,
    pub event_id: i32,
    pub author: MemberSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct ResponseRow {
    event_id: i32,
    is_attending: bool,
    responded_at: DateTime<Utc>,
    id: i32,
    surname: String,
    name: String,
    email: String,
    role: Role,
}

impl From<ResponseRow> for AttendanceView {
    fn from(row: ResponseRow) -> Self {
        AttendanceView {
            event_id: row.event_id,
            member: MemberSummary {
                id: row.id,
                surname: row.surname,
                name: row.name,
                email: row.email,
                role: row.role,
            },
            is_attending: row.is_attending,
            responded_at: row.responded_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    comment_id: i32,
    event_id: i32,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    id: i32,
    surname: String,
    name: String,
    email: String,
    role: Role,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        CommentView {
            id: row.comment_id,
            event_id: row.event_id,
            author: MemberSummary {
                id: row.id,
                surname: row.surname,
                name: row.name,
                email: row.email,
                role: row.role,
            },
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COMMENT_SELECT: &str = "SELECT c.id AS comment_id, c.event_id, c.content, c.created_at,
        c.updated_at, m.id, m.surname, m.name, m.email, m.role
 FROM event_comments c
 JOIN members m ON m.id = c.member_id";

#[derive(Debug, FromRow)]
struct EventMemberLink {
    event_id: i32,
    member_id: i32,
}

// ============================================================================
// Shared lookups
// ============================================================================

/// Creator, attendees and visibility flag of an event, or `None` if it does
/// not exist.
pub(crate) async fn event_access(
    conn: &mut PgConnection,
    event_id: i32,
) -> Result<Option<EventAccess>, ApiError> {
    let header = sqlx::query_as::<_, (i32, bool)>(
        "SELECT creator_id, is_content_hidden FROM events WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (creator_id, is_content_hidden) = match header {
        Some(header) => header,
        None => return Ok(None),
    };

    let attendee_ids = sqlx::query_scalar::<_, i32>(
        "SELECT member_id FROM event_members WHERE event_id = $1 ORDER BY member_id",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(EventAccess {
        creator_id,
        attendee_ids,
        is_content_hidden,
    }))
}

async fn require_event_access(
    conn: &mut PgConnection,
    event_id: i32,
) -> Result<EventAccess, ApiError> {
    event_access(conn, event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event".to_string()))
}

async fn load_event_view(
    conn: &mut PgConnection,
    event_id: i32,
    viewer: &Viewer,
) -> Result<Option<EventView>, ApiError> {
    let query = format!("{} WHERE e.id = $1", EVENT_SELECT);
    let record = match sqlx::query_as::<_, EventRecord>(&query)
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
    {
        Some(record) => record,
        None => return Ok(None),
    };

    let participant_ids = sqlx::query_scalar::<_, i32>(
        "SELECT member_id FROM event_members WHERE event_id = $1 ORDER BY member_id",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    let has_task = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tasks WHERE id = $1)")
        .bind(event_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(Some(EventView::project(record, participant_ids, has_task, viewer)))
}

/// A task committed by a concurrent request between our check and this
/// insert still surfaces as `TaskAlreadyExists`.
async fn insert_task(conn: &mut PgConnection, event_id: i32, task: &NewTask) -> Result<Task, ApiError> {
    sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (id, name, due_at, content)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (id) DO NOTHING
         RETURNING id, name, due_at, content, is_completed, completed_at, created_at, updated_at",
    )
    .bind(event_id)
    .bind(task.name.trim())
    .bind(task.due_at)
    .bind(&task.content)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ApiError::TaskAlreadyExists)
}

// ============================================================================
// Event Routes
// ============================================================================

#[get("/api/events")]
async fn list_events(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<ListEventsQuery>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;

    let sql = format!(
        "{} WHERE ($1::timestamptz IS NULL OR e.starts_at >= $1)
           AND ($2::timestamptz IS NULL OR e.starts_at <= $2)
         ORDER BY e.starts_at, e.id",
        EVENT_SELECT
    );
    let records = sqlx::query_as::<_, EventRecord>(&sql)
        .bind(query.start_date)
        .bind(query.end_date)
        .fetch_all(&app_state.db)
        .await?;

    let ids: Vec<i32> = records.iter().map(|r| r.id).collect();

    let links = sqlx::query_as::<_, EventMemberLink>(
        "SELECT event_id, member_id FROM event_members WHERE event_id = ANY($1) ORDER BY member_id",
    )
    .bind(&ids)
    .fetch_all(&app_state.db)
    .await?;

    let mut participants: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in links {
        participants.entry(link.event_id).or_default().push(link.member_id);
    }

    let with_task: HashSet<i32> =
        sqlx::query_scalar::<_, i32>("SELECT id FROM tasks WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&app_state.db)
            .await?
            .into_iter()
            .collect();

    let events: Vec<EventView> = records
        .into_iter()
        .map(|record| {
            let participant_ids = participants.remove(&record.id).unwrap_or_default();
            let has_task = with_task.contains(&record.id);
            EventView::project(record, participant_ids, has_task, &viewer)
        })
        .collect();

    Ok(HttpResponse::Ok().json(events))
}

#[post("/api/events")]
async fn create_event(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    payload: web::Json<CreateEventRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let payload = payload.into_inner();
    payload.validate()?;

    let mut tx = app_state.db.begin().await?;

    let event_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO events (event_type_id, name, starts_at, duration_minutes, content,
                             is_content_hidden, venue_or_link, creator_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id",
    )
    .bind(payload.event_type_id)
    .bind(payload.name.trim())
    .bind(payload.starts_at)
    .bind(payload.duration_minutes)
    .bind(&payload.content)
    .bind(payload.is_content_hidden)
    .bind(&payload.venue_or_link)
    .bind(viewer.member_id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(participant_ids) = &payload.participant_ids {
        replace_links(&mut tx, &EVENT_MEMBERS, event_id, participant_ids).await?;
    }
    if let Some(task) = &payload.task {
        insert_task(&mut tx, event_id, task).await?;
    }

    let event = load_event_view(&mut tx, event_id, &viewer)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event".to_string()))?;
    tx.commit().await?;

    info!("Event {} created by member {}", event_id, viewer.member_id);

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/events/{}", event_id)))
        .json(event))
}

#[get("/api/events/{id}")]
async fn get_event(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let mut conn = app_state.db.acquire().await?;

    let event = load_event_view(&mut conn, path.into_inner(), &viewer)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event".to_string()))?;

    Ok(HttpResponse::Ok().json(event))
}

#[put("/api/events/{id}")]
async fn update_event(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<UpdateEventRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();
    payload.validate()?;

    let mut tx = app_state.db.begin().await?;
    require_event_access(&mut tx, event_id)
        .await?
        .ensure_can_manage(&viewer)?;

    sqlx::query(
        "UPDATE events SET
            event_type_id = COALESCE($2, event_type_id),
            name = COALESCE($3, name),
            starts_at = COALESCE($4, starts_at),
            duration_minutes = COALESCE($5, duration_minutes),
            content = COALESCE($6, content),
            is_content_hidden = COALESCE($7, is_content_hidden),
            venue_or_link = COALESCE($8, venue_or_link),
            updated_at = NOW()
         WHERE id = $1",
    )
    .bind(event_id)
    .bind(payload.event_type_id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.starts_at)
    .bind(payload.duration_minutes)
    .bind(payload.content.as_deref())
    .bind(payload.is_content_hidden)
    .bind(payload.venue_or_link.as_deref())
    .execute(&mut *tx)
    .await?;

    if let Some(participant_ids) = &payload.participant_ids {
        replace_links(&mut tx, &EVENT_MEMBERS, event_id, participant_ids).await?;
    }

    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/events/{id}")]
async fn delete_event(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    require_event_access(&mut tx, event_id)
        .await?
        .ensure_can_manage(&viewer)?;

    // Task, attendees, responses and comments go with it.
    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(event_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Event {} deleted by member {}", event_id, viewer.member_id);
    Ok(HttpResponse::Ok().finish())
}

// ============================================================================
// Event task
// ============================================================================

#[get("/api/events/{id}/task")]
async fn get_event_task(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();
    let mut conn = app_state.db.acquire().await?;

    require_event_access(&mut conn, event_id)
        .await?
        .ensure_access(&viewer)?;

    let task = fetch_task(&mut conn, event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task".to_string()))?;

    Ok(HttpResponse::Ok().json(task))
}

#[post("/api/events/{id}/task")]
async fn create_event_task(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<NewTask>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();
    payload.validate()?;

    let mut tx = app_state.db.begin().await?;
    require_event_access(&mut tx, event_id)
        .await?
        .ensure_can_manage(&viewer)?;

    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM tasks WHERE id = $1")
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;
    ensure_no_task(existing)?;

    let task = insert_task(&mut tx, event_id, &payload).await?;
    tx.commit().await?;

    info!("Task added to event {} by member {}", event_id, viewer.member_id);

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/tasks/{}", task.id)))
        .json(task))
}

#[put("/api/events/{id}/task")]
async fn update_event_task(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<TaskPatch>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();
    payload.validate()?;

    let mut tx = app_state.db.begin().await?;
    // The event must exist before the task lookup reports on it.
    require_event_access(&mut tx, event_id).await?;
    update_task_with_access(&mut tx, event_id, &viewer, &payload).await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/events/{id}/task")]
async fn delete_event_task(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    require_event_access(&mut tx, event_id).await?;
    remove_task(&mut tx, event_id, &viewer).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

// ============================================================================
// Attendance
// ============================================================================

#[put("/api/events/{id}/response")]
async fn respond_to_event(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<AttendanceRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    require_event_access(&mut tx, event_id)
        .await?
        .ensure_access(&viewer)?;

    sqlx::query(
        "INSERT INTO event_responses (event_id, member_id, is_attending)
         VALUES ($1, $2, $3)
         ON CONFLICT ON CONSTRAINT uq_event_responses_event_member
         DO UPDATE SET is_attending = EXCLUDED.is_attending, responded_at = NOW()",
    )
    .bind(event_id)
    .bind(viewer.member_id)
    .bind(payload.is_attending)
    .execute(&mut *tx)
    .await?;

    let response = sqlx::query_as::<_, ResponseRow>(
        "SELECT r.event_id, r.is_attending, r.responded_at,
                m.id, m.surname, m.name, m.email, m.role
         FROM event_responses r
         JOIN members m ON m.id = r.member_id
         WHERE r.event_id = $1 AND r.member_id = $2",
    )
    .bind(event_id)
    .bind(viewer.member_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(AttendanceView::from(response)))
}

#[get("/api/events/{id}/responses")]
async fn list_event_responses(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();
    let mut conn = app_state.db.acquire().await?;

    require_event_access(&mut conn, event_id)
        .await?
        .ensure_access(&viewer)?;

    let responses: Vec<AttendanceView> = sqlx::query_as::<_, ResponseRow>(
        "SELECT r.event_id, r.is_attending, r.responded_at,
                m.id, m.surname, m.name, m.email, m.role
         FROM event_responses r
         JOIN members m ON m.id = r.member_id
         WHERE r.event_id = $1
         ORDER BY r.responded_at, m.id",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(AttendanceView::from)
    .collect();

    Ok(HttpResponse::Ok().json(responses))
}

// ============================================================================
// Comments
// ============================================================================

#[get("/api/events/{id}/comments")]
async fn list_comments(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();
    let mut conn = app_state.db.acquire().await?;

    require_event_access(&mut conn, event_id)
        .await?
        .ensure_access(&viewer)?;

    let query = format!("{} WHERE c.event_id = $1 ORDER BY c.created_at, c.id", COMMENT_SELECT);
    let comments: Vec<CommentView> = sqlx::query_as::<_, CommentRow>(&query)
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(CommentView::from)
        .collect();

    Ok(HttpResponse::Ok().json(comments))
}

#[post("/api/events/{id}/comments")]
async fn create_comment(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<CommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let event_id = path.into_inner();
    validate_comment(&payload.content)?;

    let mut tx = app_state.db.begin().await?;
    require_event_access(&mut tx, event_id)
        .await?
        .ensure_access(&viewer)?;

    let comment_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO event_comments (event_id, member_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(event_id)
    .bind(viewer.member_id)
    .bind(payload.content.trim())
    .fetch_one(&mut *tx)
    .await?;

    let query = format!("{} WHERE c.id = $1", COMMENT_SELECT);
    let comment = sqlx::query_as::<_, CommentRow>(&query)
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created()
        .insert_header((
            "Location",
            format!("/api/events/{}/comments/{}", event_id, comment_id),
        ))
        .json(CommentView::from(comment)))
}

async fn comment_author(
    conn: &mut PgConnection,
    event_id: i32,
    comment_id: i32,
) -> Result<i32, ApiError> {
    sqlx::query_scalar::<_, i32>(
        "SELECT member_id FROM event_comments WHERE id = $1 AND event_id = $2",
    )
    .bind(comment_id)
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::NotFound("Comment".to_string()))
}

#[put("/api/events/{id}/comments/{comment_id}")]
async fn update_comment(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<(i32, i32)>,
    payload: web::Json<CommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let (event_id, comment_id) = path.into_inner();
    validate_comment(&payload.content)?;

    let mut tx = app_state.db.begin().await?;
    if comment_author(&mut tx, event_id, comment_id).await? != viewer.member_id {
        return Err(ApiError::Forbidden);
    }

    sqlx::query("UPDATE event_comments SET content = $2, updated_at = NOW() WHERE id = $1")
        .bind(comment_id)
        .bind(payload.content.trim())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/events/{id}/comments/{comment_id}")]
async fn delete_comment(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let (event_id, comment_id) = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    let author_id = comment_author(&mut tx, event_id, comment_id).await?;
    if author_id != viewer.member_id && !viewer.is_teacher() {
        return Err(ApiError::Forbidden);
    }

    sqlx::query("DELETE FROM event_comments WHERE id = $1")
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_events)
        .service(create_event)
        .service(get_event)
        .service(update_event)
        .service(delete_event)
        .service(get_event_task)
        .service(create_event_task)
        .service(update_event_task)
        .service(delete_event_task)
        .service(respond_to_event)
        .service(list_event_responses)
        .service(list_comments)
        .service(create_comment)
        .service(update_comment)
        .service(delete_comment);
}
