use std::collections::HashMap;

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::models::links::LinkDiff;
use crate::models::member::{MemberSummary, Role};
use crate::models::validate_bounded_text;
use crate::roles::helpers::{ensure_member_role, ensure_teacher};
use crate::AppState;

const GROUP_NAME_MAX_LEN: usize = 100;

#[derive(Debug, FromRow)]
struct GroupRecord {
    id: i32,
    name: String,
    teacher_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupView {
    pub id: i32,
    pub name: String,
    pub teacher: MemberSummary,
    pub students: Vec<MemberSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub teacher_id: i32,
    pub student_ids: Option<Vec<i32>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub teacher_id: Option<i32>,
    /// Absent leaves membership alone; `[]` empties the group.
    pub student_ids: Option<Vec<i32>>,
}

fn validate_group_name(name: &str) -> Result<(), ApiError> {
    validate_bounded_text("name", name, GROUP_NAME_MAX_LEN)
}

const GROUP_SELECT: &str = "SELECT id, name, teacher_id, created_at, updated_at FROM groups";

#[derive(Debug, FromRow)]
struct GroupStudentRow {
    group_id: i32,
    #[sqlx(flatten)]
    student: MemberSummary,
}

fn assemble_groups(
    records: Vec<GroupRecord>,
    teachers: Vec<MemberSummary>,
    students: Vec<GroupStudentRow>,
) -> Result<Vec<GroupView>, ApiError> {
    let teachers: HashMap<i32, MemberSummary> =
        teachers.into_iter().map(|t| (t.id, t)).collect();

    let mut students_by_group: HashMap<i32, Vec<MemberSummary>> = HashMap::new();
    for row in students {
        students_by_group
            .entry(row.group_id)
            .or_default()
            .push(row.student);
    }

    records
        .into_iter()
        .map(|group| {
            let teacher = teachers.get(&group.teacher_id).cloned().ok_or_else(|| {
                ApiError::Internal(format!(
                    "group {} references missing teacher {}",
                    group.id, group.teacher_id
                ))
            })?;
            Ok(GroupView {
                id: group.id,
                name: group.name,
                teacher,
                students: students_by_group.remove(&group.id).unwrap_or_default(),
                created_at: group.created_at,
                updated_at: group.updated_at,
            })
        })
        .collect()
}

/// Resolves teachers and students for all `records` in two queries.
async fn load_group_views(db: &PgPool, records: Vec<GroupRecord>) -> Result<Vec<GroupView>, ApiError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let group_ids: Vec<i32> = records.iter().map(|g| g.id).collect();
    let teacher_ids: Vec<i32> = records.iter().map(|g| g.teacher_id).collect();

    let teachers = sqlx::query_as::<_, MemberSummary>(
        "SELECT m.id, m.surname, m.name, m.email, m.role FROM members m WHERE m.id = ANY($1)",
    )
    .bind(&teacher_ids)
    .fetch_all(db)
    .await?;

    let students = sqlx::query_as::<_, GroupStudentRow>(
        "SELECT s.group_id, m.id, m.surname, m.name, m.email, m.role
         FROM members m
         JOIN students s ON s.id = m.id
         WHERE s.group_id = ANY($1)
         ORDER BY m.surname, m.name, m.id",
    )
    .bind(&group_ids)
    .fetch_all(db)
    .await?;

    assemble_groups(records, teachers, students)
}

async fn load_group(db: &PgPool, group_id: i32) -> Result<Option<GroupView>, ApiError> {
    let query = format!("{} WHERE id = $1", GROUP_SELECT);
    let group = match sqlx::query_as::<_, GroupRecord>(&query)
        .bind(group_id)
        .fetch_optional(db)
        .await?
    {
        Some(group) => group,
        None => return Ok(None),
    };

    Ok(load_group_views(db, vec![group]).await?.pop())
}

async fn ensure_group_exists(
    tx: &mut Transaction<'_, Postgres>,
    group_id: i32,
) -> Result<(), ApiError> {
    let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM groups WHERE id = $1)")
        .bind(group_id)
        .fetch_one(&mut **tx)
        .await?;

    if found {
        Ok(())
    } else {
        Err(ApiError::NotFound("Group".to_string()))
    }
}

/// Makes `student_ids` the exact membership of the group. Students dropped
/// from the list become ungrouped; listed students move in from wherever they
/// were. Unknown ids are ignored.
async fn replace_group_students(
    tx: &mut Transaction<'_, Postgres>,
    group_id: i32,
    student_ids: &[i32],
) -> Result<LinkDiff, ApiError> {
    let current = sqlx::query_scalar::<_, i32>("SELECT id FROM students WHERE group_id = $1")
        .bind(group_id)
        .fetch_all(&mut **tx)
        .await?;

    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM students WHERE id = ANY($1)")
        .bind(student_ids)
        .fetch_all(&mut **tx)
        .await?;

    let diff = LinkDiff::compute(&current, student_ids, &existing);

    if !diff.to_remove.is_empty() {
        sqlx::query("UPDATE students SET group_id = NULL WHERE id = ANY($1)")
            .bind(&diff.to_remove)
            .execute(&mut **tx)
            .await?;
    }
    if !diff.to_add.is_empty() {
        sqlx::query("UPDATE students SET group_id = $1 WHERE id = ANY($2)")
            .bind(group_id)
            .bind(&diff.to_add)
            .execute(&mut **tx)
            .await?;
    }

    debug!(
        "groups: group {} -{:?} +{:?}",
        group_id, diff.to_remove, diff.to_add
    );
    Ok(diff)
}

// ============================================================================
// Group Routes
// ============================================================================

#[get("/api/groups")]
async fn list_groups(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let query = format!("{} ORDER BY name, id", GROUP_SELECT);
    let records = sqlx::query_as::<_, GroupRecord>(&query)
        .fetch_all(&app_state.db)
        .await?;
    let groups = load_group_views(&app_state.db, records).await?;

    Ok(HttpResponse::Ok().json(groups))
}

#[post("/api/groups")]
async fn create_group(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    payload: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    validate_group_name(&payload.name)?;

    let mut tx = app_state.db.begin().await?;
    ensure_member_role(&mut tx, payload.teacher_id, Role::Teacher, "Teacher").await?;

    let group_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO groups (name, teacher_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(payload.name.trim())
    .bind(payload.teacher_id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(student_ids) = &payload.student_ids {
        replace_group_students(&mut tx, group_id, student_ids).await?;
    }

    tx.commit().await?;

    info!("Group {} created by member {}", group_id, viewer.member_id);

    let group = load_group(&app_state.db, group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group".to_string()))?;

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/groups/{}", group_id)))
        .json(group))
}

#[get("/api/groups/{id}")]
async fn get_group(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let group = load_group(&app_state.db, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Group".to_string()))?;

    Ok(HttpResponse::Ok().json(group))
}

#[put("/api/groups/{id}")]
async fn update_group(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<UpdateGroupRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let group_id = path.into_inner();

    if let Some(name) = &payload.name {
        validate_group_name(name)?;
    }

    let mut tx = app_state.db.begin().await?;
    ensure_group_exists(&mut tx, group_id).await?;

    if let Some(teacher_id) = payload.teacher_id {
        ensure_member_role(&mut tx, teacher_id, Role::Teacher, "Teacher").await?;
    }

    sqlx::query(
        "UPDATE groups SET
            name = COALESCE($2, name),
            teacher_id = COALESCE($3, teacher_id),
            updated_at = NOW()
         WHERE id = $1",
    )
    .bind(group_id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.teacher_id)
    .execute(&mut *tx)
    .await?;

    if let Some(student_ids) = &payload.student_ids {
        replace_group_students(&mut tx, group_id, student_ids).await?;
    }

    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/groups/{id}")]
async fn delete_group(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let group_id = path.into_inner();

    // Students still pointing at the group make the FK reject the delete.
    let result = sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(group_id)
        .execute(&app_state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Group".to_string()));
    }

    info!("Group {} deleted by member {}", group_id, viewer.member_id);
    Ok(HttpResponse::Ok().finish())
}

#[post("/api/groups/{id}/students/{student_id}")]
async fn add_group_student(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let (group_id, student_id) = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    ensure_group_exists(&mut tx, group_id).await?;

    let current_group = sqlx::query_scalar::<_, Option<i32>>(
        "SELECT group_id FROM students WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::NotFound("Student".to_string()))?;

    if current_group == Some(group_id) {
        return Err(ApiError::BadRequest(
            "Student is already in this group".to_string(),
        ));
    }

    sqlx::query("UPDATE students SET group_id = $2 WHERE id = $1")
        .bind(student_id)
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/groups/{id}/students/{student_id}")]
async fn remove_group_student(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let (group_id, student_id) = path.into_inner();

    let result = sqlx::query("UPDATE students SET group_id = NULL WHERE id = $1 AND group_id = $2")
        .bind(student_id)
        .bind(group_id)
        .execute(&app_state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Group student".to_string()));
    }

    Ok(HttpResponse::Ok().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_groups)
        .service(create_group)
        .service(get_group)
        .service(update_group)
        .service(delete_group)
        .service(add_group_student)
        .service(remove_group_student);
}
