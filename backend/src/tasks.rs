use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;
use sqlx::PgConnection;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::events::event_access;
use crate::models::member::Viewer;
use crate::models::task::{CompletionRequest, Task, TaskPatch, TASK_COLUMNS};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub completed: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl ListTasksQuery {
    /// Blank search strings behave like no search at all.
    fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

pub(crate) async fn fetch_task(
    conn: &mut PgConnection,
    task_id: i32,
) -> Result<Option<Task>, ApiError> {
    let query = format!("SELECT {} FROM tasks t WHERE t.id = $1", TASK_COLUMNS);
    Ok(sqlx::query_as::<_, Task>(&query)
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Loads the task and checks that `viewer` may work with it.
async fn accessible_task(
    conn: &mut PgConnection,
    task_id: i32,
    viewer: &Viewer,
) -> Result<Task, ApiError> {
    let task = fetch_task(conn, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task".to_string()))?;

    event_access(conn, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event".to_string()))?
        .ensure_access(viewer)?;

    Ok(task)
}

async fn store_task(conn: &mut PgConnection, task: &Task) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE tasks SET name = $2, due_at = $3, content = $4, is_completed = $5,
                          completed_at = $6, updated_at = $7
         WHERE id = $1",
    )
    .bind(task.id)
    .bind(&task.name)
    .bind(task.due_at)
    .bind(&task.content)
    .bind(task.is_completed)
    .bind(task.completed_at)
    .bind(task.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_task_with_access(
    conn: &mut PgConnection,
    task_id: i32,
    viewer: &Viewer,
    patch: &TaskPatch,
) -> Result<Task, ApiError> {
    let mut task = accessible_task(conn, task_id, viewer).await?;
    patch.apply(&mut task, Utc::now());
    store_task(conn, &task).await?;
    Ok(task)
}

pub(crate) async fn remove_task(
    conn: &mut PgConnection,
    task_id: i32,
    viewer: &Viewer,
) -> Result<(), ApiError> {
    accessible_task(conn, task_id, viewer).await?;

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    info!("Task {} deleted by member {}", task_id, viewer.member_id);
    Ok(())
}

// ============================================================================
// Task Routes
// ============================================================================

#[get("/api/tasks")]
async fn list_tasks(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<ListTasksQuery>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;

    // $5 is NULL for teachers, who see every task.
    let sql = format!(
        "SELECT {} FROM tasks t
         JOIN events e ON e.id = t.id
         WHERE ($1::bool IS NULL OR t.is_completed = $1)
           AND ($2::timestamptz IS NULL OR t.due_at >= $2)
           AND ($3::timestamptz IS NULL OR t.due_at <= $3)
           AND ($4::text IS NULL
                OR strpos(lower(t.name), lower($4)) > 0
                OR strpos(lower(t.content), lower($4)) > 0)
           AND ($5::int IS NULL
                OR e.creator_id = $5
                OR EXISTS(SELECT 1 FROM event_members em
                          WHERE em.event_id = e.id AND em.member_id = $5))
         ORDER BY t.due_at, t.id",
        TASK_COLUMNS
    );

    let restrict_to = if viewer.is_teacher() {
        None
    } else {
        Some(viewer.member_id)
    };

    let tasks = sqlx::query_as::<_, Task>(&sql)
        .bind(query.completed)
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(query.search_term())
        .bind(restrict_to)
        .fetch_all(&app_state.db)
        .await?;

    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/api/tasks/{id}")]
async fn get_task(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let mut conn = app_state.db.acquire().await?;

    let task = accessible_task(&mut conn, path.into_inner(), &viewer).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[put("/api/tasks/{id}")]
async fn update_task(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<TaskPatch>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    payload.validate()?;

    let mut tx = app_state.db.begin().await?;
    update_task_with_access(&mut tx, path.into_inner(), &viewer, &payload).await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[post("/api/tasks/{id}/completion")]
async fn set_task_completion(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<CompletionRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let task_id = path.into_inner();

    let patch = TaskPatch {
        is_completed: Some(payload.is_completed),
        ..TaskPatch::default()
    };

    let mut tx = app_state.db.begin().await?;
    let task = update_task_with_access(&mut tx, task_id, &viewer, &patch).await?;
    tx.commit().await?;

    info!(
        "Task {} marked {} by member {}",
        task_id,
        if task.is_completed { "completed" } else { "open" },
        viewer.member_id
    );

    Ok(HttpResponse::Ok().json(task))
}

#[delete("/api/tasks/{id}")]
async fn delete_task(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;

    let mut tx = app_state.db.begin().await?;
    remove_task(&mut tx, path.into_inner(), &viewer).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_tasks)
        .service(get_task)
        .service(update_task)
        .service(set_task_completion)
        .service(delete_task);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_search_is_ignored() {
        let query = ListTasksQuery {
            search: Some("   ".to_string()),
            ..ListTasksQuery::default()
        };
        assert_eq!(query.search_term(), None);

        let query = ListTasksQuery {
            search: Some(" essay ".to_string()),
            ..ListTasksQuery::default()
        };
        assert_eq!(query.search_term(), Some("essay"));
    }

    #[test]
    fn completion_payload_shape() {
        let payload: CompletionRequest = serde_json::from_str(r#"{"is_completed": true}"#).unwrap();
        assert!(payload.is_completed);
    }
}
