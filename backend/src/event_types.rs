use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::models::event::EventTypeRef;
use crate::models::validate_bounded_text;
use crate::roles::helpers::ensure_teacher;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventTypeRequest {
    pub name: String,
}

fn validate_event_type_name(name: &str) -> Result<(), ApiError> {
    validate_bounded_text("name", name, 100)
}

#[get("/api/event-types")]
async fn list_event_types(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let event_types =
        sqlx::query_as::<_, (i32, String)>("SELECT id, name FROM event_types ORDER BY id")
            .fetch_all(&app_state.db)
            .await?
            .into_iter()
            .map(|(id, name)| EventTypeRef { id, name })
            .collect::<Vec<_>>();

    Ok(HttpResponse::Ok().json(event_types))
}

#[post("/api/event-types")]
async fn create_event_type(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    payload: web::Json<EventTypeRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    validate_event_type_name(&payload.name)?;

    let id = sqlx::query_scalar::<_, i32>("INSERT INTO event_types (name) VALUES ($1) RETURNING id")
        .bind(payload.name.trim())
        .fetch_one(&app_state.db)
        .await?;

    info!("Event type {} created by member {}", id, viewer.member_id);

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/event-types/{}", id)))
        .json(EventTypeRef {
            id,
            name: payload.name.trim().to_string(),
        }))
}

#[get("/api/event-types/{id}")]
async fn get_event_type(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;
    let id = path.into_inner();

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM event_types WHERE id = $1")
        .bind(id)
        .fetch_optional(&app_state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event type".to_string()))?;

    Ok(HttpResponse::Ok().json(EventTypeRef { id, name }))
}

#[put("/api/event-types/{id}")]
async fn update_event_type(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<EventTypeRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    validate_event_type_name(&payload.name)?;

    let result = sqlx::query("UPDATE event_types SET name = $2 WHERE id = $1")
        .bind(path.into_inner())
        .bind(payload.name.trim())
        .execute(&app_state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Event type".to_string()));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/event-types/{id}")]
async fn delete_event_type(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;

    // Events of this type keep it alive through the FK.
    let result = sqlx::query("DELETE FROM event_types WHERE id = $1")
        .bind(path.into_inner())
        .execute(&app_state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Event type".to_string()));
    }
    Ok(HttpResponse::Ok().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_event_types)
        .service(create_event_type)
        .service(get_event_type)
        .service(update_event_type)
        .service(delete_event_type);
}
