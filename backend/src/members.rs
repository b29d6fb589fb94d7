use actix_web::{delete, get, put, web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::models::member::{MemberProfile, Role, MEMBER_COLUMNS};
use crate::roles::helpers::{
    delete_member_account, ensure_self_or_teacher, ensure_teacher, fetch_profile, update_member,
    MemberPatch,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct ListMembersQuery {
    role: Option<String>,
}

#[get("/api/members")]
async fn list_members(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    query: web::Query<ListMembersQuery>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let role = match &query.role {
        Some(role) => Some(role.parse::<Role>()?),
        None => None,
    };

    let sql = format!(
        "SELECT {} FROM members WHERE ($1::member_role IS NULL OR role = $1)
         ORDER BY surname, name, id",
        MEMBER_COLUMNS
    );
    let members = sqlx::query_as::<_, MemberProfile>(&sql)
        .bind(role)
        .fetch_all(&app_state.db)
        .await?;

    Ok(HttpResponse::Ok().json(members))
}

#[get("/api/members/{id}")]
async fn get_member(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let member = fetch_profile(&app_state.db, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Member".to_string()))?;

    Ok(HttpResponse::Ok().json(member))
}

#[put("/api/members/{id}")]
async fn update_member_profile(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    patch: web::Json<MemberPatch>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let member_id = path.into_inner();
    ensure_self_or_teacher(&viewer, member_id)?;

    let mut tx = app_state.db.begin().await?;
    update_member(&mut tx, member_id, &patch).await?;
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/members/{id}")]
async fn delete_member(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let member_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    delete_member_account(&mut tx, member_id).await?;
    tx.commit().await?;

    info!("Member {} removed by member {}", member_id, viewer.member_id);
    Ok(HttpResponse::Ok().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_members)
        .service(get_member)
        .service(update_member_profile)
        .service(delete_member);
}
