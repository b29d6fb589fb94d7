use std::collections::HashMap;

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use log::info;
use sqlx::{FromRow, PgPool};

use super::helpers::{
    delete_member_account, ensure_member_role, ensure_self_or_teacher, ensure_teacher,
    fetch_profile, insert_member, insert_specialization, update_member, Specialization,
};
use super::models::{CreateTeacherRequest, LookupEntry, TeacherView, UpdateTeacherRequest};
use crate::auth::authenticate;
use crate::error::ApiError;
use crate::models::member::{MemberProfile, Role};
use crate::AppState;

#[derive(Debug, FromRow)]
struct OwnedGroup {
    id: i32,
    name: String,
    teacher_id: i32,
}

async fn load_teacher(db: &PgPool, teacher_id: i32) -> Result<Option<TeacherView>, ApiError> {
    let profile = match fetch_profile(db, teacher_id).await? {
        Some(profile) if profile.role == Role::Teacher => profile,
        _ => return Ok(None),
    };

    let groups = sqlx::query_as::<_, LookupEntry>(
        "SELECT id, name FROM groups WHERE teacher_id = $1 ORDER BY name, id",
    )
    .bind(teacher_id)
    .fetch_all(db)
    .await?;

    Ok(Some(TeacherView {
        id: profile.id,
        member: profile,
        groups,
    }))
}

// ============================================================================
// Teacher Routes
// ============================================================================

#[get("/api/teachers")]
pub(crate) async fn list_teachers(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let profiles = sqlx::query_as::<_, MemberProfile>(
        "SELECT m.id, m.surname, m.name, m.phone, m.email, m.role, m.created_at, m.updated_at
         FROM members m
         JOIN teachers t ON t.id = m.id
         ORDER BY m.surname, m.name, m.id",
    )
    .fetch_all(&app_state.db)
    .await?;

    let owned = sqlx::query_as::<_, OwnedGroup>(
        "SELECT id, name, teacher_id FROM groups ORDER BY name, id",
    )
    .fetch_all(&app_state.db)
    .await?;

    let mut groups_by_teacher: HashMap<i32, Vec<LookupEntry>> = HashMap::new();
    for group in owned {
        groups_by_teacher
            .entry(group.teacher_id)
            .or_default()
            .push(LookupEntry {
                id: group.id,
                name: group.name,
            });
    }

    let teachers: Vec<TeacherView> = profiles
        .into_iter()
        .map(|profile| TeacherView {
            id: profile.id,
            groups: groups_by_teacher.remove(&profile.id).unwrap_or_default(),
            member: profile,
        })
        .collect();

    Ok(HttpResponse::Ok().json(teachers))
}

#[post("/api/teachers")]
pub(crate) async fn create_teacher(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    teacher_req: web::Json<CreateTeacherRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;

    let teacher_req = teacher_req.into_inner();
    teacher_req.member.validate()?;

    let mut tx = app_state.db.begin().await?;
    let member = insert_member(&mut tx, &teacher_req.member, Role::Teacher).await?;
    insert_specialization(&mut tx, member.id, &Specialization::Teacher).await?;
    tx.commit().await?;

    info!("Teacher {} created by member {}", member.id, viewer.member_id);

    let profile = MemberProfile::from(member);
    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/teachers/{}", profile.id)))
        .json(TeacherView {
            id: profile.id,
            member: profile,
            groups: Vec::new(),
        }))
}

#[get("/api/teachers/{id}")]
pub(crate) async fn get_teacher(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let teacher = load_teacher(&app_state.db, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Teacher".to_string()))?;

    Ok(HttpResponse::Ok().json(teacher))
}

#[put("/api/teachers/{id}")]
pub(crate) async fn update_teacher(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    update_req: web::Json<UpdateTeacherRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let teacher_id = path.into_inner();
    ensure_self_or_teacher(&viewer, teacher_id)?;

    let mut tx = app_state.db.begin().await?;
    ensure_member_role(&mut tx, teacher_id, Role::Teacher, "Teacher").await?;
    if let Some(patch) = &update_req.member {
        update_member(&mut tx, teacher_id, patch).await?;
    }
    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/teachers/{id}")]
pub(crate) async fn delete_teacher(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let teacher_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    ensure_member_role(&mut tx, teacher_id, Role::Teacher, "Teacher").await?;
    delete_member_account(&mut tx, teacher_id).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}
