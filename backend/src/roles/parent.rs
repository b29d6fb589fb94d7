use std::collections::HashMap;

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{FromRow, PgPool};

use super::helpers::{
    delete_member_account, ensure_member_role, ensure_self_or_teacher, ensure_teacher,
    insert_member, insert_specialization, update_member, Specialization,
};
use super::models::{CreateParentRequest, LookupEntry, ParentView, UpdateParentRequest};
use crate::auth::authenticate;
use crate::error::ApiError;
use crate::models::member::{MemberProfile, Role};
use crate::relations::{replace_links, PARENT_STUDENTS};
use crate::AppState;

const PARENT_SELECT: &str = "SELECT m.id, m.surname, m.name, m.phone, m.email, m.role,
        m.created_at, m.updated_at, p.parent_type_id, pt.name AS parent_type_name
 FROM members m
 JOIN parents p ON p.id = m.id
 LEFT JOIN parent_types pt ON pt.id = p.parent_type_id";

#[derive(Debug, FromRow)]
struct ParentRow {
    id: i32,
    surname: String,
    name: String,
    phone: String,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    parent_type_id: Option<i32>,
    parent_type_name: Option<String>,
}

impl ParentRow {
    fn into_view(self, student_ids: Vec<i32>) -> ParentView {
        let parent_type = match (self.parent_type_id, self.parent_type_name) {
            (Some(id), Some(name)) => Some(LookupEntry { id, name }),
            _ => None,
        };

        ParentView {
            id: self.id,
            member: MemberProfile {
                id: self.id,
                surname: self.surname,
                name: self.name,
                phone: self.phone,
                email: self.email,
                role: self.role,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            parent_type,
            student_ids,
        }
    }
}

#[derive(Debug, FromRow)]
struct StudentLink {
    parent_id: i32,
    student_id: i32,
}

async fn load_parent(db: &PgPool, parent_id: i32) -> Result<Option<ParentView>, ApiError> {
    let query = format!("{} WHERE m.id = $1", PARENT_SELECT);
    let row = match sqlx::query_as::<_, ParentRow>(&query)
        .bind(parent_id)
        .fetch_optional(db)
        .await?
    {
        Some(row) => row,
        None => return Ok(None),
    };

    let student_ids = sqlx::query_scalar::<_, i32>(
        "SELECT student_id FROM parent_students WHERE parent_id = $1 ORDER BY student_id",
    )
    .bind(parent_id)
    .fetch_all(db)
    .await?;

    Ok(Some(row.into_view(student_ids)))
}

// ============================================================================
// Parent Routes
// ============================================================================

#[get("/api/parent-types")]
pub(crate) async fn list_parent_types(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let parent_types =
        sqlx::query_as::<_, LookupEntry>("SELECT id, name FROM parent_types ORDER BY id")
            .fetch_all(&app_state.db)
            .await?;

    Ok(HttpResponse::Ok().json(parent_types))
}

#[get("/api/parents")]
pub(crate) async fn list_parents(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let query = format!("{} ORDER BY m.surname, m.name, m.id", PARENT_SELECT);
    let rows = sqlx::query_as::<_, ParentRow>(&query)
        .fetch_all(&app_state.db)
        .await?;

    let links = sqlx::query_as::<_, StudentLink>(
        "SELECT parent_id, student_id FROM parent_students ORDER BY student_id",
    )
    .fetch_all(&app_state.db)
    .await?;

    let mut students_by_parent: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in links {
        students_by_parent
            .entry(link.parent_id)
            .or_default()
            .push(link.student_id);
    }

    let parents: Vec<ParentView> = rows
        .into_iter()
        .map(|row| {
            let student_ids = students_by_parent.remove(&row.id).unwrap_or_default();
            row.into_view(student_ids)
        })
        .collect();

    Ok(HttpResponse::Ok().json(parents))
}

#[post("/api/parents")]
pub(crate) async fn create_parent(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    parent_req: web::Json<CreateParentRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;

    let parent_req = parent_req.into_inner();
    parent_req.member.validate()?;

    let specialization = Specialization::Parent {
        parent_type_id: parent_req.parent_type_id,
    };

    let mut tx = app_state.db.begin().await?;
    let member = insert_member(&mut tx, &parent_req.member, Role::Parent).await?;
    insert_specialization(&mut tx, member.id, &specialization).await?;
    if let Some(student_ids) = &parent_req.student_ids {
        replace_links(&mut tx, &PARENT_STUDENTS, member.id, student_ids).await?;
    }
    tx.commit().await?;

    info!("Parent {} created by member {}", member.id, viewer.member_id);

    let parent = load_parent(&app_state.db, member.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Parent".to_string()))?;

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/parents/{}", parent.id)))
        .json(parent))
}

#[get("/api/parents/{id}")]
pub(crate) async fn get_parent(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let parent = load_parent(&app_state.db, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Parent".to_string()))?;

    Ok(HttpResponse::Ok().json(parent))
}

#[put("/api/parents/{id}")]
pub(crate) async fn update_parent(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    update_req: web::Json<UpdateParentRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let parent_id = path.into_inner();
    ensure_self_or_teacher(&viewer, parent_id)?;

    let update_req = update_req.into_inner();
    if update_req.student_ids.is_some() {
        ensure_teacher(&viewer)?;
    }

    let mut tx = app_state.db.begin().await?;
    ensure_member_role(&mut tx, parent_id, Role::Parent, "Parent").await?;

    if let Some(patch) = &update_req.member {
        update_member(&mut tx, parent_id, patch).await?;
    }

    if let Some(parent_type_id) = update_req.parent_type_id {
        sqlx::query("UPDATE parents SET parent_type_id = $2 WHERE id = $1")
            .bind(parent_id)
            .bind(parent_type_id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(student_ids) = &update_req.student_ids {
        replace_links(&mut tx, &PARENT_STUDENTS, parent_id, student_ids).await?;
    }

    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/parents/{id}")]
pub(crate) async fn delete_parent(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let parent_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    ensure_member_role(&mut tx, parent_id, Role::Parent, "Parent").await?;
    delete_member_account(&mut tx, parent_id).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}
