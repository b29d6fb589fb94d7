use std::collections::HashMap;

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use sqlx::{FromRow, PgPool};

use super::helpers::{
    delete_member_account, ensure_member_role, ensure_self_or_teacher, ensure_teacher,
    insert_member, insert_specialization, update_member, Specialization,
};
use super::models::{CreateStudentRequest, GroupSummary, StudentView, UpdateStudentRequest};
use crate::auth::authenticate;
use crate::error::ApiError;
use crate::models::member::{MemberProfile, Role};
use crate::relations::{replace_links, STUDENT_PARENTS};
use crate::AppState;

const STUDENT_SELECT: &str = "SELECT m.id, m.surname, m.name, m.phone, m.email, m.role,
        m.created_at, m.updated_at, s.birthday, s.group_id,
        g.name AS group_name, g.teacher_id AS group_teacher_id
 FROM members m
 JOIN students s ON s.id = m.id
 LEFT JOIN groups g ON g.id = s.group_id";

#[derive(Debug, FromRow)]
struct StudentRow {
    id: i32,
    surname: String,
    name: String,
    phone: String,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    birthday: Option<NaiveDate>,
    group_id: Option<i32>,
    group_name: Option<String>,
    group_teacher_id: Option<i32>,
}

impl StudentRow {
    fn into_view(self, parent_ids: Vec<i32>) -> StudentView {
        let group = match (self.group_id, self.group_name, self.group_teacher_id) {
            (Some(id), Some(name), Some(teacher_id)) => Some(GroupSummary {
                id,
                name,
                teacher_id,
            }),
            _ => None,
        };

        StudentView {
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
            birthday: self.birthday,
            group,
            parent_ids,
        }
    }
}

#[derive(Debug, FromRow)]
struct ParentLink {
    parent_id: i32,
    student_id: i32,
}

async fn load_student(
    db: &PgPool,
    student_id: i32,
) -> Result<Option<StudentView>, ApiError> {
    let query = format!("{} WHERE m.id = $1", STUDENT_SELECT);
    let row = match sqlx::query_as::<_, StudentRow>(&query)
        .bind(student_id)
        .fetch_optional(db)
        .await?
    {
        Some(row) => row,
        None => return Ok(None),
    };

    let parent_ids = sqlx::query_scalar::<_, i32>(
        "SELECT parent_id FROM parent_students WHERE student_id = $1 ORDER BY parent_id",
    )
    .bind(student_id)
    .fetch_all(db)
    .await?;

    Ok(Some(row.into_view(parent_ids)))
}

// ============================================================================
// Student Routes
// ============================================================================

#[get("/api/students")]
pub(crate) async fn list_students(
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let query = format!("{} ORDER BY m.surname, m.name, m.id", STUDENT_SELECT);
    let rows = sqlx::query_as::<_, StudentRow>(&query)
        .fetch_all(&app_state.db)
        .await?;

    let links = sqlx::query_as::<_, ParentLink>(
        "SELECT parent_id, student_id FROM parent_students ORDER BY parent_id",
    )
    .fetch_all(&app_state.db)
    .await?;

    let mut parents_by_student: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in links {
        parents_by_student
            .entry(link.student_id)
            .or_default()
            .push(link.parent_id);
    }

    let students: Vec<StudentView> = rows
        .into_iter()
        .map(|row| {
            let parent_ids = parents_by_student.remove(&row.id).unwrap_or_default();
            row.into_view(parent_ids)
        })
        .collect();

    Ok(HttpResponse::Ok().json(students))
}

#[post("/api/students")]
pub(crate) async fn create_student(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    student_req: web::Json<CreateStudentRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;

    let student_req = student_req.into_inner();
    student_req.member.validate()?;

    let specialization = Specialization::Student {
        birthday: student_req.birthday,
        group_id: student_req.group_id,
    };

    let mut tx = app_state.db.begin().await?;
    let member = insert_member(&mut tx, &student_req.member, Role::Student).await?;
    insert_specialization(&mut tx, member.id, &specialization).await?;
    tx.commit().await?;

    info!("Student {} created by member {}", member.id, viewer.member_id);

    let student = load_student(&app_state.db, member.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student".to_string()))?;

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/api/students/{}", student.id)))
        .json(student))
}

#[get("/api/students/{id}")]
pub(crate) async fn get_student(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &app_state)?;

    let student = load_student(&app_state.db, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Student".to_string()))?;

    Ok(HttpResponse::Ok().json(student))
}

#[put("/api/students/{id}")]
pub(crate) async fn update_student(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    update_req: web::Json<UpdateStudentRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    let student_id = path.into_inner();
    ensure_self_or_teacher(&viewer, student_id)?;

    let update_req = update_req.into_inner();
    // Group placement and parent links are staff decisions.
    if update_req.group_id.is_some() || update_req.parent_ids.is_some() {
        ensure_teacher(&viewer)?;
    }

    let mut tx = app_state.db.begin().await?;
    ensure_member_role(&mut tx, student_id, Role::Student, "Student").await?;

    if let Some(patch) = &update_req.member {
        update_member(&mut tx, student_id, patch).await?;
    }

    if update_req.birthday.is_some() || update_req.group_id.is_some() {
        sqlx::query(
            "UPDATE students SET
                birthday = CASE WHEN $2 THEN $3 ELSE birthday END,
                group_id = CASE WHEN $4 THEN $5 ELSE group_id END
             WHERE id = $1",
        )
        .bind(student_id)
        .bind(update_req.birthday.is_some())
        .bind(update_req.birthday.flatten())
        .bind(update_req.group_id.is_some())
        .bind(update_req.group_id.flatten())
        .execute(&mut *tx)
        .await?;
    }

    if let Some(parent_ids) = &update_req.parent_ids {
        replace_links(&mut tx, &STUDENT_PARENTS, student_id, parent_ids).await?;
    }

    tx.commit().await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/students/{id}")]
pub(crate) async fn delete_student(
    req: HttpRequest,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let viewer = authenticate(&req, &app_state)?;
    ensure_teacher(&viewer)?;
    let student_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    ensure_member_role(&mut tx, student_id, Role::Student, "Student").await?;
    delete_member_account(&mut tx, student_id).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(group: Option<(i32, &str, i32)>) -> StudentRow {
        let now = Utc::now();
        StudentRow {
            id: 12,
            surname: "Bondar".to_string(),
            name: "Olha".to_string(),
            phone: "+380671234567".to_string(),
            email: "olha@school.ua".to_string(),
            role: Role::Student,
            created_at: now,
            updated_at: now,
            birthday: NaiveDate::from_ymd_opt(2012, 5, 17),
            group_id: group.map(|g| g.0),
            group_name: group.map(|g| g.1.to_string()),
            group_teacher_id: group.map(|g| g.2),
        }
    }

    #[test]
    fn view_embeds_group_summary() {
        let view = row(Some((3, "5-A", 1))).into_view(vec![20, 21]);
        assert_eq!(
            view.group,
            Some(GroupSummary {
                id: 3,
                name: "5-A".to_string(),
                teacher_id: 1
            })
        );
        assert_eq!(view.parent_ids, vec![20, 21]);
        assert_eq!(view.member.id, 12);
    }

    #[test]
    fn ungrouped_student_has_no_group() {
        let json = serde_json::to_value(row(None).into_view(Vec::new())).unwrap();
        assert!(json["group"].is_null());
        assert_eq!(json["birthday"], "2012-05-17");
        assert_eq!(json["member"]["role"], "student");
    }
}
