use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::auth::hash_password;
use crate::error::ApiError;
use crate::models::member::{
    normalize_email, validate_email, validate_name, validate_password, validate_phone,
    validate_surname, MemberProfile, MemberRecord, Role, Viewer, MEMBER_COLUMNS,
};

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMember {
    pub surname: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

impl NewMember {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_surname(&self.surname)?;
        validate_name(&self.name)?;
        validate_phone(&self.phone)?;
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// Profile fields a member update may carry. Absent fields stay as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberPatch {
    pub surname: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl MemberPatch {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(surname) = &self.surname {
            validate_surname(surname)?;
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

/// The role-specific row created next to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specialization {
    Teacher,
    Student {
        birthday: Option<NaiveDate>,
        group_id: Option<i32>,
    },
    Parent {
        parent_type_id: Option<i32>,
    },
}

impl Specialization {
    pub fn role(&self) -> Role {
        match self {
            Specialization::Teacher => Role::Teacher,
            Specialization::Student { .. } => Role::Student,
            Specialization::Parent { .. } => Role::Parent,
        }
    }
}

// ============================================================================
// Permission checks
// ============================================================================

pub fn ensure_teacher(viewer: &Viewer) -> Result<(), ApiError> {
    if viewer.is_teacher() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub fn ensure_self_or_teacher(viewer: &Viewer, member_id: i32) -> Result<(), ApiError> {
    if viewer.is_teacher() || viewer.member_id == member_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

// ============================================================================
// Member persistence
// ============================================================================

async fn email_taken(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    except_id: Option<i32>,
) -> Result<bool, ApiError> {
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM members WHERE email = $1 AND ($2::int IS NULL OR id <> $2))",
    )
    .bind(email)
    .bind(except_id)
    .fetch_one(&mut **tx)
    .await?)
}

/// Inserts the member row. The caller is expected to have validated `member`.
pub async fn insert_member(
    tx: &mut Transaction<'_, Postgres>,
    member: &NewMember,
    role: Role,
) -> Result<MemberRecord, ApiError> {
    let email = normalize_email(&member.email);
    if email_taken(tx, &email, None).await? {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(&member.password)?;

    // The unique constraint still backs the check above under concurrent inserts.
    let record = sqlx::query_as::<_, MemberRecord>(
        "INSERT INTO members (surname, name, phone, email, password_hash, role)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, surname, name, phone, email, password_hash, role, created_at, updated_at",
    )
    .bind(member.surname.trim())
    .bind(member.name.trim())
    .bind(member.phone.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(role)
    .fetch_one(&mut **tx)
    .await?;

    Ok(record)
}

pub async fn insert_specialization(
    tx: &mut Transaction<'_, Postgres>,
    member_id: i32,
    specialization: &Specialization,
) -> Result<(), ApiError> {
    match specialization {
        Specialization::Teacher => {
            sqlx::query("INSERT INTO teachers (id) VALUES ($1)")
                .bind(member_id)
                .execute(&mut **tx)
                .await?;
        }
        Specialization::Student { birthday, group_id } => {
            sqlx::query("INSERT INTO students (id, birthday, group_id) VALUES ($1, $2, $3)")
                .bind(member_id)
                .bind(birthday)
                .bind(group_id)
                .execute(&mut **tx)
                .await?;
        }
        Specialization::Parent { parent_type_id } => {
            sqlx::query("INSERT INTO parents (id, parent_type_id) VALUES ($1, $2)")
                .bind(member_id)
                .bind(parent_type_id)
                .execute(&mut **tx)
                .await?;
        }
    }

    debug!("Created {} row for member {}", specialization.role(), member_id);
    Ok(())
}

/// Applies the present fields of `patch`. Fails with `NotFound` when the
/// member does not exist.
pub async fn update_member(
    tx: &mut Transaction<'_, Postgres>,
    member_id: i32,
    patch: &MemberPatch,
) -> Result<(), ApiError> {
    patch.validate()?;

    let email = patch.email.as_deref().map(normalize_email);
    if let Some(email) = &email {
        if email_taken(tx, email, Some(member_id)).await? {
            return Err(ApiError::DuplicateEmail);
        }
    }

    let password_hash = match &patch.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let result = sqlx::query(
        "UPDATE members SET
            surname = COALESCE($2, surname),
            name = COALESCE($3, name),
            phone = COALESCE($4, phone),
            email = COALESCE($5, email),
            password_hash = COALESCE($6, password_hash),
            updated_at = NOW()
         WHERE id = $1",
    )
    .bind(member_id)
    .bind(patch.surname.as_deref().map(str::trim))
    .bind(patch.name.as_deref().map(str::trim))
    .bind(patch.phone.as_deref().map(str::trim))
    .bind(email)
    .bind(password_hash)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Member".to_string()));
    }
    Ok(())
}

/// Fails with `NotFound(what)` unless `member_id` exists with `role`.
pub async fn ensure_member_role(
    tx: &mut Transaction<'_, Postgres>,
    member_id: i32,
    role: Role,
    what: &str,
) -> Result<(), ApiError> {
    let found = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM members WHERE id = $1 AND role = $2)",
    )
    .bind(member_id)
    .bind(role)
    .fetch_one(&mut **tx)
    .await?;

    if found {
        Ok(())
    } else {
        Err(ApiError::NotFound(what.to_string()))
    }
}

/// Removes a member together with its specialization, link rows and
/// attendance responses. Groups it teaches, events it created and comments it
/// wrote still reference it, so those block the delete with a `BadRequest`.
pub async fn delete_member_account(
    tx: &mut Transaction<'_, Postgres>,
    member_id: i32,
) -> Result<(), ApiError> {
    let role = sqlx::query_scalar::<_, Role>("SELECT role FROM members WHERE id = $1")
        .bind(member_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member".to_string()))?;

    sqlx::query("DELETE FROM event_members WHERE member_id = $1")
        .bind(member_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM event_responses WHERE member_id = $1")
        .bind(member_id)
        .execute(&mut **tx)
        .await?;

    match role {
        Role::Teacher => {
            sqlx::query("DELETE FROM teachers WHERE id = $1")
                .bind(member_id)
                .execute(&mut **tx)
                .await?;
        }
        Role::Student => {
            sqlx::query("DELETE FROM parent_students WHERE student_id = $1")
                .bind(member_id)
                .execute(&mut **tx)
                .await?;
            sqlx::query("DELETE FROM students WHERE id = $1")
                .bind(member_id)
                .execute(&mut **tx)
                .await?;
        }
        Role::Parent => {
            sqlx::query("DELETE FROM parent_students WHERE parent_id = $1")
                .bind(member_id)
                .execute(&mut **tx)
                .await?;
            sqlx::query("DELETE FROM parents WHERE id = $1")
                .bind(member_id)
                .execute(&mut **tx)
                .await?;
        }
    }

    sqlx::query("DELETE FROM members WHERE id = $1")
        .bind(member_id)
        .execute(&mut **tx)
        .await?;

    info!("Deleted {} member {}", role, member_id);
    Ok(())
}

pub async fn fetch_profile(db: &PgPool, member_id: i32) -> Result<Option<MemberProfile>, ApiError> {
    let query = format!("SELECT {} FROM members WHERE id = $1", MEMBER_COLUMNS);
    Ok(sqlx::query_as::<_, MemberProfile>(&query)
        .bind(member_id)
        .fetch_optional(db)
        .await?)
}
