use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;
use crate::models::validate_bounded_text;

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ApiError;

    /// Case-insensitive; clients historically sent "Teacher" as well as "teacher".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            _ => Err(ApiError::InvalidRole(s.to_string())),
        }
    }
}

/// Full member row, including the credential column. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct MemberRecord {
    pub id: i32,
    pub surname: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberProfile {
    pub id: i32,
    pub surname: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MemberRecord> for MemberProfile {
    fn from(record: MemberRecord) -> Self {
        MemberProfile {
            id: record.id,
            surname: record.surname,
            name: record.name,
            phone: record.phone,
            email: record.email,
            role: record.role,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Compact member projection embedded in other resources.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct MemberSummary {
    pub id: i32,
    pub surname: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// The authenticated caller, as established from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub member_id: i32,
    pub role: Role,
}

impl Viewer {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}

pub const MEMBER_COLUMNS: &str =
    "id, surname, name, phone, email, role, created_at, updated_at";

pub const SUMMARY_COLUMNS: &str = "m.id, m.surname, m.name, m.email, m.role";

pub fn validate_surname(value: &str) -> Result<(), ApiError> {
    validate_bounded_text("surname", value, 50)
}

pub fn validate_name(value: &str) -> Result<(), ApiError> {
    validate_bounded_text("name", value, 50)
}

pub fn validate_phone(value: &str) -> Result<(), ApiError> {
    validate_bounded_text("phone", value, 15)?;
    let ok = value
        .trim()
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if !ok {
        return Err(ApiError::BadRequest("phone contains invalid characters".to_string()));
    }
    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), ApiError> {
    validate_bounded_text("email", value, 100)?;
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !value.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::BadRequest("email is not a valid address".to_string()));
    }
    Ok(())
}

pub fn validate_password(value: &str) -> Result<(), ApiError> {
    if value.chars().count() < 6 {
        return Err(ApiError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

/// Emails are compared case-insensitively; store them lowercased.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!(" parent ".parse::<Role>().unwrap(), Role::Parent);
        assert_eq!("STUDENT".parse::<Role>().unwrap(), Role::Student);
    }

    #[test]
    fn unknown_role_is_invalid_role() {
        let err = "principal".parse::<Role>().unwrap_err();
        assert!(matches!(err, ApiError::InvalidRole(ref r) if r == "principal"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Parent).unwrap(), "\"parent\"");
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("anna.koval@school.ua").is_ok());
        assert!(validate_email("no-at-sign.ua").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@c.ua").is_err());
        assert!(validate_email("   ").is_err());
    }

    #[test]
    fn text_fields_enforce_length() {
        assert!(validate_name(&"x".repeat(50)).is_ok());
        assert!(validate_name(&"x".repeat(51)).is_err());
        assert!(validate_surname("").is_err());
        assert!(validate_phone("+380 (44) 123").is_ok());
        assert!(validate_phone("call me").is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Anna@School.UA "), "anna@school.ua");
    }
}
