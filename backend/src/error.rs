use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    DuplicateEmail,
    InvalidRole(String),
    TaskAlreadyExists,
    InvalidCredentials,
    Unauthenticated(String),
    Forbidden,
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound(what) => write!(f, "{} not found", what),
            ApiError::BadRequest(s) => write!(f, "{}", s),
            ApiError::DuplicateEmail => write!(f, "A member with this email already exists"),
            ApiError::InvalidRole(role) => write!(f, "Unknown role: {}", role),
            ApiError::TaskAlreadyExists => {
                write!(f, "Task already exists for this event. Use PUT to update.")
            }
            ApiError::InvalidCredentials => write!(f, "Invalid email or password"),
            ApiError::Unauthenticated(s) => write!(f, "{}", s),
            ApiError::Forbidden => write!(f, "Not authorized"),
            ApiError::Internal(s) => write!(f, "Internal server error: {}", s),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_)
            | ApiError::DuplicateEmail
            | ApiError::InvalidRole(_)
            | ApiError::TaskAlreadyExists
            | ApiError::InvalidCredentials => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse { error: message })
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => match db_err.constraint() {
                    Some("uq_members_email") => ApiError::DuplicateEmail,
                    _ => ApiError::BadRequest("Record already exists".to_string()),
                },
                // foreign_key_violation
                Some("23503") => ApiError::BadRequest(match db_err.constraint() {
                    Some(name) => format!(
                        "Operation violates reference constraint {}; the record is referenced or refers to a missing record",
                        name
                    ),
                    None => "Operation violates a reference constraint".to_string(),
                }),
                // check_violation
                Some("23514") => ApiError::BadRequest(match db_err.constraint() {
                    Some("ck_events_duration_positive") => {
                        "Duration must be greater than 0".to_string()
                    }
                    Some(name) => format!("Value violates check constraint {}", name),
                    None => "Value violates a check constraint".to_string(),
                }),
                _ => ApiError::Internal(err.to_string()),
            },
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

/// Turns actix extractor failures (bad JSON, bad path segments, bad query
/// strings) into the same `{"error": ...}` body every handler uses.
pub fn extractor_error(err: impl std::fmt::Display) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}
