pub mod event;
pub mod links;
pub mod member;
pub mod task;

use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

/// Required free text: non-blank after trimming and at most `max_len` characters.
pub fn validate_bounded_text(field: &str, value: &str, max_len: usize) -> Result<(), ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(ApiError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}

/// For `Option<Option<T>>` fields: absent stays `None`, an explicit `null`
/// becomes `Some(None)` and a value becomes `Some(Some(v))`. Pair with
/// `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
