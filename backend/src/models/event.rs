use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;
use crate::models::member::Viewer;
use crate::models::validate_bounded_text;

pub const NAME_MAX_LEN: usize = 100;
pub const COMMENT_MAX_LEN: usize = 1000;

#[derive(Debug, Clone, FromRow)]
pub struct EventRecord {
    pub id: i32,
    pub event_type_id: i32,
    pub event_type_name: String,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub content: String,
    pub is_content_hidden: bool,
    pub venue_or_link: String,
    pub creator_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const EVENT_SELECT: &str = "SELECT e.id, e.event_type_id, et.name AS event_type_name, e.name,
        e.starts_at, e.duration_minutes, e.content, e.is_content_hidden,
        e.venue_or_link, e.creator_id, e.created_at, e.updated_at
 FROM events e
 JOIN event_types et ON et.id = e.event_type_id";

/// Who may see or touch an event: its creator and its attendee list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAccess {
    pub creator_id: i32,
    pub attendee_ids: Vec<i32>,
    pub is_content_hidden: bool,
}

impl EventAccess {
    pub fn is_participant(&self, member_id: i32) -> bool {
        self.creator_id == member_id || self.attendee_ids.contains(&member_id)
    }

    /// Teachers always pass; everyone else must be the creator or an attendee.
    pub fn can_access(&self, viewer: &Viewer) -> bool {
        viewer.is_teacher() || self.is_participant(viewer.member_id)
    }

    pub fn ensure_access(&self, viewer: &Viewer) -> Result<(), ApiError> {
        if self.can_access(viewer) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// Creator or teacher; attendees may read but not reshape an event.
    pub fn ensure_can_manage(&self, viewer: &Viewer) -> Result<(), ApiError> {
        if viewer.is_teacher() || self.creator_id == viewer.member_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn content_visible_to(&self, viewer: &Viewer) -> bool {
        !self.is_content_hidden || self.can_access(viewer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventTypeRef {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    pub id: i32,
    pub event_type: EventTypeRef,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub is_content_hidden: bool,
    pub venue_or_link: String,
    pub creator_id: i32,
    pub participant_ids: Vec<i32>,
    pub has_task: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventView {
    /// Projects a stored event for `viewer`, dropping the content when the
    /// viewer is not allowed to read it.
    pub fn project(
        record: EventRecord,
        participant_ids: Vec<i32>,
        has_task: bool,
        viewer: &Viewer,
    ) -> Self {
        let access = EventAccess {
            creator_id: record.creator_id,
            attendee_ids: participant_ids.clone(),
            is_content_hidden: record.is_content_hidden,
        };
        let content = if access.content_visible_to(viewer) {
            Some(record.content)
        } else {
            None
        };

        EventView {
            id: record.id,
            event_type: EventTypeRef {
                id: record.event_type_id,
                name: record.event_type_name,
            },
            name: record.name,
            starts_at: record.starts_at,
            duration_minutes: record.duration_minutes,
            content,
            is_content_hidden: record.is_content_hidden,
            venue_or_link: record.venue_or_link,
            creator_id: record.creator_id,
            participant_ids,
            has_task,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

pub fn validate_event_name(name: &str) -> Result<(), ApiError> {
    validate_bounded_text("name", name, NAME_MAX_LEN)
}

pub fn validate_duration(minutes: i32) -> Result<(), ApiError> {
    if minutes <= 0 {
        return Err(ApiError::BadRequest(
            "Duration must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_comment(content: &str) -> Result<(), ApiError> {
    validate_bounded_text("content", content, COMMENT_MAX_LEN)
}
