use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::member::MemberProfile;
use crate::models::nullable;

use super::helpers::{MemberPatch, NewMember};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct LookupEntry {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct GroupSummary {
    pub id: i32,
    pub name: String,
    pub teacher_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeacherView {
    pub id: i32,
    pub member: MemberProfile,
    pub groups: Vec<LookupEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentView {
    pub id: i32,
    pub member: MemberProfile,
    pub birthday: Option<NaiveDate>,
    pub group: Option<GroupSummary>,
    pub parent_ids: Vec<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParentView {
    pub id: i32,
    pub member: MemberProfile,
    pub parent_type: Option<LookupEntry>,
    pub student_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeacherRequest {
    pub member: NewMember,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub member: NewMember,
    pub birthday: Option<NaiveDate>,
    pub group_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateParentRequest {
    pub member: NewMember,
    pub parent_type_id: Option<i32>,
    pub student_ids: Option<Vec<i32>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTeacherRequest {
    pub member: Option<MemberPatch>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateStudentRequest {
    pub member: Option<MemberPatch>,
    #[serde(default, deserialize_with = "nullable")]
    pub birthday: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub group_id: Option<Option<i32>>,
    /// Absent leaves links alone; `[]` clears them.
    pub parent_ids: Option<Vec<i32>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateParentRequest {
    pub member: Option<MemberPatch>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_type_id: Option<Option<i32>>,
    /// Absent leaves links alone; `[]` clears them.
    pub student_ids: Option<Vec<i32>>,
}
