use log::debug;
use sqlx::{Postgres, Transaction};

use crate::error::ApiError;
use crate::models::links::LinkDiff;

/// A many-to-many join table seen from one side.
#[derive(Debug, Clone, Copy)]
pub struct LinkTable {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
    pub target_table: &'static str,
}

pub const PARENT_STUDENTS: LinkTable = LinkTable {
    table: "parent_students",
    owner_column: "parent_id",
    target_column: "student_id",
    target_table: "students",
};

pub const STUDENT_PARENTS: LinkTable = LinkTable {
    table: "parent_students",
    owner_column: "student_id",
    target_column: "parent_id",
    target_table: "parents",
};

pub const EVENT_MEMBERS: LinkTable = LinkTable {
    table: "event_members",
    owner_column: "event_id",
    target_column: "member_id",
    target_table: "members",
};

pub async fn linked_ids(
    tx: &mut Transaction<'_, Postgres>,
    link: &LinkTable,
    owner_id: i32,
) -> Result<Vec<i32>, ApiError> {
    let query = format!(
        "SELECT {target} FROM {table} WHERE {owner} = $1 ORDER BY {target}",
        target = link.target_column,
        table = link.table,
        owner = link.owner_column,
    );
    Ok(sqlx::query_scalar::<_, i32>(&query)
        .bind(owner_id)
        .fetch_all(&mut **tx)
        .await?)
}

/// Replaces the owner's association set with `requested`.
///
/// Ids without a row in the target table are ignored. Only the difference
/// is written, so repeating the same request changes nothing. Rows another
/// transaction inserted after our read are skipped, so overlapping replaces
/// of the same set both succeed.
pub async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    link: &LinkTable,
    owner_id: i32,
    requested: &[i32],
) -> Result<LinkDiff, ApiError> {
    let current = linked_ids(tx, link, owner_id).await?;

    let existing = if requested.is_empty() {
        Vec::new()
    } else {
        let query = format!("SELECT id FROM {} WHERE id = ANY($1)", link.target_table);
        sqlx::query_scalar::<_, i32>(&query)
            .bind(requested)
            .fetch_all(&mut **tx)
            .await?
    };

    let diff = LinkDiff::compute(&current, requested, &existing);
    if diff.is_empty() {
        return Ok(diff);
    }

    if !diff.to_remove.is_empty() {
        let query = format!(
            "DELETE FROM {table} WHERE {owner} = $1 AND {target} = ANY($2)",
            table = link.table,
            owner = link.owner_column,
            target = link.target_column,
        );
        sqlx::query(&query)
            .bind(owner_id)
            .bind(&diff.to_remove)
            .execute(&mut **tx)
            .await?;
    }

    if !diff.to_add.is_empty() {
        let query = format!(
            "INSERT INTO {table} ({owner}, {target}) SELECT $1, UNNEST($2::int[])
             ON CONFLICT DO NOTHING",
            table = link.table,
            owner = link.owner_column,
            target = link.target_column,
        );
        sqlx::query(&query)
            .bind(owner_id)
            .bind(&diff.to_add)
            .execute(&mut **tx)
            .await?;
    }

    debug!(
        "{}: owner {} -{:?} +{:?}",
        link.table, owner_id, diff.to_remove, diff.to_add
    );

    Ok(diff)
}
