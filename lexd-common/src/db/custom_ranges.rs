//! Custom-range queries
//!
//! The reconciliation engine merges these rows into the canonical ranges;
//! the mutation engine deletes them (best-effort) when a range is removed.

use crate::db::models::{CustomRange, CustomRangeValue};
use crate::Result;
use chrono::NaiveDateTime;
use sqlx::SqlitePool;

/// Load all custom range elements for a project, with their value rows.
///
/// Rows come back in insertion order; the caller groups them by `range_name`.
pub async fn load_custom_ranges(pool: &SqlitePool, project_id: &str) -> Result<Vec<CustomRange>> {
    let headers: Vec<(
        i64,
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        NaiveDateTime,
    )> = sqlx::query_as(
        "SELECT id, range_type, range_name, element_id, element_label,
                element_description, created_at
         FROM custom_ranges WHERE project_id = ? ORDER BY id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let mut ranges = Vec::with_capacity(headers.len());
    for (id, range_type, range_name, element_id, element_label, element_description, created_at) in
        headers
    {
        let value_rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT value, label, description
             FROM custom_range_values WHERE custom_range_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        ranges.push(CustomRange {
            id,
            project_id: project_id.to_string(),
            range_type,
            range_name,
            element_id,
            element_label,
            element_description,
            created_at,
            values: value_rows
                .into_iter()
                .map(|(value, label, description)| CustomRangeValue {
                    value,
                    label,
                    description,
                })
                .collect(),
        });
    }

    Ok(ranges)
}

/// Insert one custom range element with its value rows, returning the row id
pub async fn insert_custom_range(
    pool: &SqlitePool,
    project_id: &str,
    range_type: &str,
    range_name: &str,
    element_id: &str,
    element_label: Option<&str>,
    element_description: Option<&str>,
    values: &[CustomRangeValue],
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO custom_ranges
            (project_id, range_type, range_name, element_id, element_label, element_description)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(range_type)
    .bind(range_name)
    .bind(element_id)
    .bind(element_label)
    .bind(element_description)
    .execute(pool)
    .await?;

    let header_id = result.last_insert_rowid();

    for value in values {
        sqlx::query(
            "INSERT INTO custom_range_values (custom_range_id, value, label, description)
             VALUES (?, ?, ?, ?)",
        )
        .bind(header_id)
        .bind(&value.value)
        .bind(&value.label)
        .bind(&value.description)
        .execute(pool)
        .await?;
    }

    Ok(header_id)
}

/// Delete all custom rows for one range of a project.
///
/// Value rows cascade. Returns the number of header rows removed.
pub async fn delete_custom_ranges(
    pool: &SqlitePool,
    project_id: &str,
    range_name: &str,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM custom_ranges WHERE project_id = ? AND range_name = ?")
        .bind(project_id)
        .bind(range_name)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
