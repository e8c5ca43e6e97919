//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One project-specific custom range element (header row).
///
/// Custom elements live outside the canonical document; each header row may
/// own child value rows forming one level of sub-entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRange {
    pub id: i64,
    pub project_id: String,
    pub range_type: String,
    pub range_name: String,
    pub element_id: String,
    pub element_label: Option<String>,
    pub element_description: Option<String>,
    pub created_at: NaiveDateTime,
    pub values: Vec<CustomRangeValue>,
}

/// Child value row owned by a custom range element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRangeValue {
    pub value: String,
    pub label: Option<String>,
    pub description: Option<String>,
}
