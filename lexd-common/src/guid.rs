//! Guid helpers
//!
//! Ranges and elements carry opaque string guids. Generation and validation
//! live here so every engine mints them the same way.

use uuid::Uuid;

/// Generate a fresh opaque guid for a range or element
pub fn new_guid() -> String {
    Uuid::new_v4().to_string()
}

/// True if the string is a well-formed guid
pub fn is_valid_guid(s: &str) -> bool {
    Uuid::parse_str(s).is_ok()
}
