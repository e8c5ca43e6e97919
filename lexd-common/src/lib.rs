//! # lexd Common Library
//!
//! Shared code for the lexd dictionary-curation backend:
//! - Error taxonomy and result alias
//! - Range-config fallback loading (static range metadata)
//! - Relational custom-range store (schema, models, queries)
//! - Utility functions

pub mod config;
pub mod db;
pub mod error;
pub mod guid;

pub use error::{Error, Result};
