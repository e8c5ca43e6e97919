//! Relational custom-range store

pub mod custom_ranges;
pub mod init;
pub mod models;

pub use custom_ranges::*;
pub use init::*;
pub use models::*;
