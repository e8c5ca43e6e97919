//! # lexd Ranges Engine
//!
//! Reconciliation and mutation of the controlled vocabularies ("ranges")
//! that constrain and annotate dictionary fields:
//! - Range/element model and hierarchy helpers
//! - Codec for the canonical ranges document
//! - Hierarchy resolver (inherited display values)
//! - Reconciliation engine merging canonical, custom, and config sources
//! - Mutation/CRUD engine with uniqueness and cycle validation
//! - Usage scanning and guarded bulk migration of range references

pub mod cache;
pub mod codec;
pub mod known;
pub mod model;
pub mod mutation;
pub mod reconcile;
pub mod resolver;
pub mod store;
pub mod usage;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::RangeCache;
pub use model::{Range, RangeElement};
pub use mutation::{RangeData, RangeElementData, RangeMigration, RangeMutator};
pub use reconcile::RangeReconciler;
pub use store::{CanonicalStore, XmlDbClient};
pub use usage::{MigrationOp, MigrationResult, UsageRecord, UsageScanner, UsageSummary};
