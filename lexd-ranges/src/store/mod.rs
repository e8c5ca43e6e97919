//! Canonical document store connector
//!
//! The canonical store holds the dictionary databases and their embedded
//! ranges documents. The engines consume it through the `CanonicalStore`
//! trait; `XmlDbClient` is the production REST implementor, and tests
//! substitute in-memory mocks.

pub mod client;
pub mod queries;

pub use client::XmlDbClient;

use crate::codec;
use crate::model::Range;
use async_trait::async_trait;
use lexd_common::Result;
use tracing::warn;

/// Connector interface to the canonical document store.
///
/// Queries and updates are plain query text; results come back as XML text.
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Verify the store is reachable
    async fn connect(&self) -> Result<()>;

    /// True if the store currently answers
    async fn is_connected(&self) -> bool;

    /// Run a read query, returning its serialized result
    async fn execute_query(&self, query: &str) -> Result<String>;

    /// Run an updating query
    async fn execute_update(&self, query: &str) -> Result<()>;

    /// The bound database name
    fn database(&self) -> &str;
}

/// Targeted fetch of one range from the canonical store.
///
/// An empty result is `None`; a malformed result degrades to `None` with a
/// logged warning rather than raising (a corrupt canonical document must not
/// block access to the other sources).
pub async fn fetch_range(store: &dyn CanonicalStore, range_id: &str) -> Result<Option<Range>> {
    let text = store
        .execute_query(&queries::range_by_id(store.database(), range_id))
        .await?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    match codec::decode_range(&text) {
        Ok(range) => Ok(range),
        Err(e) => {
            warn!(
                range_id,
                error = %e,
                "Failed to decode canonical range; treating as absent"
            );
            Ok(None)
        }
    }
}
