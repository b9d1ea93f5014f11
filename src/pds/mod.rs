//! PDS (Personal Data Server) snapshot source boundary.
//!
//! The pipeline only consumes the outputs of these calls; account and
//! record CRUD live on the server side.

pub mod client;

pub use client::{PdsClient, RawRecord, Session, DEFAULT_SERVICE_URL, POST_COLLECTION};

use crate::Result;
use async_trait::async_trait;

/// Supplies either the raw repository archive or a flat record listing;
/// the pipeline treats both as ingestible sources.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Full repository export as CAR bytes.
    async fn fetch_archive(&self, did: &str) -> Result<Vec<u8>>;

    /// Flat listing of post records.
    async fn list_records(&self, did: &str, limit: u32) -> Result<Vec<RawRecord>>;
}
