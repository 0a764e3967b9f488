//! Storage layer: the [`StatuteStore`] contract and its Postgres implementation.

mod error;
mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hanlaw_core::{Embedding, StatuteDetail, StatuteSummary};

pub use error::StoreError;
pub use pg::PgStore;

/// Identity and creation timestamp of an already-stored statute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingStatute {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

/// Persistence contract the ingestion pipeline writes through.
///
/// A statute, its embedding, its articles, and its history are one unit:
/// written atomically, removed together. Implementations must never leave
/// a partially written statute visible to readers.
#[async_trait]
pub trait StatuteStore: Send + Sync {
    /// Look up a stored statute by name, or by name OR external id when
    /// the external id is supplied. Query failures propagate; the caller
    /// decides whether to fail open or closed.
    async fn find_statute(
        &self,
        name: &str,
        external_id: Option<&str>,
    ) -> Result<Option<ExistingStatute>, StoreError>;

    /// Write one statute with all owned rows in a single transaction and
    /// return its new identity. `created_at` overrides the row timestamp
    /// when an update wants to carry the original one forward.
    async fn insert_statute(
        &self,
        summary: &StatuteSummary,
        detail: &StatuteDetail,
        embedding: &Embedding,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError>;

    /// Remove a statute and everything it owns. Returns false when no
    /// such statute exists.
    async fn delete_statute(&self, id: i64) -> Result<bool, StoreError>;
}
