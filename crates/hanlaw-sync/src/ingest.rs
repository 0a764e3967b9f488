//! The fetch / embed / store loop.
//!
//! One statute at a time: list a page, decide per item whether it is
//! new, an update, or a skip, then pull the full text, embed it, and
//! write it in one transaction. Per-item failures are counted and the
//! run continues; a listing failure aborts the run, since every later
//! page depends on it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use hanlaw_ai::{EmbedError, Embedder};
use hanlaw_core::{Embedding, StatuteSummary, embedding_text};
use hanlaw_store::{ExistingStatute, StatuteStore, StoreError};

use crate::client::{ClientError, MAX_DISPLAY, SourceClient};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error("no statute titled '{name}'; nearest titles: {candidates:?}")]
    NoExactMatch { name: String, candidates: Vec<String> },
    #[error("statute '{name}' has no external id")]
    MissingExternalId { name: String },
}

/// What to do when the existence check itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExistencePolicy {
    /// Treat the statute as new and keep going. Can produce a
    /// duplicate row if the statute was in fact already stored.
    #[default]
    FailOpen,
    /// Count the item as failed and move on without writing.
    FailClosed,
}

/// How updates treat the original creation timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// The reinserted row gets a fresh `created_at`.
    #[default]
    ResetCreatedAt,
    /// The reinserted row keeps the deleted row's `created_at`.
    PreserveCreatedAt,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Listing keyword. `None` walks the whole statute catalogue.
    pub keyword: Option<String>,
    /// Upper bound on statutes ingested (inserted or updated) in one
    /// run. Skipped and failed items do not count against it.
    pub max_statutes: usize,
    /// Re-ingest statutes that are already stored.
    pub update_existing: bool,
    pub existence_policy: ExistencePolicy,
    pub update_strategy: UpdateStrategy,
    /// Pause after each successful write, as upstream rate courtesy.
    pub request_interval: Duration,
    /// Listing page size, capped at the upstream maximum.
    pub page_size: u32,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            keyword: None,
            max_statutes: 100,
            update_existing: false,
            existence_policy: ExistencePolicy::default(),
            update_strategy: UpdateStrategy::default(),
            request_interval: Duration::from_secs(1),
            page_size: MAX_DISPLAY,
        }
    }
}

/// Outcome counters for one [`Ingestor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestReport {
    fn ingested(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Result of a single-statute fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleOutcome {
    Inserted(i64),
    Updated(i64),
    /// Already stored and updates are off; nothing was written.
    AlreadyStored { created_at: DateTime<Utc> },
}

/// Drives ingestion against a source client, a store, and an embedder.
pub struct Ingestor<S, E> {
    client: SourceClient,
    store: S,
    embedder: E,
    options: IngestOptions,
}

impl<S, E> Ingestor<S, E>
where
    S: StatuteStore,
    E: Embedder,
{
    pub fn new(client: SourceClient, store: S, embedder: E, options: IngestOptions) -> Self {
        Self {
            client,
            store,
            embedder,
            options,
        }
    }

    /// Walk the listing page by page until the cap is reached or the
    /// source runs out of matches.
    pub async fn run(&self) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let mut page: u32 = 1;

        'pages: loop {
            let remaining = self.options.max_statutes.saturating_sub(report.ingested());
            if remaining == 0 {
                break;
            }
            let display = remaining
                .min(self.options.page_size as usize)
                .min(MAX_DISPLAY as usize) as u32;

            let listing = self
                .client
                .list_statutes(self.options.keyword.as_deref(), display, page)
                .await?;
            if listing.summaries.is_empty() {
                break;
            }

            let returned = listing.summaries.len();
            for summary in &listing.summaries {
                if report.ingested() >= self.options.max_statutes {
                    break 'pages;
                }
                self.process_summary(summary, &mut report).await;
            }

            // A short page means the source has no more matches.
            if returned < display as usize {
                break;
            }
            page += 1;
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "ingest run finished"
        );
        Ok(report)
    }

    /// Fetch exactly one statute by its full Korean title. An inexact
    /// listing hit is reported as [`IngestError::NoExactMatch`] with up
    /// to five nearby titles; nothing is written in that case.
    pub async fn fetch_one(&self, name: &str) -> Result<SingleOutcome, IngestError> {
        let existing = self.store.find_statute(name, None).await?;
        if let Some(existing) = existing {
            if !self.options.update_existing {
                return Ok(SingleOutcome::AlreadyStored {
                    created_at: existing.created_at,
                });
            }
        }

        let listing = self.client.list_statutes(Some(name), 10, 1).await?;
        let Some(summary) = listing.summaries.iter().find(|s| s.name == name) else {
            let candidates = listing
                .summaries
                .iter()
                .map(|s| s.name.clone())
                .take(5)
                .collect();
            return Err(IngestError::NoExactMatch {
                name: name.to_string(),
                candidates,
            });
        };
        if summary.external_id.is_empty() {
            return Err(IngestError::MissingExternalId {
                name: name.to_string(),
            });
        }

        let was_update = existing.is_some();
        let id = self.ingest_item(summary, existing).await?;
        Ok(if was_update {
            SingleOutcome::Updated(id)
        } else {
            SingleOutcome::Inserted(id)
        })
    }

    async fn process_summary(&self, summary: &StatuteSummary, report: &mut IngestReport) {
        if summary.external_id.is_empty() {
            debug!(name = %summary.name, "listing entry has no external id, ignoring");
            return;
        }

        let existing = match self
            .store
            .find_statute(&summary.name, Some(&summary.external_id))
            .await
        {
            Ok(existing) => existing,
            Err(err) => match self.options.existence_policy {
                ExistencePolicy::FailOpen => {
                    warn!(name = %summary.name, error = %err, "existence check failed, treating as new");
                    None
                }
                ExistencePolicy::FailClosed => {
                    warn!(name = %summary.name, error = %err, "existence check failed, skipping item");
                    report.failed += 1;
                    return;
                }
            },
        };

        if existing.is_some() && !self.options.update_existing {
            debug!(name = %summary.name, "already stored, skipping");
            report.skipped += 1;
            return;
        }

        let was_update = existing.is_some();
        match self.ingest_item(summary, existing).await {
            Ok(_) => {
                if was_update {
                    report.updated += 1;
                } else {
                    report.inserted += 1;
                }
                if !self.options.request_interval.is_zero() {
                    sleep(self.options.request_interval).await;
                }
            }
            Err(err) => {
                warn!(name = %summary.name, error = %err, "statute ingest failed");
                report.failed += 1;
            }
        }
    }

    /// Pull the full text, embed it, and write it. Updates delete the
    /// old row first so the reinsert sees a clean slate.
    async fn ingest_item(
        &self,
        summary: &StatuteSummary,
        existing: Option<ExistingStatute>,
    ) -> Result<i64, IngestError> {
        let detail = self.client.fetch_detail(&summary.external_id).await?;

        let source_text = embedding_text(summary, &detail);
        let vector = self.embedder.embed(&source_text).await?;
        let embedding = Embedding {
            vector,
            source_text,
        };

        let carried_created_at = match (existing, self.options.update_strategy) {
            (Some(existing), UpdateStrategy::PreserveCreatedAt) => Some(existing.created_at),
            _ => None,
        };
        if let Some(existing) = existing {
            self.store.delete_statute(existing.id).await?;
        }

        let id = self
            .store
            .insert_statute(summary, &detail, &embedding, carried_created_at)
            .await?;
        Ok(id)
    }
}
