//! Statute ingestion from the law.go.kr open API.
//!
//! [`client`] speaks the HTTP side of the API, [`parse`] turns its XML
//! payloads into [`hanlaw_core`] records, and [`ingest`] drives the
//! paginated fetch / embed / store loop.

pub mod client;
pub mod ingest;
pub mod parse;

pub use client::{ApiConfig, ClientError, SourceClient};
pub use ingest::{
    ExistencePolicy, IngestError, IngestOptions, IngestReport, Ingestor, SingleOutcome,
    UpdateStrategy,
};
pub use parse::{ParseError, SearchPage, parse_detail, parse_search_page};
