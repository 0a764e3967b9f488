//! Statute records exchanged between the API client, the embedder, and the store.

use serde::{Deserialize, Serialize};

/// One listing entry from the statute search API.
///
/// Field values arrive as the API sends them; absent elements decode to
/// empty strings. Dates stay raw (`YYYYMMDD`) until write time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatuteSummary {
    /// External statute id (법령ID). Items without one cannot be ingested.
    pub external_id: String,
    /// Canonical Korean title (법령명한글).
    pub name: String,
    /// Abbreviated title (법령약칭명).
    pub title_abbr: String,
    /// Competent ministry (소관부처명).
    pub ministry: String,
    /// Statute type label (법령구분명).
    pub statute_type: String,
    /// Promulgation number (공포번호).
    pub promulgation_no: String,
    /// Promulgation date, raw `YYYYMMDD` (공포일자).
    pub promulgation_date: String,
    /// Effective date, raw `YYYYMMDD` (시행일자).
    pub effective_date: String,
    /// Revision label (제개정구분명), e.g. 일부개정.
    pub revision_label: String,
}

impl StatuteSummary {
    /// Human-readable revision text stored alongside the statute row.
    pub fn revision_info(&self) -> String {
        format!("{} ({})", self.revision_label, self.promulgation_date)
    }
}

/// A numbered clause within a statute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Article {
    pub number: String,
    pub title: String,
    /// Plain text, HTML tags already stripped.
    pub content: String,
}

/// A dated revision event in a statute's history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: String,
    /// Raw `YYYYMMDD` date; entries that fail to normalise are dropped
    /// at write time rather than stored dateless.
    pub date: String,
    pub number: String,
    pub content: String,
}

/// Articles and history for one statute, in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatuteDetail {
    pub articles: Vec<Article>,
    pub history: Vec<HistoryEntry>,
}

/// A statute's semantic vector together with the exact text it was
/// derived from. Owned 1:1 by the statute row it is written with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub source_text: String,
}
