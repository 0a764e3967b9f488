//! Date normalisation, HTML stripping, and embedding-text assembly.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::{StatuteDetail, StatuteSummary};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Normalise a raw API date into a calendar date.
///
/// Accepts exactly 8 ASCII digits (`YYYYMMDD`). Anything else, including
/// punctuated or calendar-invalid input, is `None`, never an error.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Strip `<...>` tag runs from article content.
///
/// Lossy on purpose: the output feeds the embedding corpus, not a
/// rendering pipeline.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

/// Assemble the text a statute is embedded from: title, revision info,
/// then every article's number, title, and content in document order,
/// space-joined. Deterministic for a fixed summary and detail.
pub fn embedding_text(summary: &StatuteSummary, detail: &StatuteDetail) -> String {
    let mut text = format!("{} {}", summary.name, summary.revision_info());
    for article in &detail.articles {
        text.push(' ');
        text.push_str(&article.number);
        text.push(' ');
        text.push_str(&article.title);
        text.push(' ');
        text.push_str(&article.content);
    }
    text
}
