//! XML payload decoding for the statute API.
//!
//! Both payload shapes are flat: a handful of scalar fields at the root
//! and repeated container elements (`law` in listings, `조문`/`연혁` in
//! detail responses) whose children are simple text fields. A single
//! event-walking scanner handles both; the typed entry points map the
//! scanned fields onto [`hanlaw_core`] records.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

use hanlaw_core::{Article, HistoryEntry, StatuteDetail, StatuteSummary, strip_tags};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// One page of the statute listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub total_count: u64,
    pub page: u32,
    pub summaries: Vec<StatuteSummary>,
}

#[derive(Debug, Default)]
struct RawDoc {
    root_fields: HashMap<String, String>,
    records: Vec<(String, HashMap<String, String>)>,
}

impl RawDoc {
    fn store(&mut self, current: &mut Option<(String, HashMap<String, String>)>, name: String, value: String) {
        match current {
            Some((_, fields)) => {
                fields.insert(name, value);
            }
            None => {
                self.root_fields.insert(name, value);
            }
        }
    }
}

/// Walk the document once, collecting root-level text fields and the
/// fields of each `containers` element. Elements that are neither
/// (wrapper elements like the document root) contribute nothing
/// themselves; their children are read as if they sat one level up.
fn scan(xml: &str, containers: &[&str]) -> Result<RawDoc, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = RawDoc::default();
    let mut current: Option<(String, HashMap<String, String>)> = None;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if current.is_none() && containers.contains(&name.as_str()) {
                    current = Some((name, HashMap::new()));
                    field = None;
                    text.clear();
                } else if field.is_none() || text.is_empty() {
                    field = Some(name);
                    text.clear();
                }
                // A child element after accumulated text is inline markup
                // in mixed content; keep collecting into the open field.
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if current.is_none() && containers.contains(&name.as_str()) {
                    doc.records.push((name, HashMap::new()));
                } else {
                    doc.store(&mut current, name, String::new());
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape().unwrap_or_default());
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                let name = String::from_utf8_lossy(local.as_ref());
                if field.as_deref() == Some(name.as_ref()) {
                    let name = field.take().unwrap_or_default();
                    doc.store(&mut current, name, std::mem::take(&mut text));
                } else if current.as_ref().is_some_and(|(c, _)| c == name.as_ref()) {
                    if let Some(record) = current.take() {
                        doc.records.push(record);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(doc)
}

fn take(fields: &mut HashMap<String, String>, key: &str) -> String {
    fields.remove(key).unwrap_or_default()
}

/// Decode one page of the listing endpoint. Absent fields decode to
/// empty strings; a page with no `law` elements is a valid empty page.
pub fn parse_search_page(xml: &str) -> Result<SearchPage, ParseError> {
    let mut doc = scan(xml, &["law"])?;

    let total_count = doc
        .root_fields
        .get("totalCnt")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    let page = doc
        .root_fields
        .get("page")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1);

    let summaries = doc
        .records
        .iter_mut()
        .map(|(_, fields)| StatuteSummary {
            external_id: take(fields, "법령ID"),
            name: take(fields, "법령명한글"),
            title_abbr: take(fields, "법령약칭명"),
            ministry: take(fields, "소관부처명"),
            statute_type: take(fields, "법령구분명"),
            promulgation_no: take(fields, "공포번호"),
            promulgation_date: take(fields, "공포일자"),
            effective_date: take(fields, "시행일자"),
            revision_label: take(fields, "제개정구분명"),
        })
        .collect();

    Ok(SearchPage {
        total_count,
        page,
        summaries,
    })
}

/// Decode a statute detail response into its articles (in document
/// order, content tag-stripped) and history entries. `기본정보` fields
/// are ignored; summary data comes from the listing.
pub fn parse_detail(xml: &str) -> Result<StatuteDetail, ParseError> {
    let mut doc = scan(xml, &["조문", "연혁"])?;

    let mut detail = StatuteDetail::default();
    for (container, fields) in doc.records.iter_mut() {
        match container.as_str() {
            "조문" => detail.articles.push(Article {
                number: take(fields, "조문번호"),
                title: take(fields, "조문제목"),
                content: strip_tags(&take(fields, "조문내용")),
            }),
            "연혁" => detail.history.push(HistoryEntry {
                kind: take(fields, "연혁구분"),
                date: take(fields, "연혁일자"),
                number: take(fields, "연혁번호"),
                content: take(fields, "연혁내용"),
            }),
            _ => {}
        }
    }

    Ok(detail)
}
