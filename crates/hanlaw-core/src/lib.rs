pub mod statute;
pub mod text;

pub use statute::{Article, Embedding, HistoryEntry, StatuteDetail, StatuteSummary};
pub use text::{embedding_text, normalize_date, strip_tags};
