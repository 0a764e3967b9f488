//! Embedding layer: text → fixed-dimension vector against an HTTP model server.

mod embedder;
pub use embedder::{EmbedConfig, EmbedError, Embedder, HttpEmbedder, MockEmbedder};
