//! Memory record definitions.

use serde::Serialize;

/// A stored memory, matching the `memories` table schema.
#[derive(Debug, Clone, Serialize)]
pub struct Memory {
    pub id: i64,
    /// Owning account.
    pub account_id: i64,
    /// `user text + " " + ai text` of the exchange this memory came from.
    pub content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Model that produced `embedding`; only same-model vectors are compared.
    pub embedding_model: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// A memory with its similarity to the query it was recalled for.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub id: i64,
    pub content: String,
    pub score: f32,
}
