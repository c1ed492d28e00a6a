//! Semantic memory: one record per completed exchange, recalled by cosine
//! similarity over a full scan of the owner's embeddings.

pub mod retrieve;
pub mod similarity;
pub mod store;
pub mod types;

use anyhow::{ensure, Result};

/// Encode an embedding as little-endian `f32` bytes for the `memories.embedding` blob.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a blob written by [`embedding_to_bytes`].
pub fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    ensure!(
        bytes.len() % 4 == 0,
        "embedding blob length {} is not a multiple of 4",
        bytes.len()
    );
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
