//! Top-K recall by exhaustive similarity scan.
//!
//! Every memory the account owns (for the active embedding model) is scored
//! against the query and the best `top_k` are returned. O(n) per query; this
//! is the seam where an ANN index would go, keeping the same ranking.

use anyhow::Result;
use rusqlite::Connection;

use super::similarity::cosine_similarity;
use super::store::{find_dimension_mismatch, list_memories};
use super::types::{Memory, ScoredMemory};
use crate::error::ChatError;

/// Default number of memories recalled per chat request.
pub const DEFAULT_TOP_K: usize = 5;

/// Score `memories` against `query` and keep the best `top_k`, highest first.
///
/// Ties come out in unspecified order. A stored vector whose length differs
/// from the query's fails the whole ranking with `DimensionMismatch`.
pub fn rank(memories: Vec<Memory>, query: &[f32], top_k: usize) -> Result<Vec<ScoredMemory>> {
    let mut scored = Vec::with_capacity(memories.len());
    for memory in memories {
        let score = cosine_similarity(query, &memory.embedding)?;
        scored.push(ScoredMemory {
            id: memory.id,
            content: memory.content,
            score,
        });
    }

    scored.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    Ok(scored)
}

/// Ranked memories of one account with their scores.
///
/// Stored rows of a different dimensionality are reported as
/// `DimensionMismatch` before any vector is loaded.
pub fn rank_memories(
    conn: &Connection,
    account_id: i64,
    query: &[f32],
    embedding_model: &str,
    top_k: usize,
) -> Result<Vec<ScoredMemory>> {
    if let Some(actual) = find_dimension_mismatch(conn, account_id, embedding_model, query.len())? {
        return Err(ChatError::DimensionMismatch {
            expected: query.len(),
            actual,
        }
        .into());
    }
    let memories = list_memories(conn, account_id, embedding_model)?;
    let candidates = memories.len();
    let ranked = rank(memories, query, top_k)?;
    tracing::debug!(
        account_id,
        candidates,
        returned = ranked.len(),
        "memories ranked"
    );
    Ok(ranked)
}

/// Text of the `top_k` memories most similar to `query`.
pub fn retrieve_relevant(
    conn: &Connection,
    account_id: i64,
    query: &[f32],
    embedding_model: &str,
    top_k: usize,
) -> Result<Vec<String>> {
    Ok(rank_memories(conn, account_id, query, embedding_model, top_k)?
        .into_iter()
        .map(|m| m.content)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::store_memory;
    use rusqlite::params;

    fn db_with_account() -> Connection {
        let conn = crate::db::open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO accounts (username, email, password_hash, created_at) VALUES (?1, ?2, 'h', 'now')",
            params!["alice", "alice@example.com"],
        )
        .unwrap();
        conn
    }

    fn mem(id: i64, content: &str, embedding: Vec<f32>) -> Memory {
        Memory {
            id,
            account_id: 1,
            content: content.to_string(),
            embedding,
            embedding_model: "m".to_string(),
            created_at: String::new(),
        }
    }

    #[test]
    fn ranks_by_descending_similarity() {
        let memories = vec![
            mem(1, "far", vec![0.0, 1.0]),
            mem(2, "exact", vec![1.0, 0.0]),
            mem(3, "close", vec![0.9, 0.1]),
        ];
        let ranked = rank(memories, &[1.0, 0.0], 5).unwrap();
        let contents: Vec<&str> = ranked.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["exact", "close", "far"]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn truncates_to_top_k() {
        let memories = (0..8)
            .map(|i| mem(i, &format!("m{i}"), vec![1.0, i as f32]))
            .collect();
        let ranked = rank(memories, &[1.0, 0.0], 5).unwrap();
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].content, "m0");
    }

    #[test]
    fn fewer_than_k_returns_all() {
        let memories = vec![mem(1, "a", vec![1.0, 0.0]), mem(2, "b", vec![0.0, 1.0])];
        assert_eq!(rank(memories, &[1.0, 1.0], 5).unwrap().len(), 2);
    }

    #[test]
    fn no_memories_returns_empty() {
        assert!(rank(Vec::new(), &[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn mismatched_dimensions_fail_fast() {
        let memories = vec![mem(1, "short", vec![1.0])];
        let err = rank(memories, &[1.0, 0.0], 5).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn identical_vector_scores_one() {
        let conn = db_with_account();
        let tea = [0.2, 0.9, 0.1, 0.4];
        store_memory(&conn, 1, "I live in Pune", &[0.9, 0.1, 0.3, 0.0], "m").unwrap();
        store_memory(&conn, 1, "I like tea", &tea, "m").unwrap();

        let ranked = rank_memories(&conn, 1, &tea, "m", 5).unwrap();
        assert_eq!(ranked[0].content, "I like tea");
        assert!((ranked[0].score - 1.0).abs() < 1e-6, "score {}", ranked[0].score);
        assert!(ranked[1].score < ranked[0].score);
    }

    #[test]
    fn stored_dimensions_checked_before_decoding() {
        let conn = db_with_account();
        store_memory(&conn, 1, "three dims", &[1.0, 0.0, 0.0], "m").unwrap();

        let err = rank_memories(&conn, 1, &[1.0, 0.0], "m", 5).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::DimensionMismatch { expected: 2, actual: 3 })
        ));

        // a garbage blob is never decoded when the declared size already disagrees
        conn.execute("UPDATE memories SET embedding = x'00'", []).unwrap();
        let err = rank_memories(&conn, 1, &[1.0, 0.0], "m", 5).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::DimensionMismatch { .. })
        ));
    }
}
