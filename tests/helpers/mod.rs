#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use rusqlite::{params, Connection};
use suhan::account::store::get_account;
use suhan::account::{Account, Plan};
use suhan::chat::{ChatEvent, ChatService};
use suhan::config::LimitsConfig;
use suhan::db::{self, SharedDb};
use suhan::error::ChatError;
use suhan::genai::{EmbeddingProvider, FragmentStream, GenerationProvider};
use tokio::sync::mpsc;

pub const DIMS: usize = 16;
pub const TEST_MODEL: &str = "test-embedding";

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn shared(conn: Connection) -> SharedDb {
    Arc::new(Mutex::new(conn))
}

/// Deterministic embedding with a spike at position `seed`.
/// Distinct seeds are orthogonal.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    v[seed as usize % DIMS] = 1.0;
    v
}

/// Insert an account without paying for a real password hash.
pub fn create_account(conn: &Connection, username: &str, plan: Plan) -> Account {
    conn.execute(
        "INSERT INTO accounts (username, email, password_hash, plan, created_at) VALUES (?1, ?2, 'x', ?3, ?4)",
        params![
            username,
            format!("{username}@example.com"),
            plan.as_str(),
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .unwrap();
    get_account(conn, conn.last_insert_rowid()).unwrap().unwrap()
}

/// Embeds known texts to fixed vectors and everything else to `fallback`.
pub struct FakeEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            fallback: test_embedding(DIMS as u8 - 1),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(ChatError::upstream("embedding service unavailable").into());
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn model(&self) -> &str {
        TEST_MODEL
    }
}

/// Replays fixed fragments, optionally failing after the first `fail_after`.
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    fail_after: Option<usize>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail_after: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(ChatError::upstream("model overloaded").into()));
        }

        let delay = self.delay;
        let stream = stream::unfold(items.into_iter(), move |mut items| async move {
            let item = items.next()?;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Some((item, items))
        });
        Ok(Box::pin(stream))
    }
}

pub fn limits() -> LimitsConfig {
    LimitsConfig {
        free_daily_messages: 10,
        memory_top_k: 5,
    }
}

pub fn service(
    db: &SharedDb,
    embedder: Arc<FakeEmbedder>,
    generator: Arc<ScriptedGenerator>,
) -> ChatService {
    ChatService::new(db.clone(), embedder, generator, limits())
}

/// Drain a reply stream to its end.
pub async fn collect(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
