//! Chat pipeline: quota, recall, prompt, streamed reply, and memory write-back.
//!
//! A request is handled in two phases. [`ChatService::prepare`] runs every step
//! that can reject the request (quota, conversation ownership, query embedding)
//! and persists the user's message. [`ChatService::stream`] then spawns a
//! producer task that relays generated fragments over a bounded channel and,
//! once the upstream finishes, persists the reply and remembers the exchange.

pub mod prompt;

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;

use crate::account::store::get_account;
use crate::config::LimitsConfig;
use crate::conversation::{append_message, create_conversation, get_conversation, Role, DEFAULT_TITLE};
use crate::db::{with_conn, SharedDb};
use crate::error::ChatError;
use crate::genai::{EmbeddingProvider, GenerationProvider};
use crate::memory::retrieve::retrieve_relevant;
use crate::memory::store::store_memory;
use crate::usage::{check_daily_limit, increment_usage, today, usage_for};

/// Fragments buffered between the producer and a slow client.
const CHANNEL_CAPACITY: usize = 32;

/// One item of the reply stream, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Fragment(String),
    /// Reply persisted and remembered. Always last on success.
    Done,
    /// Generation failed. Nothing follows.
    Error(String),
}

impl ChatEvent {
    /// Payload of the SSE `data:` line for this event.
    pub fn sse_data(&self) -> String {
        match self {
            Self::Fragment(text) => json!({ "text": text }).to_string(),
            Self::Done => "[DONE]".to_string(),
            Self::Error(message) => json!({ "error": message }).to_string(),
        }
    }
}

/// A request that passed every check and is ready to generate.
#[derive(Debug, Clone)]
pub struct PreparedChat {
    pub account_id: i64,
    pub conversation_id: i64,
    pub user_message: String,
    pub prompt: String,
    pub memories_used: usize,
}

/// Orchestrates one chat exchange against storage and the AI collaborator.
#[derive(Clone)]
pub struct ChatService {
    db: SharedDb,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    limits: LimitsConfig,
}

impl ChatService {
    pub fn new(
        db: SharedDb,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            db,
            embedder,
            generator,
            limits,
        }
    }

    /// Admit a message and build its prompt.
    ///
    /// A quota rejection happens before anything is written. Once admitted, the
    /// day's usage is counted even if embedding fails afterwards.
    pub async fn prepare(
        &self,
        account_id: i64,
        conversation_id: Option<i64>,
        message: &str,
    ) -> Result<PreparedChat> {
        if message.trim().is_empty() {
            return Err(ChatError::invalid_input("message is empty").into());
        }

        let limit = self.limits.free_daily_messages;
        let (conversation_id, used) = with_conn(&self.db, move |conn| {
            let account = get_account(conn, account_id)?
                .ok_or_else(|| ChatError::unauthorized("account no longer exists"))?;
            let day = today();

            if account.plan.is_metered() && !check_daily_limit(conn, account_id, day, limit)? {
                let used = usage_for(conn, account_id, day)?;
                return Err(ChatError::QuotaExceeded { used, limit }.into());
            }

            let tx = conn.transaction()?;
            let conversation_id = match conversation_id {
                Some(id) => {
                    get_conversation(&tx, account_id, id)?
                        .ok_or_else(|| ChatError::not_found(format!("conversation {id}")))?
                        .id
                }
                None => create_conversation(&tx, account_id, DEFAULT_TITLE)?.id,
            };
            let used = increment_usage(&tx, account_id, day)?;
            tx.commit()?;
            Ok((conversation_id, used))
        })
        .await?;

        tracing::info!(account_id, conversation_id, used_today = used, "chat request admitted");

        let query = self.embedder.embed(message).await?;

        let model = self.embedder.model().to_string();
        let top_k = self.limits.memory_top_k;
        let memories = with_conn(&self.db, move |conn| {
            retrieve_relevant(conn, account_id, &query, &model, top_k)
        })
        .await?;

        let prompt = prompt::compose_prompt(&prompt::build_context(&memories), message);

        let user_message = message.to_string();
        let content = user_message.clone();
        with_conn(&self.db, move |conn| {
            append_message(conn, conversation_id, account_id, Role::User, &content)
        })
        .await?;

        tracing::debug!(
            account_id,
            conversation_id,
            memories_used = memories.len(),
            prompt_len = prompt.len(),
            "prompt composed"
        );

        Ok(PreparedChat {
            account_id,
            conversation_id,
            user_message,
            prompt,
            memories_used: memories.len(),
        })
    }

    /// Start generating. Events arrive on the returned receiver; dropping it
    /// cancels the upstream request and skips write-back.
    pub fn stream(&self, prepared: PreparedChat) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let service = self.clone();
        tokio::spawn(async move {
            service.produce(prepared, tx).await;
        });
        rx
    }

    async fn produce(&self, prepared: PreparedChat, tx: mpsc::Sender<ChatEvent>) {
        let conversation_id = prepared.conversation_id;

        let mut upstream = match self.generator.generate_stream(&prepared.prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "generation failed to start");
                let _ = tx.send(ChatEvent::Error(e.to_string())).await;
                return;
            }
        };

        let mut reply = String::new();
        let mut fragments = 0usize;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(fragment) if fragment.is_empty() => continue,
                Ok(fragment) => {
                    reply.push_str(&fragment);
                    if tx.send(ChatEvent::Fragment(fragment)).await.is_err() {
                        tracing::info!(conversation_id, fragments, "client disconnected, abandoning reply");
                        return;
                    }
                    fragments += 1;
                }
                Err(e) => {
                    tracing::warn!(conversation_id, fragments, error = %e, "generation failed mid-stream");
                    let _ = tx.send(ChatEvent::Error(e.to_string())).await;
                    return;
                }
            }
        }
        drop(upstream);

        if tx.is_closed() {
            tracing::info!(conversation_id, "client disconnected before completion");
            return;
        }

        match self.finalize(&prepared, reply).await {
            Ok(memory_id) => {
                tracing::info!(conversation_id, fragments, memory_id, "reply stored");
                let _ = tx.send(ChatEvent::Done).await;
            }
            Err(e) => {
                tracing::error!(conversation_id, error = %e, "failed to store reply");
                let _ = tx.send(ChatEvent::Error(e.to_string())).await;
            }
        }
    }

    /// Persist the reply, then remember the exchange. Returns the memory id.
    async fn finalize(&self, prepared: &PreparedChat, reply: String) -> Result<i64> {
        let account_id = prepared.account_id;
        let conversation_id = prepared.conversation_id;
        let memory = prompt::memory_text(&prepared.user_message, &reply);

        with_conn(&self.db, move |conn| {
            append_message(conn, conversation_id, account_id, Role::Ai, &reply)
        })
        .await?;

        let embedding = self.embedder.embed(&memory).await?;
        let model = self.embedder.model().to_string();
        with_conn(&self.db, move |conn| {
            store_memory(conn, account_id, &memory, &embedding, &model)
        })
        .await
    }
}
