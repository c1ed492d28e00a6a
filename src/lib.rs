//! Memory-grounded streaming chat service.
//!
//! Suhan answers each user message with a streamed reply from a hosted
//! generative model, grounded in what the same user said before. Every
//! completed exchange is embedded and remembered; the next request recalls the
//! most similar memories and places them in the prompt.
//!
//! Free accounts get a small daily allowance. A completed card checkout,
//! reported by the payment processor's signed webhook, lifts the account to the
//! unmetered Pro plan.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) for accounts, sessions, conversations, memories
//!   and the usage ledger; embeddings as little-endian `f32` BLOBs
//! - **Recall**: cosine similarity over a full scan of the account's memories
//! - **Generation**: Gemini `embedContent` and `streamGenerateContent` behind
//!   provider traits
//! - **Transport**: axum JSON API; replies stream as server-sent events
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`db`]: database initialization, schema, migrations and health checks
//! - [`memory`]: memory storage, similarity scoring and retrieval
//! - [`usage`]: per-day message ledger
//! - [`chat`]: the request pipeline from quota check to memory write-back
//! - [`billing`]: checkout creation and webhook-driven plan upgrades

pub mod account;
pub mod billing;
pub mod chat;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod genai;
pub mod memory;
pub mod routes;
pub mod server;
pub mod usage;
