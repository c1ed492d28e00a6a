//! Typed failures that callers need to tell apart.
//!
//! Storage and domain functions return `anyhow::Result`; when a failure has a
//! meaning beyond "the step failed" it is raised as a [`ChatError`] inside the
//! `anyhow::Error` and recovered at the HTTP boundary with `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Unprivileged account already used its daily allowance.
    #[error("Daily limit exceeded.")]
    QuotaExceeded { used: u32, limit: u32 },

    /// Embedding or generation call failed.
    #[error("upstream generation failure: {0}")]
    Upstream(String),

    /// Two vectors of different length were compared.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector with zero magnitude was compared.
    #[error("cannot score a zero-magnitude embedding")]
    ZeroVector,

    /// Username or email is already registered.
    #[error("Username or email already exists.")]
    DuplicateIdentity,

    /// Billing notification could not be verified or mapped to an account.
    #[error("payment verification failed: {0}")]
    PaymentVerification(String),

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ChatError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn payment(msg: impl Into<String>) -> Self {
        Self::PaymentVerification(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
