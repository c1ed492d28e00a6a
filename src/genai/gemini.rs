//! Google Gemini REST client (`embedContent` and `streamGenerateContent`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, FragmentStream, GenerationProvider};
use crate::config::GenAiConfig;
use crate::error::ChatError;

/// Gemini provider for both embeddings and chat generation.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    chat_model: String,
    embedding_model: String,
}

impl GeminiClient {
    pub fn new(config: &GenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            tracing::warn!("no generative-AI API key configured (set GENAI_API_KEY); upstream calls will fail");
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, model, method)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::user(text),
        };

        let response = self
            .client
            .post(self.endpoint(&self.embedding_model, "embedContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::upstream(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::upstream(format!(
                "embedding request returned {status}: {}",
                error_message(&body)
            ))
            .into());
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ChatError::upstream(format!("malformed embedding response: {e}")))?;

        if parsed.embedding.values.is_empty() {
            return Err(ChatError::upstream("embedding response contained no values").into());
        }
        Ok(parsed.embedding.values)
    }

    fn model(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let request = GenerateRequest {
            contents: vec![Content::user(prompt)],
        };

        tracing::debug!(model = %self.chat_model, prompt_len = prompt.len(), "starting generation stream");

        let response = self
            .client
            .post(format!(
                "{}?alt=sse",
                self.endpoint(&self.chat_model, "streamGenerateContent")
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::upstream(format!("generation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::upstream(format!(
                "generation request returned {status}: {}",
                error_message(&body)
            ))
            .into());
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => chunk_text(&event.data).transpose(),
                    Err(e) => Some(Err(ChatError::upstream(format!("stream interrupted: {e}")).into())),
                }
            });

        Ok(Box::pin(stream))
    }
}

/// Extract the text carried by one SSE `data:` payload.
///
/// `Ok(None)` for keep-alives and chunks without text (e.g. a bare finish
/// reason). A blocked prompt or an in-band error object is an upstream failure.
pub(crate) fn chunk_text(data: &str) -> Result<Option<String>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| ChatError::upstream(format!("malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(ChatError::upstream(error.message).into());
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ChatError::upstream(format!("prompt blocked: {reason}")).into());
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}

/// Best-effort extraction of `error.message` from an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: Some("user".into()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
