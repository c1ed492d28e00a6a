//! `POST /api/chat`: the streamed reply as server-sent events.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{ApiError, AuthAccount};
use crate::chat::ChatEvent;
use crate::server::AppState;

/// Header naming the conversation the reply belongs to.
pub const CONVERSATION_HEADER: &str = "x-conversation-id";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<i64>,
}

/// Rejections (quota, ownership, embedding failure) come back as plain JSON
/// errors. Once the stream is open, failures arrive in-band.
pub async fn chat(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Json(body): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let prepared = state
        .chat
        .prepare(account.id, body.conversation_id, &body.message)
        .await?;
    let conversation_id = prepared.conversation_id;

    let events = state.chat.stream(prepared);
    let mut response = Sse::new(sse_events(events))
        .keep_alive(KeepAlive::default())
        .into_response();
    response
        .headers_mut()
        .insert(CONVERSATION_HEADER, HeaderValue::from(conversation_id));
    Ok(response)
}

/// Drain the producer's channel as SSE `data:` events. The stream ends when
/// the producer finishes; dropping it closes the channel.
pub fn sse_events(
    rx: mpsc::Receiver<ChatEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(Event::default().data(event.sse_data())), rx))
    })
}
