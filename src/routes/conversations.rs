use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{ApiError, AuthAccount};
use crate::conversation::{self, Conversation, Message, DEFAULT_TITLE};
use crate::db::with_conn;
use crate::error::ChatError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// `GET /api/conversations`
pub async fn list(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let conversations =
        with_conn(&state.db, move |conn| conversation::list_conversations(conn, account.id)).await?;
    Ok(Json(conversations))
}

/// `POST /api/conversations`
pub async fn create(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let title = body.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let created = with_conn(&state.db, move |conn| {
        conversation::create_conversation(conn, account.id, &title)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/conversations/{id}/messages`
pub async fn messages(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = with_conn(&state.db, move |conn| {
        if conversation::get_conversation(conn, account.id, conversation_id)?.is_none() {
            return Err(ChatError::not_found(format!("conversation {conversation_id}")).into());
        }
        conversation::list_messages(conn, conversation_id)
    })
    .await?;
    Ok(Json(messages))
}
