//! HTTP handlers and the glue between [`ChatError`] and HTTP responses.

pub mod auth;
pub mod billing;
pub mod chat;
pub mod conversations;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::Connection;
use serde_json::json;

use crate::account::session::authenticate;
use crate::account::Account;
use crate::db::with_conn;
use crate::error::ChatError;
use crate::server::AppState;

/// Any handler failure. Typed [`ChatError`]s keep their status; everything
/// else is a 500.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// HTTP status for a typed failure.
pub fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        ChatError::Upstream(_) => StatusCode::BAD_GATEWAY,
        ChatError::DuplicateIdentity => StatusCode::CONFLICT,
        ChatError::PaymentVerification(_) | ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ChatError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::DimensionMismatch { .. } | ChatError::ZeroVector => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.downcast_ref::<ChatError>() {
            Some(err) => (status_for(err), err.to_string()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string()),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %format!("{:#}", self.0), "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Account owning `token`. Sessions last until logout.
pub fn account_for_token(conn: &Connection, token: &str) -> anyhow::Result<Account> {
    authenticate(conn, token)?.ok_or_else(|| ChatError::unauthorized("unknown session").into())
}

/// The caller's account, resolved from their bearer session token. The plan is
/// read fresh on every request.
pub struct AuthAccount(pub Account);

impl FromRequestParts<AppState> for AuthAccount {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ChatError::unauthorized("missing bearer token"))?
            .to_string();

        let account = with_conn(&state.db, move |conn| account_for_token(conn, &token)).await?;
        Ok(Self(account))
    }
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn typed_errors_map_to_statuses() {
        let cases = [
            (ChatError::QuotaExceeded { used: 10, limit: 10 }, 429),
            (ChatError::upstream("timeout"), 502),
            (ChatError::DuplicateIdentity, 409),
            (ChatError::payment("bad signature"), 400),
            (ChatError::unauthorized("no token"), 401),
            (ChatError::not_found("conversation 3"), 404),
            (ChatError::ZeroVector, 500),
        ];
        for (err, code) in cases {
            assert_eq!(status_for(&err).as_u16(), code, "{err}");
        }
    }

    #[test]
    fn quota_response_carries_fixed_message() {
        let response = ApiError::from(ChatError::QuotaExceeded { used: 10, limit: 10 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn untyped_errors_are_internal() {
        let response = ApiError::from(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn session_tokens_resolve_until_logout() {
        let conn = crate::db::open_memory_database().unwrap();
        let account =
            crate::account::store::register(&conn, "alice", "alice@example.com", "hunter22").unwrap();
        let token = crate::account::session::create_session(&conn, account.id).unwrap();

        assert_eq!(account_for_token(&conn, &token).unwrap().id, account.id);

        crate::account::session::delete_session(&conn, &token).unwrap();
        for bad in [token.as_str(), "not-a-token"] {
            let err = account_for_token(&conn, bad).unwrap_err();
            let typed = err.downcast_ref::<ChatError>().unwrap();
            assert_eq!(status_for(typed), StatusCode::UNAUTHORIZED);
            assert_eq!(typed.to_string(), ChatError::unauthorized("unknown session").to_string());
            assert!(!typed.to_string().contains("expired"));
        }
    }
}
