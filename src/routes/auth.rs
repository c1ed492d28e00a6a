//! Registration, login/logout and the caller's own account view.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{bearer_token, ApiError, AuthAccount};
use crate::account::session::{create_session, delete_session};
use crate::account::store::{register as register_account, verify_credentials};
use crate::account::Account;
use crate::db::with_conn;
use crate::server::AppState;
use crate::usage::{today, usage_for};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub account: Account,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account: Account,
    pub used_today: u32,
    /// `None` for unmetered plans.
    pub daily_limit: Option<u32>,
    pub remaining_today: Option<u32>,
}

/// `POST /api/register`: create the account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let response = with_conn(&state.db, move |conn| {
        let account = register_account(conn, &body.username, &body.email, &body.password)?;
        let token = create_session(conn, account.id)?;
        Ok(SessionResponse { token, account })
    })
    .await?;

    tracing::info!(account_id = response.account.id, "account registered");
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let response = with_conn(&state.db, move |conn| {
        let account = verify_credentials(conn, &body.username, &body.password)?;
        let token = create_session(conn, account.id)?;
        Ok(SessionResponse { token, account })
    })
    .await?;

    tracing::info!(account_id = response.account.id, "login");
    Ok(Json(response))
}

/// `POST /api/logout`: drop the presented session.
pub async fn logout(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = bearer_token(&headers).map(str::to_string) {
        with_conn(&state.db, move |conn| delete_session(conn, &token)).await?;
        tracing::info!(account_id = account.id, "logout");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/me`
pub async fn me(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
) -> Result<Json<MeResponse>, ApiError> {
    let account_id = account.id;
    let used_today = with_conn(&state.db, move |conn| usage_for(conn, account_id, today())).await?;

    let daily_limit = account
        .plan
        .is_metered()
        .then_some(state.config.limits.free_daily_messages);
    Ok(Json(MeResponse {
        remaining_today: daily_limit.map(|limit| limit.saturating_sub(used_today)),
        daily_limit,
        used_today,
        account,
    }))
}
