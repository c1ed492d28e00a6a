//! HTTP server initialization.
//!
//! [`setup_state`] wires the database, AI providers and billing client into an
//! [`AppState`]; [`router`] mounts the API on it; [`serve`] runs it until ctrl-c.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::billing::checkout::StripeClient;
use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::db::{self, SharedDb};
use crate::genai;
use crate::routes;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub chat: ChatService,
    pub billing: Arc<StripeClient>,
    pub config: Arc<AppConfig>,
}

/// Open the database, build the providers and record the active embedding model.
pub fn setup_state(config: AppConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let (embedder, generator) = genai::create_providers(&config.genai)?;
    let active_model = embedder.model().to_string();

    match db::migrations::get_embedding_model(&conn)? {
        Some(stored) if stored != active_model => {
            tracing::warn!(
                stored = %stored,
                configured = %active_model,
                "embedding model changed; memories from the old model will not be recalled"
            );
        }
        _ => {}
    }
    db::migrations::set_embedding_model(&conn, &active_model)?;

    let db = Arc::new(Mutex::new(conn));
    let billing = Arc::new(StripeClient::new(&config.billing)?);
    let chat = ChatService::new(db.clone(), embedder, generator, config.limits.clone());
    tracing::info!(chat_model = %config.genai.chat_model, embedding_model = %active_model, "providers ready");

    Ok(AppState {
        db,
        chat,
        billing,
        config: Arc::new(config),
    })
}

/// Every route of the public API.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route(
            "/conversations",
            get(routes::conversations::list).post(routes::conversations::create),
        )
        .route(
            "/conversations/{id}/messages",
            get(routes::conversations::messages),
        )
        .route("/chat", post(routes::chat::chat))
        .route("/billing/config", get(routes::billing::config))
        .route("/billing/checkout", post(routes::billing::checkout));

    Router::new()
        .route("/health", get(routes::health))
        .route("/webhook", post(routes::billing::webhook))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve HTTP until ctrl-c.
pub async fn serve(config: AppConfig) -> Result<()> {
    let bind_addr = config.bind_addr();
    let state = setup_state(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
