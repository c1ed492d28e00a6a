use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub genai: GenAiConfig,
    pub billing: BillingConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BillingConfig {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub product_name: String,
    pub unit_amount_cents: u32,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub signature_tolerance_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub free_daily_messages: u32,
    pub memory_top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            genai: GenAiConfig::default(),
            billing: BillingConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_suhan_dir()
            .join("suhan_ai.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            chat_model: "gemini-1.5-flash".into(),
            embedding_model: "embedding-001".into(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            publishable_key: String::new(),
            webhook_secret: String::new(),
            api_base: "https://api.stripe.com/v1".into(),
            product_name: "Pro Plan".into(),
            unit_amount_cents: 999,
            currency: "usd".into(),
            success_url: "http://localhost:5000/chat?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "http://localhost:5000/billing".into(),
            signature_tolerance_secs: 300,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            free_daily_messages: crate::usage::FREE_DAILY_LIMIT,
            memory_top_k: crate::memory::retrieve::DEFAULT_TOP_K,
        }
    }
}

impl BillingConfig {
    /// Human-readable unit price, e.g. `$9.99`.
    pub fn display_price(&self) -> String {
        format!(
            "${}.{:02}",
            self.unit_amount_cents / 100,
            self.unit_amount_cents % 100
        )
    }
}

/// Returns `~/.suhan/`, or `./.suhan/` when no home directory can be found.
pub fn default_suhan_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".suhan")
}

/// Returns the default config file path: `~/.suhan/config.toml`
pub fn default_config_path() -> PathBuf {
    default_suhan_dir().join("config.toml")
}

impl AppConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            AppConfig::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides for secrets, port, database and log level.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("GENAI_API_KEY") {
            self.genai.api_key = val;
        }
        if let Ok(val) = std::env::var("STRIPE_SECRET_KEY") {
            self.billing.secret_key = val;
        }
        if let Ok(val) = std::env::var("STRIPE_PUBLISHABLE_KEY") {
            self.billing.publishable_key = val;
        }
        if let Ok(val) = std::env::var("STRIPE_WEBHOOK_SECRET") {
            self.billing.webhook_secret = val;
        }
        if let Ok(val) = std::env::var("PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("PORT must be a port number, got {val:?}"))?;
        }
        if let Ok(val) = std::env::var("SUHAN_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SUHAN_LOG_LEVEL") {
            self.server.log_level = val;
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// `host:port` string the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
