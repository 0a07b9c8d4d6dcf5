//! Service configuration.
//!
//! Non-secret settings load from `config.toml` (path overridable via the
//! `CONFIG_FILE` env var) with serde defaults, so a missing file yields a
//! runnable development configuration. Secrets — the relayer signing key, the
//! webhook shared secret, and the identity-lookup API key — come from the
//! environment only and are never written to disk.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::PipelineError;
use crate::signature::VerificationMode;

/// Complete relayer configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayerConfig {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub chain: ChainConfig,
    pub identity: IdentityConfig,
    pub database: DatabaseConfig,
    pub notifications: NotificationsConfig,
}

impl RelayerConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file returns the default configuration; a malformed file is
    /// an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from the `CONFIG_FILE` env var or `config.toml`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::from_file(config_path)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum webhook body size in bytes.
    pub max_body_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size_bytes: 1_048_576,
        }
    }
}

/// Webhook authentication settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// `strict` (default) refuses to start without a webhook secret;
    /// `permissive` accepts unsigned deliveries with a warning.
    pub mode: VerificationMode,
}

/// Chain and tipping-contract settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the target chain.
    pub rpc_url: String,
    /// Address of the tipping contract holding user allowances.
    pub tip_contract: String,
    /// Confirmations to wait for before a tip counts as completed.
    pub confirmations: u64,
    /// Bound on the receipt wait; on expiry the ledger row stays `pending`
    /// for out-of-band reconciliation, never automatic resubmission.
    pub receipt_timeout_seconds: u64,
    /// Connect/request timeout for the RPC HTTP client.
    pub rpc_timeout_seconds: u64,
}

impl ChainConfig {
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_seconds)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://forno.celo.org".to_string(),
            tip_contract: "0x6b3A9c2b4b4BB24D5DFa59132499cb4Fd29C733e".to_string(),
            confirmations: 1,
            receipt_timeout_seconds: 120,
            rpc_timeout_seconds: 30,
        }
    }
}

/// Identity-lookup service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the user-lookup API.
    pub api_base: String,
    /// Request timeout for lookup calls.
    pub timeout_seconds: u64,
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.neynar.com/v2".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Persistent-store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://casttip.db?mode=rwc".to_string(),
        }
    }
}

/// Push-notification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Landing page linked from every push message.
    pub settings_url: String,
    /// Delivery timeout for push POSTs.
    pub timeout_seconds: u64,
}

impl NotificationsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            settings_url: "https://casttip.example/settings".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Secrets pulled from the environment at startup.
#[derive(Clone)]
pub struct Secrets {
    /// Shared secret the event source uses to sign webhook bodies.
    pub webhook_secret: Option<String>,
    /// Hex-encoded private key of the shared relayer identity.
    pub relayer_private_key: String,
    /// API key for the identity-lookup service.
    pub lookup_api_key: Option<String>,
}

impl Secrets {
    /// Reads `WEBHOOK_SECRET`, `RELAYER_PRIVATE_KEY` and `LOOKUP_API_KEY`.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] if the relayer key is missing — the
    /// service cannot submit transactions without it.
    pub fn from_env() -> Result<Self, PipelineError> {
        let relayer_private_key = std::env::var("RELAYER_PRIVATE_KEY")
            .map_err(|_| PipelineError::Config("RELAYER_PRIVATE_KEY not configured".to_string()))?;
        Ok(Self {
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            relayer_private_key,
            lookup_api_key: std::env::var("LOOKUP_API_KEY").ok(),
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("relayer_private_key", &"<redacted>")
            .field(
                "lookup_api_key",
                &self.lookup_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
