//! Tracing initialization and HTTP request tracing.
//!
//! Log filtering follows `RUST_LOG`, defaulting to `info` for this crate.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Builder-style telemetry registration.
pub struct Telemetry {
    name: &'static str,
    version: &'static str,
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Installs the global tracing subscriber. Safe to call more than once;
    /// later calls are no-ops.
    pub fn register(self) -> Self {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
        tracing::info!(service = self.name, version = self.version, "telemetry registered");
        self
    }

    /// Request/response tracing layer for the HTTP server.
    pub fn http_tracing(&self) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
        TraceLayer::new_for_http()
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
