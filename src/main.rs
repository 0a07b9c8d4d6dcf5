//! CastTip relayer HTTP entrypoint.
//!
//! Launches an Axum server that turns signed social-interaction webhooks
//! into relayed on-chain token tips.
//!
//! Endpoints:
//! - `POST /webhook` – HMAC-verified interaction events from the cast network
//! - `POST /webhook/miniapp` – notification-subscription lifecycle events
//! - `GET /health` – liveness plus a store round-trip
//! - `GET /` – service identification
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG_FILE` points at the TOML configuration (default `config.toml`)
//! - `WEBHOOK_SECRET`, `RELAYER_PRIVATE_KEY`, `LOOKUP_API_KEY` carry secrets

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;

use crate::chain::EvmRelay;
use crate::config::{RelayerConfig, Secrets};
use crate::handlers::AppState;
use crate::identity::{HttpIdentityLookup, IdentityResolver};
use crate::notify::PushNotifier;
use crate::pipeline::TipPipeline;
use crate::rules::TipRuleSelector;
use crate::sig_down::SigDown;
use crate::signature::WebhookVerifier;
use crate::store::Store;
use crate::telemetry::Telemetry;

mod chain;
mod config;
mod error;
mod events;
mod handlers;
mod identity;
mod notify;
mod pipeline;
mod rules;
mod sig_down;
mod signature;
mod store;
mod telemetry;
mod types;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = match RelayerConfig::from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            tracing::info!("Using default configuration");
            RelayerConfig::default()
        }
    };

    // Secrets and signature policy are startup-fatal: running without them
    // would either drop every transfer or silently accept forged events.
    let secrets = match Secrets::from_env() {
        Ok(secrets) => secrets,
        Err(e) => {
            tracing::error!("Failed to load secrets: {}", e);
            std::process::exit(1);
        }
    };
    let verifier = match WebhookVerifier::new(secrets.webhook_secret.clone(), config.webhook.mode)
    {
        Ok(verifier) => Arc::new(verifier),
        Err(e) => {
            tracing::error!("Webhook verification misconfigured: {}", e);
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database.url).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to connect to store: {}", e);
            std::process::exit(1);
        }
    };

    let relay = match EvmRelay::try_new(&secrets.relayer_private_key, &config.chain) {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!("Failed to initialize chain relay: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(relayer = %relay.relayer_address(), "chain relay ready");

    let lookup = HttpIdentityLookup::new(
        config.identity.api_base.clone(),
        secrets.lookup_api_key.clone(),
        config.identity.timeout(),
    )?;
    let resolver = IdentityResolver::new(store.profiles(), Arc::new(lookup));

    let push = PushNotifier::new(
        store.notification_tokens(),
        config.notifications.settings_url.clone(),
        config.notifications.timeout(),
    )?;

    let pipeline = Arc::new(TipPipeline::new(
        resolver,
        TipRuleSelector::new(store.rules()),
        store.ledger(),
        Arc::new(relay),
        Arc::new(push.clone()),
    ));

    let state = AppState {
        verifier,
        pipeline,
        store,
        push,
    };

    let cors_layer = cors::CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(cors::Any);

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(state))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            config.server.max_body_size_bytes,
        ))
        .layer(telemetry.http_tracing())
        .layer(cors_layer);

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .map_err(|e| format!("server.host must be a valid IP address: {e}"))?,
        config.server.port,
    );
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    let sig_down = SigDown::try_new()?;
    let cancellation_token = sig_down.cancellation_token();
    let graceful_shutdown = async move { cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    Ok(())
}
