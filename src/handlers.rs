//! HTTP surface: the event webhook, the miniapp subscription webhook, and
//! operational endpoints.
//!
//! The event webhook reads the raw body bytes before any JSON parsing so the
//! HMAC covers exactly what was sent. Authentication failures are the only
//! 4xx this surface produces; every business-logic outcome is a 200 with a
//! `{success, message}` body so the event source does not re-deliver normal
//! no-op outcomes.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::events::WebhookEvent;
use crate::notify::PushNotifier;
use crate::pipeline::TipPipeline;
use crate::signature::{SIGNATURE_HEADER, WebhookVerifier};
use crate::store::Store;
use crate::types::{ActorId, WebhookResponse};

const WELCOME_TITLE: &str = "Welcome to CastTip!";
const WELCOME_BODY: &str =
    "Engage. Tip. Earn. Configure your auto-tipping settings to start rewarding your favorite creators!";

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<WebhookVerifier>,
    pub pipeline: Arc<TipPipeline>,
    pub store: Store,
    pub push: PushNotifier,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/webhook", post(post_webhook))
        .route("/webhook/miniapp", post(post_miniapp_webhook))
}

pub async fn get_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness plus a store round-trip.
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({ "status": "ok" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
        }
    }
}

/// The main event webhook.
pub async fn post_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, PipelineError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.verifier.verify(&body, signature)?;

    // Post-auth parse failures are acknowledged, not errored: a malformed
    // but correctly signed body will never parse better on re-delivery.
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "webhook body is not valid JSON for any known event");
            return Ok(Json(WebhookResponse::rejected("Invalid payload")));
        }
    };

    let outcome = state.pipeline.process(&event).await?;
    Ok(Json(outcome.webhook_response()))
}

/// Subscription lifecycle events from the miniapp host.
#[derive(Debug, Deserialize)]
pub struct MiniAppPayload {
    pub event: MiniAppEvent,
    #[serde(default)]
    pub notification_details: Option<NotificationDetails>,
    #[serde(default)]
    pub fid: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniAppEvent {
    MiniappAdded,
    MiniappRemoved,
    NotificationsEnabled,
    NotificationsDisabled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct NotificationDetails {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct MiniAppQuery {
    /// Some webhook relays pass the actor id as a query parameter instead of
    /// in the body.
    #[serde(default)]
    pub fid: Option<i64>,
}

pub async fn post_miniapp_webhook(
    State(state): State<AppState>,
    Query(query): Query<MiniAppQuery>,
    Json(payload): Json<MiniAppPayload>,
) -> Result<Json<WebhookResponse>, PipelineError> {
    let Some(fid) = payload.fid.or(query.fid).map(ActorId) else {
        tracing::warn!(event = ?payload.event, "subscription event without an actor id");
        return Ok(Json(WebhookResponse::ok(
            "Event received but no actor to associate",
        )));
    };

    match payload.event {
        MiniAppEvent::MiniappAdded | MiniAppEvent::NotificationsEnabled => {
            let Some(details) = payload.notification_details else {
                return Ok(Json(WebhookResponse::ok(
                    "Event received without notification details",
                )));
            };
            state
                .store
                .notification_tokens()
                .upsert(fid, &details.token, &details.url)
                .await
                .map_err(PipelineError::Database)?;
            tracing::info!(%fid, event = ?payload.event, "notification token stored");

            if payload.event == MiniAppEvent::MiniappAdded {
                // Best-effort; never blocks the webhook response.
                let push = state.push.clone();
                tokio::spawn(async move {
                    push.send(fid, WELCOME_TITLE, WELCOME_BODY).await;
                });
            }
            Ok(Json(WebhookResponse::ok("Notifications enabled")))
        }
        MiniAppEvent::MiniappRemoved | MiniAppEvent::NotificationsDisabled => {
            state
                .store
                .notification_tokens()
                .invalidate(fid)
                .await
                .map_err(PipelineError::Database)?;
            tracing::info!(%fid, event = ?payload.event, "notification token invalidated");
            Ok(Json(WebhookResponse::ok("Notifications disabled")))
        }
        MiniAppEvent::Unknown => Ok(Json(WebhookResponse::ok("Event ignored"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainError, TipChain};
    use crate::identity::{IdentityLookup, IdentityResolver, ResolvedIdentity};
    use crate::notify::Notify;
    use crate::rules::TipRuleSelector;
    use crate::signature::VerificationMode;
    use crate::types::{CastRef, InteractionKind};
    use alloy::primitives::{Address, TxHash, U256};
    use async_trait::async_trait;
    use axum::http::{Request, StatusCode};
    use hmac::Mac;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SECRET: &str = "test-webhook-secret";

    struct NoChain;

    #[async_trait]
    impl TipChain for NoChain {
        async fn allowance(&self, _: Address, _: Address) -> Result<U256, ChainError> {
            Err(ChainError::ContractCall("unused".to_string()))
        }
        async fn decimals(&self, _: Address) -> Result<u8, ChainError> {
            Err(ChainError::ContractCall("unused".to_string()))
        }
        async fn send_tip(
            &self,
            _: Address,
            _: Address,
            _: Address,
            _: U256,
            _: InteractionKind,
            _: Option<&CastRef>,
        ) -> Result<TxHash, ChainError> {
            Err(ChainError::ContractCall("unused".to_string()))
        }
    }

    struct NoNotify;

    #[async_trait]
    impl Notify for NoNotify {
        async fn tip_received(&self, _: ActorId, _: &str, _: f64, _: &str, _: InteractionKind) {}
        async fn allowance_exhausted(&self, _: ActorId, _: &str) {}
    }

    struct NoLookup;

    #[async_trait]
    impl IdentityLookup for NoLookup {
        async fn lookup(&self, _: ActorId) -> Result<Option<ResolvedIdentity>, PipelineError> {
            Ok(None)
        }
    }

    async fn app() -> (Router, Store) {
        let store = Store::in_memory().await.unwrap();
        let verifier = Arc::new(
            WebhookVerifier::new(Some(SECRET.to_string()), VerificationMode::Strict).unwrap(),
        );
        let pipeline = Arc::new(TipPipeline::new(
            IdentityResolver::new(store.profiles(), Arc::new(NoLookup)),
            TipRuleSelector::new(store.rules()),
            store.ledger(),
            Arc::new(NoChain),
            Arc::new(NoNotify),
        ));
        let push = PushNotifier::new(
            store.notification_tokens(),
            "https://casttip.example/settings",
            std::time::Duration::from_secs(1),
        )
        .unwrap();
        let state = AppState {
            verifier,
            pipeline,
            store: store.clone(),
            push,
        };
        (routes().with_state(state), store)
    }

    fn sign(body: &str) -> String {
        let mut mac =
            hmac::Hmac::<sha2::Sha512>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn webhook_request(body: &str, signature: Option<&str>) -> Request<axum::body::Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(axum::body::Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn missing_signature_is_401() {
        let (app, _store) = app().await;
        let body = r#"{"type":"follow.created","data":{}}"#;
        let response = app.oneshot(webhook_request(body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid signature");
    }

    #[tokio::test]
    async fn tampered_body_is_401() {
        let (app, _store) = app().await;
        let signature = sign(r#"{"type":"follow.created","data":{}}"#);
        let response = app
            .oneshot(webhook_request(
                r#"{"type":"follow.created","data":{"extra":1}}"#,
                Some(&signature),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signed_unsupported_event_is_acknowledged() {
        let (app, _store) = app().await;
        let body = r#"{"type":"channel.created","data":{}}"#;
        let response = app
            .oneshot(webhook_request(body, Some(&sign(body))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn signed_malformed_json_is_acknowledged_as_rejected() {
        let (app, _store) = app().await;
        let body = "this is not json";
        let response = app
            .oneshot(webhook_request(body, Some(&sign(body))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn self_interaction_reports_skip_message() {
        let (app, store) = app().await;
        let body = r#"{"type":"follow.created","data":{"follower":{"fid":5},"following":{"fid":5}}}"#;
        let response = app
            .oneshot(webhook_request(body, Some(&sign(body))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Self-interaction skipped");
        assert_eq!(store.ledger().count().await.unwrap(), 0);
    }

    fn miniapp_request(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn miniapp_added_stores_token() {
        let (app, store) = app().await;
        let response = app
            .oneshot(miniapp_request(
                "/webhook/miniapp",
                serde_json::json!({
                    "event": "miniapp_added",
                    "fid": 42,
                    "notification_details": { "url": "https://push.example/send", "token": "tok-42" }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let token = store
            .notification_tokens()
            .valid_token(ActorId(42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.token, "tok-42");
    }

    #[tokio::test]
    async fn fid_can_come_from_the_query_string() {
        let (app, store) = app().await;
        let response = app
            .oneshot(miniapp_request(
                "/webhook/miniapp?fid=77",
                serde_json::json!({
                    "event": "notifications_enabled",
                    "notification_details": { "url": "https://push.example/send", "token": "tok-77" }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            store
                .notification_tokens()
                .valid_token(ActorId(77))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn notifications_disabled_invalidates_token() {
        let (app, store) = app().await;
        store
            .notification_tokens()
            .upsert(ActorId(9), "tok-9", "https://push.example/send")
            .await
            .unwrap();

        let response = app
            .oneshot(miniapp_request(
                "/webhook/miniapp",
                serde_json::json!({ "event": "notifications_disabled", "fid": 9 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            store
                .notification_tokens()
                .valid_token(ActorId(9))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn subscription_event_without_fid_is_acknowledged() {
        let (app, store) = app().await;
        let response = app
            .oneshot(miniapp_request(
                "/webhook/miniapp",
                serde_json::json!({
                    "event": "miniapp_added",
                    "notification_details": { "url": "https://push.example/send", "token": "tok" }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert!(
            store
                .notification_tokens()
                .valid_token(ActorId(0))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _store) = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }
}
