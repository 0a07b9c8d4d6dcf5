//! Push notifications to actors who enabled them in the miniapp.
//!
//! Delivery is strictly best-effort: every failure is logged and swallowed,
//! so a down push endpoint can never fail a webhook or roll back a relayed
//! transfer. Tokens the endpoint reports invalid are flagged in the store and
//! not retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::store::NotificationTokenStore;
use crate::types::{ActorId, InteractionKind};

/// Notification sink for pipeline outcomes.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Tells a recipient they received a tip.
    async fn tip_received(
        &self,
        recipient: ActorId,
        sender_username: &str,
        amount: f64,
        token_symbol: &str,
        kind: InteractionKind,
    );

    /// Tells a sender their on-chain allowance no longer covers their
    /// configured tip amount.
    async fn allowance_exhausted(&self, sender: ActorId, token_symbol: &str);
}

/// Wire format of one push delivery.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload<'a> {
    notification_id: String,
    title: &'a str,
    body: &'a str,
    target_url: &'a str,
    tokens: Vec<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PushResult {
    invalid_tokens: Vec<String>,
}

/// HTTP notifier posting to each actor's stored notification endpoint.
#[derive(Clone)]
pub struct PushNotifier {
    http: reqwest::Client,
    tokens: NotificationTokenStore,
    settings_url: String,
}

impl PushNotifier {
    pub fn new(
        tokens: NotificationTokenStore,
        settings_url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("push HTTP client: {e}")))?;
        Ok(Self {
            http,
            tokens,
            settings_url: settings_url.into(),
        })
    }

    /// Sends one push to `fid` if a valid token exists. Never fails the
    /// caller; logs and returns on any error.
    pub async fn send(&self, fid: ActorId, title: &str, body: &str) {
        let token = match self.tokens.valid_token(fid).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(%fid, "no valid notification token, skipping push");
                return;
            }
            Err(e) => {
                tracing::warn!(%fid, error = %e, "notification token lookup failed");
                return;
            }
        };

        let payload = PushPayload {
            notification_id: Uuid::new_v4().to_string(),
            title,
            body,
            target_url: &self.settings_url,
            tokens: vec![&token.token],
        };

        let response = match self
            .http
            .post(&token.notification_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%fid, error = %e, "push delivery failed");
                return;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(%fid, status = %response.status(), "push endpoint rejected delivery");
            return;
        }

        // The endpoint reports tokens it will never accept again.
        if let Ok(result) = response.json::<PushResult>().await
            && result.invalid_tokens.iter().any(|t| *t == token.token)
        {
            tracing::info!(%fid, "push endpoint reported token invalid, flagging");
            if let Err(e) = self.tokens.invalidate(fid).await {
                tracing::warn!(%fid, error = %e, "failed to flag invalid token");
            }
        }
    }
}

#[async_trait]
impl Notify for PushNotifier {
    async fn tip_received(
        &self,
        recipient: ActorId,
        sender_username: &str,
        amount: f64,
        token_symbol: &str,
        kind: InteractionKind,
    ) {
        let body = format!(
            "@{sender_username} tipped you {amount} {token_symbol} for your {}",
            kind.as_str()
        );
        self.send(recipient, "You received a tip!", &body).await;
    }

    async fn allowance_exhausted(&self, sender: ActorId, token_symbol: &str) {
        let body = format!(
            "Your {token_symbol} tipping allowance is used up. Top it up to keep tipping."
        );
        self.send(sender, "Tipping allowance exhausted", &body).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_payload_serializes_camel_case() {
        let payload = PushPayload {
            notification_id: "n-1".to_string(),
            title: "You received a tip!",
            body: "@alice tipped you 0.01 cUSD for your like",
            target_url: "https://casttip.example/settings",
            tokens: vec!["tok-1"],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["notificationId"], "n-1");
        assert_eq!(json["targetUrl"], "https://casttip.example/settings");
        assert_eq!(json["tokens"][0], "tok-1");
    }

    #[test]
    fn push_result_tolerates_unknown_fields() {
        let result: PushResult = serde_json::from_str(
            r#"{"successfulTokens":["a"],"invalidTokens":["b"],"rateLimitedTokens":[]}"#,
        )
        .unwrap();
        assert_eq!(result.invalid_tokens, vec!["b".to_string()]);
    }
}
