//! Webhook signature verification.
//!
//! The event source signs every delivery with HMAC-SHA-512 over the raw
//! request body, hex-encoded in a request header. Verification runs before
//! the body is parsed; a mismatch rejects the request with 401 and no side
//! effects.
//!
//! Whether a missing secret is fatal is an explicit startup choice
//! ([`VerificationMode`]), never a silent runtime branch: `strict` refuses to
//! construct a verifier without a secret, `permissive` accepts everything
//! with a loud warning (development only).

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;

use crate::error::PipelineError;

type HmacSha512 = Hmac<Sha512>;

/// Name of the request header carrying the hex-encoded HMAC-SHA-512 digest.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Startup choice for how unauthenticated webhooks are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// A shared secret is required; requests without a valid signature are
    /// rejected. This is the only mode fit for production.
    #[default]
    Strict,
    /// No secret configured: every request is accepted. Logged loudly.
    Permissive,
}

/// Authenticates inbound webhook deliveries.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Option<Vec<u8>>,
}

impl WebhookVerifier {
    /// Builds a verifier for the given mode.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] when `mode` is strict and no secret
    /// is configured.
    pub fn new(secret: Option<String>, mode: VerificationMode) -> Result<Self, PipelineError> {
        match (secret, mode) {
            (Some(secret), _) => Ok(Self {
                secret: Some(secret.into_bytes()),
            }),
            (None, VerificationMode::Strict) => Err(PipelineError::Config(
                "webhook verification is strict but no webhook secret is configured".to_string(),
            )),
            (None, VerificationMode::Permissive) => {
                tracing::warn!(
                    "webhook signature verification is DISABLED (permissive mode, no secret)"
                );
                Ok(Self { secret: None })
            }
        }
    }

    /// Verifies `signature` (hex HMAC-SHA-512) against the raw request body.
    ///
    /// The comparison is constant-time via [`Mac::verify_slice`].
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), PipelineError> {
        let Some(secret) = &self.secret else {
            tracing::warn!("accepting unverified webhook delivery (permissive mode)");
            return Ok(());
        };

        let signature = signature.ok_or(PipelineError::InvalidSignature)?;
        let provided = hex::decode(signature.trim()).map_err(|_| PipelineError::InvalidSignature)?;

        let mut mac = HmacSha512::new_from_slice(secret)
            .map_err(|e| PipelineError::Config(format!("invalid webhook secret: {e}")))?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| PipelineError::InvalidSignature)
    }
}
