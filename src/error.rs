//! Pipeline error taxonomy and its HTTP mapping.
//!
//! Only two classes of failure surface as non-200 responses: authentication
//! failures (401) and unexpected internal errors (500). Every business-logic
//! outcome is a [`crate::pipeline::TipOutcome`] rendered as 200.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::chain::ChainError;
use crate::store::ledger::LedgerError;
use crate::types::ErrorResponse;

/// Errors that can escape the tip pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The webhook signature was missing or did not match the request body.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The service is misconfigured (e.g. strict verification with no secret).
    #[error("configuration error: {0}")]
    Config(String),

    /// A persistent-store operation failed.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The ledger refused a state transition.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The identity-lookup service failed or returned garbage.
    #[error("identity lookup failed: {0}")]
    Lookup(String),

    /// An on-chain read or write failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            PipelineError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "Invalid signature".to_string())
            }
            other => {
                tracing::error!(error = %other, "webhook processing failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}
