//! Row models for the persistent store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A social identity seen by the pipeline, with its resolved wallet address.
///
/// Created on first sight of an actor and updated whenever a fresher address
/// is resolved; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    /// Payable wallet address; null until first resolution.
    pub connected_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-(actor, interaction-kind) tip configuration. Read-only to the
/// pipeline; edited by the actor through the settings surface.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TipConfig {
    pub fid: i64,
    pub interaction_type: String,
    pub token_address: String,
    pub token_symbol: String,
    /// Decimal amount in whole-token units (e.g. 0.01 cUSD).
    pub amount: f64,
    pub is_enabled: bool,
}

/// At most one per actor: a trigger-phrase override that replaces the
/// per-kind amount when the phrase appears in the interaction text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SuperTipConfig {
    pub fid: i64,
    pub trigger_phrase: String,
    pub token_address: String,
    pub token_symbol: String,
    pub amount: f64,
    pub is_enabled: bool,
}

/// Lifecycle state of a tip attempt.
///
/// `pending` rows transition to exactly one terminal state and are immutable
/// thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TipStatus {
    Pending,
    Completed,
    Failed,
}

/// Durable record of one tip attempt; the audit log of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TipRecord {
    pub id: String,
    pub from_fid: i64,
    pub to_fid: i64,
    pub token_address: String,
    pub token_symbol: String,
    pub amount: f64,
    pub interaction_type: String,
    pub cast_hash: Option<String>,
    pub status: TipStatus,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to open a `pending` ledger row before relay submission.
#[derive(Debug, Clone)]
pub struct NewTipRecord {
    pub from_fid: i64,
    pub to_fid: i64,
    pub token_address: String,
    pub token_symbol: String,
    pub amount: f64,
    pub interaction_type: String,
    pub cast_hash: Option<String>,
}

/// Push-delivery credential for one actor. Written by the subscription
/// webhook; flagged invalid when delivery reports it stale.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationToken {
    pub fid: i64,
    pub token: String,
    pub notification_url: String,
    pub is_valid: bool,
    pub updated_at: DateTime<Utc>,
}
