//! Core identifier and wire types shared across the tip pipeline.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A stable numeric social-network identity (fid) that can send or receive tips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub i64);

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<i64> for ActorId {
    fn from(fid: i64) -> Self {
        ActorId(fid)
    }
}

/// Reference to a single post (cast) on the social network.
///
/// Comments and quotes carry the *parent* cast's reference, reactions carry
/// the reacted-to cast's reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CastRef(pub String);

impl Display for CastRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CastRef {
    fn from(hash: String) -> Self {
        CastRef(hash)
    }
}

/// The normalized kinds of social interaction that can trigger a tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Recast,
    Comment,
    Quote,
    Follow,
}

impl InteractionKind {
    /// Canonical lowercase name, used for tip-config lookups and the
    /// on-chain `interactionType` argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Like => "like",
            InteractionKind::Recast => "recast",
            InteractionKind::Comment => "comment",
            InteractionKind::Quote => "quote",
            InteractionKind::Follow => "follow",
        }
    }

    /// Whether a super-tip trigger phrase in the interaction text can
    /// override the per-kind tip amount. Only text-bearing interactions
    /// qualify.
    pub fn super_tip_eligible(&self) -> bool {
        matches!(self, InteractionKind::Comment | InteractionKind::Quote)
    }
}

impl Display for InteractionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown interaction kind.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown interaction kind: {0}")]
pub struct UnknownInteractionKind(pub String);

impl FromStr for InteractionKind {
    type Err = UnknownInteractionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(InteractionKind::Like),
            "recast" => Ok(InteractionKind::Recast),
            "comment" => Ok(InteractionKind::Comment),
            "quote" => Ok(InteractionKind::Quote),
            "follow" => Ok(InteractionKind::Follow),
            other => Err(UnknownInteractionKind(other.to_string())),
        }
    }
}

/// Body returned for every non-auth webhook outcome.
///
/// Soft stops (self-interaction, unresolved identity, no tip rule) are
/// reported as `200` with an explanatory message so the event source does
/// not re-deliver them as failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Body returned for authentication failures and internal errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_kind_round_trip() {
        for kind in [
            InteractionKind::Like,
            InteractionKind::Recast,
            InteractionKind::Comment,
            InteractionKind::Quote,
            InteractionKind::Follow,
        ] {
            assert_eq!(kind.as_str().parse::<InteractionKind>().unwrap(), kind);
        }
        assert!("boost".parse::<InteractionKind>().is_err());
    }

    #[test]
    fn super_tip_eligibility() {
        assert!(InteractionKind::Comment.super_tip_eligible());
        assert!(InteractionKind::Quote.super_tip_eligible());
        assert!(!InteractionKind::Like.super_tip_eligible());
        assert!(!InteractionKind::Recast.super_tip_eligible());
        assert!(!InteractionKind::Follow.super_tip_eligible());
    }

    #[test]
    fn webhook_response_serializes_without_null_message() {
        let json = serde_json::to_string(&WebhookResponse {
            success: true,
            message: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }
}
