//! Inbound webhook payloads and interaction classification.
//!
//! The event source posts loosely-typed JSON; here it is modeled as a tagged
//! union with one variant per supported event kind, discriminated by the
//! `type` field. Anything else deserializes into [`WebhookEvent::Unsupported`]
//! and is acknowledged without processing.
//!
//! One canonical payload shape is supported per event kind: reaction subtypes
//! are the string form (`"like"` / `"recast"`); the numeric encoding used by
//! older webhook versions is not parsed.

use serde::Deserialize;

use crate::types::{ActorId, CastRef, InteractionKind};

/// A webhook delivery from the event source.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEvent {
    /// A user liked or recasted a cast.
    #[serde(rename = "reaction.created")]
    ReactionCreated { data: ReactionData },
    /// A user published a cast. Only casts with a parent (replies) trigger
    /// tips; top-level casts are not interactions with another actor.
    #[serde(rename = "cast.created")]
    CastCreated { data: CastData },
    /// A user followed another user.
    #[serde(rename = "follow.created")]
    FollowCreated { data: FollowData },
    /// Any other event type. Acknowledged and dropped, never an error.
    #[serde(other)]
    Unsupported,
}

/// Minimal view of a user embedded in event payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub fid: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionData {
    /// `"like"` or `"recast"`. Unknown subtypes are not applicable.
    #[serde(default)]
    pub reaction_type: Option<String>,
    /// The reacting user.
    #[serde(default)]
    pub user: Option<UserRef>,
    /// The cast that was reacted to.
    #[serde(default)]
    pub cast: Option<ReactedCast>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactedCast {
    pub hash: String,
    pub author: UserRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastData {
    pub author: UserRef,
    /// Body text; needed for super-tip trigger-phrase matching.
    #[serde(default)]
    pub text: Option<String>,
    /// Present on replies (and quotes, which upstream does not reliably
    /// distinguish). Absent on top-level casts.
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub parent_author: Option<ParentAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentAuthor {
    /// Nullable upstream: deleted or unknown parent authors come through as
    /// `null`.
    #[serde(default)]
    pub fid: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowData {
    #[serde(default)]
    pub follower: Option<UserRef>,
    #[serde(default)]
    pub following: Option<UserRef>,
}

/// A normalized, tip-relevant social interaction.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub from: ActorId,
    pub to: ActorId,
    pub kind: InteractionKind,
    pub cast_ref: Option<CastRef>,
    /// Interaction text, when the kind carries one (comments).
    pub text: Option<String>,
    /// Sender handle for recipient-facing notifications.
    pub from_username: Option<String>,
}

/// Outcome of classifying a webhook event.
#[derive(Debug, Clone)]
pub enum Classification {
    /// A tip-eligible interaction between two distinct actors.
    Tip(Interaction),
    /// The actor interacted with their own content; tipping yourself is
    /// disallowed.
    SelfInteraction,
    /// Recognized event shape but nothing to do (unknown subtype, missing
    /// fields, top-level cast, unsupported type).
    NotApplicable(&'static str),
}

/// Maps a raw webhook event to a normalized [`Interaction`].
pub fn classify(event: &WebhookEvent) -> Classification {
    let interaction = match event {
        WebhookEvent::ReactionCreated { data } => {
            let (Some(reaction_type), Some(user), Some(cast)) =
                (&data.reaction_type, &data.user, &data.cast)
            else {
                return Classification::NotApplicable("Missing required webhook data");
            };
            let kind = match reaction_type.as_str() {
                "like" => InteractionKind::Like,
                "recast" => InteractionKind::Recast,
                _ => return Classification::NotApplicable("Unsupported reaction type"),
            };
            Interaction {
                from: ActorId(user.fid),
                to: ActorId(cast.author.fid),
                kind,
                cast_ref: Some(CastRef(cast.hash.clone())),
                text: None,
                from_username: user.username.clone(),
            }
        }
        WebhookEvent::CastCreated { data } => {
            let Some(parent_hash) = &data.parent_hash else {
                return Classification::NotApplicable("Top-level cast, not an interaction");
            };
            let Some(parent_fid) = data.parent_author.as_ref().and_then(|a| a.fid) else {
                return Classification::NotApplicable("Missing required webhook data");
            };
            Interaction {
                from: ActorId(data.author.fid),
                to: ActorId(parent_fid),
                kind: InteractionKind::Comment,
                cast_ref: Some(CastRef(parent_hash.clone())),
                text: data.text.clone(),
                from_username: data.author.username.clone(),
            }
        }
        WebhookEvent::FollowCreated { data } => {
            let (Some(follower), Some(following)) = (&data.follower, &data.following) else {
                return Classification::NotApplicable("Missing required webhook data");
            };
            Interaction {
                from: ActorId(follower.fid),
                to: ActorId(following.fid),
                kind: InteractionKind::Follow,
                cast_ref: None,
                text: None,
                from_username: follower.username.clone(),
            }
        }
        WebhookEvent::Unsupported => {
            return Classification::NotApplicable("Event type not supported");
        }
    };

    if interaction.from == interaction.to {
        return Classification::SelfInteraction;
    }
    Classification::Tip(interaction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn classifies_like_reaction() {
        let event = parse(serde_json::json!({
            "type": "reaction.created",
            "data": {
                "reaction_type": "like",
                "user": { "fid": 7, "username": "alice" },
                "cast": { "hash": "0xabc", "author": { "fid": 9, "username": "bob" } }
            }
        }));
        match classify(&event) {
            Classification::Tip(i) => {
                assert_eq!(i.from, ActorId(7));
                assert_eq!(i.to, ActorId(9));
                assert_eq!(i.kind, InteractionKind::Like);
                assert_eq!(i.cast_ref, Some(CastRef("0xabc".to_string())));
                assert_eq!(i.from_username.as_deref(), Some("alice"));
            }
            other => panic!("expected tip, got {other:?}"),
        }
    }

    #[test]
    fn classifies_recast_and_rejects_unknown_subtype() {
        let recast = parse(serde_json::json!({
            "type": "reaction.created",
            "data": {
                "reaction_type": "recast",
                "user": { "fid": 7 },
                "cast": { "hash": "0xabc", "author": { "fid": 9 } }
            }
        }));
        assert!(matches!(
            classify(&recast),
            Classification::Tip(Interaction { kind: InteractionKind::Recast, .. })
        ));

        let unknown = parse(serde_json::json!({
            "type": "reaction.created",
            "data": {
                "reaction_type": "downvote",
                "user": { "fid": 7 },
                "cast": { "hash": "0xabc", "author": { "fid": 9 } }
            }
        }));
        assert!(matches!(classify(&unknown), Classification::NotApplicable(_)));
    }

    #[test]
    fn reply_cast_is_a_comment_with_text() {
        let event = parse(serde_json::json!({
            "type": "cast.created",
            "data": {
                "hash": "0xchild",
                "author": { "fid": 3, "username": "carol" },
                "text": "nice work CELO",
                "parent_hash": "0xparent",
                "parent_author": { "fid": 4 }
            }
        }));
        match classify(&event) {
            Classification::Tip(i) => {
                assert_eq!(i.kind, InteractionKind::Comment);
                assert_eq!(i.to, ActorId(4));
                assert_eq!(i.cast_ref, Some(CastRef("0xparent".to_string())));
                assert_eq!(i.text.as_deref(), Some("nice work CELO"));
            }
            other => panic!("expected tip, got {other:?}"),
        }
    }

    #[test]
    fn top_level_cast_is_not_applicable() {
        let event = parse(serde_json::json!({
            "type": "cast.created",
            "data": { "hash": "0xroot", "author": { "fid": 3 }, "text": "gm" }
        }));
        assert!(matches!(classify(&event), Classification::NotApplicable(_)));
    }

    #[test]
    fn reply_with_null_parent_author_is_not_applicable() {
        let event = parse(serde_json::json!({
            "type": "cast.created",
            "data": {
                "hash": "0xchild",
                "author": { "fid": 3 },
                "parent_hash": "0xparent",
                "parent_author": { "fid": null }
            }
        }));
        assert!(matches!(classify(&event), Classification::NotApplicable(_)));
    }

    #[test]
    fn classifies_follow() {
        let event = parse(serde_json::json!({
            "type": "follow.created",
            "data": {
                "follower": { "fid": 1, "username": "alice" },
                "following": { "fid": 2, "username": "bob" }
            }
        }));
        assert!(matches!(
            classify(&event),
            Classification::Tip(Interaction { kind: InteractionKind::Follow, .. })
        ));
    }

    #[test]
    fn self_interaction_short_circuits() {
        let event = parse(serde_json::json!({
            "type": "follow.created",
            "data": { "follower": { "fid": 5 }, "following": { "fid": 5 } }
        }));
        assert!(matches!(classify(&event), Classification::SelfInteraction));
    }

    #[test]
    fn unknown_event_type_is_unsupported() {
        let event = parse(serde_json::json!({
            "type": "channel.created",
            "data": { "whatever": true }
        }));
        assert!(matches!(event, WebhookEvent::Unsupported));
        assert!(matches!(classify(&event), Classification::NotApplicable(_)));
    }
}
