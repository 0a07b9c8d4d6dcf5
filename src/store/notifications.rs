//! Notification-token storage.
//!
//! Tokens are written by the subscription webhook when an actor enables
//! notifications, read by the notifier, and flagged invalid when the
//! delivery endpoint reports them stale so they are not retried forever.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::store::models::NotificationToken;
use crate::types::ActorId;

#[derive(Debug, Clone)]
pub struct NotificationTokenStore {
    pool: SqlitePool,
}

impl NotificationTokenStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The actor's push token, if one exists and is still valid.
    pub async fn valid_token(
        &self,
        fid: ActorId,
    ) -> Result<Option<NotificationToken>, sqlx::Error> {
        sqlx::query_as::<_, NotificationToken>(
            "SELECT * FROM notification_tokens WHERE fid = ? AND is_valid = 1",
        )
        .bind(fid.0)
        .fetch_optional(&self.pool)
        .await
    }

    /// Stores (or refreshes) the actor's push token, marking it valid.
    pub async fn upsert(
        &self,
        fid: ActorId,
        token: &str,
        notification_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO notification_tokens (fid, token, notification_url, is_valid, updated_at)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT (fid) DO UPDATE SET
                token            = excluded.token,
                notification_url = excluded.notification_url,
                is_valid         = 1,
                updated_at       = excluded.updated_at
            "#,
        )
        .bind(fid.0)
        .bind(token)
        .bind(notification_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Flags the actor's token invalid (unsubscribed, or delivery reported
    /// it permanently stale).
    pub async fn invalidate(&self, fid: ActorId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notification_tokens SET is_valid = 0, updated_at = ? WHERE fid = ?",
        )
        .bind(Utc::now())
        .bind(fid.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
