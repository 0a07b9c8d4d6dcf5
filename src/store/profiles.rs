//! Profile store: maps actor ids to wallet addresses and display metadata.
//!
//! The identity resolver is the sole writer. Upserts are keyed on the actor
//! id, so re-resolving an actor updates the existing row instead of creating
//! a duplicate.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::store::models::Profile;
use crate::types::ActorId;

/// Fields persisted when an identity is resolved.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub connected_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetches the full profile row for an actor.
    pub async fn get(&self, fid: ActorId) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE fid = ?")
            .bind(fid.0)
            .fetch_optional(&self.pool)
            .await
    }

    /// Returns the connected wallet address for an actor, if any.
    pub async fn connected_address(&self, fid: ActorId) -> Result<Option<String>, sqlx::Error> {
        let address: Option<Option<String>> =
            sqlx::query_scalar("SELECT connected_address FROM profiles WHERE fid = ?")
                .bind(fid.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(address.flatten())
    }

    /// Inserts or refreshes a profile, keyed on the actor id.
    ///
    /// `COALESCE` keeps previously-resolved fields when the update carries
    /// nothing fresher, so a partial lookup response never erases data.
    pub async fn upsert(&self, fid: ActorId, update: ProfileUpdate) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO profiles (fid, username, display_name, pfp_url, connected_address, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (fid) DO UPDATE SET
                username          = COALESCE(excluded.username, profiles.username),
                display_name      = COALESCE(excluded.display_name, profiles.display_name),
                pfp_url           = COALESCE(excluded.pfp_url, profiles.pfp_url),
                connected_address = COALESCE(excluded.connected_address, profiles.connected_address),
                updated_at        = excluded.updated_at
            "#,
        )
        .bind(fid.0)
        .bind(&update.username)
        .bind(&update.display_name)
        .bind(&update.pfp_url)
        .bind(&update.connected_address)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of profile rows; used by idempotence tests.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await
    }
}
