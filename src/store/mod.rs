//! SQLite-backed persistence: profiles, tip rules, the transaction ledger,
//! and notification tokens.
//!
//! The schema is created on connect, so a fresh database file is immediately
//! usable. All queries are runtime-bound (`query`/`query_as`); no offline
//! prepared-statement cache is required to build.

pub mod ledger;
pub mod models;
pub mod notifications;
pub mod profiles;
pub mod rules;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub use ledger::{Ledger, LedgerError};
pub use notifications::NotificationTokenStore;
pub use profiles::ProfileStore;
pub use rules::RuleStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    fid               INTEGER PRIMARY KEY,
    username          TEXT,
    display_name      TEXT,
    pfp_url           TEXT,
    connected_address TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tip_configs (
    fid              INTEGER NOT NULL,
    interaction_type TEXT NOT NULL,
    token_address    TEXT NOT NULL,
    token_symbol     TEXT NOT NULL,
    amount           REAL NOT NULL,
    is_enabled       INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (fid, interaction_type)
);

CREATE TABLE IF NOT EXISTS super_tip_configs (
    fid            INTEGER PRIMARY KEY,
    trigger_phrase TEXT NOT NULL,
    token_address  TEXT NOT NULL,
    token_symbol   TEXT NOT NULL,
    amount         REAL NOT NULL,
    is_enabled     INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS transactions (
    id               TEXT PRIMARY KEY,
    from_fid         INTEGER NOT NULL,
    to_fid           INTEGER NOT NULL,
    token_address    TEXT NOT NULL,
    token_symbol     TEXT NOT NULL,
    amount           REAL NOT NULL,
    interaction_type TEXT NOT NULL,
    cast_hash        TEXT,
    status           TEXT NOT NULL,
    tx_hash          TEXT,
    error_message    TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_from_fid ON transactions (from_fid);

CREATE TABLE IF NOT EXISTS notification_tokens (
    fid              INTEGER PRIMARY KEY,
    token            TEXT NOT NULL,
    notification_url TEXT NOT NULL,
    is_valid         INTEGER NOT NULL DEFAULT 1,
    updated_at       TEXT NOT NULL
);
"#;

/// Handle to the persistent store. Cloning is cheap; all clones share one
/// connection pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connects to `url` and ensures the schema exists.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::info!(url, "connected to store");
        Ok(Self { pool })
    }

    /// An isolated in-memory store, used by tests.
    ///
    /// Pinned to a single connection: every pooled connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn profiles(&self) -> ProfileStore {
        ProfileStore::new(self.pool.clone())
    }

    pub fn rules(&self) -> RuleStore {
        RuleStore::new(self.pool.clone())
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.pool.clone())
    }

    pub fn notification_tokens(&self) -> NotificationTokenStore {
        NotificationTokenStore::new(self.pool.clone())
    }
}
