//! The transaction ledger: one durable row per tip attempt.
//!
//! A row is created in `pending` state **before** the relay submission, so a
//! crash between submission and confirmation leaves an auditable record for
//! manual reconciliation instead of a silently lost transfer. Terminal
//! transitions are one-way: updates are guarded on `status = 'pending'` and
//! a zero-row update surfaces as [`LedgerError::AlreadyTerminal`].

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::store::models::{NewTipRecord, TipRecord, TipStatus};

/// Errors from ledger state transitions.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Attempted to move a row out of a terminal state.
    #[error("ledger row {0} is already in a terminal state")]
    AlreadyTerminal(String),
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a `pending` row for a tip attempt and returns its id.
    pub async fn create(&self, record: NewTipRecord) -> Result<String, LedgerError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, from_fid, to_fid, token_address, token_symbol, amount,
                 interaction_type, cast_hash, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(record.from_fid)
        .bind(record.to_fid)
        .bind(&record.token_address)
        .bind(&record.token_symbol)
        .bind(record.amount)
        .bind(&record.interaction_type)
        .bind(&record.cast_hash)
        .bind(TipStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        tracing::info!(ledger_id = %id, from = record.from_fid, to = record.to_fid, "ledger row created");
        Ok(id)
    }

    /// Marks a pending row completed with its transaction hash.
    pub async fn mark_completed(&self, id: &str, tx_hash: &str) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE transactions SET status = ?, tx_hash = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(TipStatus::Completed)
        .bind(tx_hash)
        .bind(Utc::now())
        .bind(id)
        .bind(TipStatus::Pending)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::AlreadyTerminal(id.to_string()));
        }
        Ok(())
    }

    /// Marks a pending row failed with a human-readable error message.
    pub async fn mark_failed(&self, id: &str, error_message: &str) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE transactions SET status = ?, error_message = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(TipStatus::Failed)
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .bind(TipStatus::Pending)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::AlreadyTerminal(id.to_string()));
        }
        Ok(())
    }

    /// Fetches a ledger row by id.
    pub async fn get(&self, id: &str) -> Result<Option<TipRecord>, LedgerError> {
        Ok(
            sqlx::query_as::<_, TipRecord>("SELECT * FROM transactions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Total row count; used by tests asserting that soft stops leave no
    /// trace in the ledger.
    pub async fn count(&self) -> Result<i64, LedgerError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn record() -> NewTipRecord {
        NewTipRecord {
            from_fid: 1,
            to_fid: 2,
            token_address: "0x765DE816845861e75A25fCA122bb6898B8B1282a".to_string(),
            token_symbol: "cUSD".to_string(),
            amount: 0.01,
            interaction_type: "like".to_string(),
            cast_hash: Some("0xabc".to_string()),
        }
    }

    #[tokio::test]
    async fn pending_to_completed_carries_tx_hash() {
        let store = Store::in_memory().await.unwrap();
        let ledger = store.ledger();

        let id = ledger.create(record()).await.unwrap();
        let row = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(row.status, TipStatus::Pending);
        assert!(row.tx_hash.is_none());

        ledger.mark_completed(&id, "0xdeadbeef").await.unwrap();
        let row = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(row.status, TipStatus::Completed);
        assert_eq!(row.tx_hash.as_deref(), Some("0xdeadbeef"));
        assert!(row.error_message.is_none());
    }

    #[tokio::test]
    async fn pending_to_failed_carries_error_message() {
        let store = Store::in_memory().await.unwrap();
        let ledger = store.ledger();

        let id = ledger.create(record()).await.unwrap();
        ledger.mark_failed(&id, "execution reverted").await.unwrap();

        let row = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(row.status, TipStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("execution reverted"));
        assert!(row.tx_hash.is_none());
    }

    #[tokio::test]
    async fn terminal_rows_are_immutable() {
        let store = Store::in_memory().await.unwrap();
        let ledger = store.ledger();

        let id = ledger.create(record()).await.unwrap();
        ledger.mark_completed(&id, "0x1").await.unwrap();

        assert!(matches!(
            ledger.mark_failed(&id, "late failure").await,
            Err(LedgerError::AlreadyTerminal(_))
        ));
        assert!(matches!(
            ledger.mark_completed(&id, "0x2").await,
            Err(LedgerError::AlreadyTerminal(_))
        ));

        // The original outcome is untouched.
        let row = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(row.status, TipStatus::Completed);
        assert_eq!(row.tx_hash.as_deref(), Some("0x1"));
    }
}
