//! Tip-rule storage: per-kind configurations and super-tip overrides.
//!
//! The pipeline only reads these tables; actors edit them through the
//! settings surface, which is out of scope here. Write methods exist for
//! that surface and for tests.

use sqlx::SqlitePool;

use crate::store::models::{SuperTipConfig, TipConfig};
use crate::types::{ActorId, InteractionKind};

#[derive(Debug, Clone)]
pub struct RuleStore {
    pool: SqlitePool,
}

impl RuleStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enabled tip configuration for (actor, kind), if any.
    pub async fn tip_config(
        &self,
        fid: ActorId,
        kind: InteractionKind,
    ) -> Result<Option<TipConfig>, sqlx::Error> {
        sqlx::query_as::<_, TipConfig>(
            "SELECT * FROM tip_configs WHERE fid = ? AND interaction_type = ? AND is_enabled = 1",
        )
        .bind(fid.0)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    /// Enabled super-tip configuration for an actor, if any. At most one
    /// exists per actor (primary key).
    pub async fn super_tip_config(
        &self,
        fid: ActorId,
    ) -> Result<Option<SuperTipConfig>, sqlx::Error> {
        sqlx::query_as::<_, SuperTipConfig>(
            "SELECT * FROM super_tip_configs WHERE fid = ? AND is_enabled = 1",
        )
        .bind(fid.0)
        .fetch_optional(&self.pool)
        .await
    }

    /// Creates or replaces a per-kind tip configuration.
    pub async fn upsert_tip_config(&self, config: &TipConfig) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tip_configs (fid, interaction_type, token_address, token_symbol, amount, is_enabled)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (fid, interaction_type) DO UPDATE SET
                token_address = excluded.token_address,
                token_symbol  = excluded.token_symbol,
                amount        = excluded.amount,
                is_enabled    = excluded.is_enabled
            "#,
        )
        .bind(config.fid)
        .bind(&config.interaction_type)
        .bind(&config.token_address)
        .bind(&config.token_symbol)
        .bind(config.amount)
        .bind(config.is_enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Creates or replaces an actor's super-tip configuration.
    pub async fn upsert_super_tip_config(
        &self,
        config: &SuperTipConfig,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO super_tip_configs (fid, trigger_phrase, token_address, token_symbol, amount, is_enabled)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (fid) DO UPDATE SET
                trigger_phrase = excluded.trigger_phrase,
                token_address  = excluded.token_address,
                token_symbol   = excluded.token_symbol,
                amount         = excluded.amount,
                is_enabled     = excluded.is_enabled
            "#,
        )
        .bind(config.fid)
        .bind(&config.trigger_phrase)
        .bind(&config.token_address)
        .bind(&config.token_symbol)
        .bind(config.amount)
        .bind(config.is_enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn like_config(fid: i64, enabled: bool) -> TipConfig {
        TipConfig {
            fid,
            interaction_type: "like".to_string(),
            token_address: "0x765DE816845861e75A25fCA122bb6898B8B1282a".to_string(),
            token_symbol: "cUSD".to_string(),
            amount: 0.01,
            is_enabled: enabled,
        }
    }

    #[tokio::test]
    async fn disabled_configs_are_invisible() {
        let store = Store::in_memory().await.unwrap();
        let rules = store.rules();

        rules.upsert_tip_config(&like_config(1, false)).await.unwrap();
        assert!(
            rules
                .tip_config(ActorId(1), InteractionKind::Like)
                .await
                .unwrap()
                .is_none()
        );

        rules.upsert_tip_config(&like_config(1, true)).await.unwrap();
        let config = rules
            .tip_config(ActorId(1), InteractionKind::Like)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(config.token_symbol, "cUSD");
        assert_eq!(config.amount, 0.01);
    }

    #[tokio::test]
    async fn configs_are_scoped_per_kind() {
        let store = Store::in_memory().await.unwrap();
        let rules = store.rules();
        rules.upsert_tip_config(&like_config(1, true)).await.unwrap();

        assert!(
            rules
                .tip_config(ActorId(1), InteractionKind::Comment)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            rules
                .tip_config(ActorId(2), InteractionKind::Like)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn one_super_tip_config_per_actor() {
        let store = Store::in_memory().await.unwrap();
        let rules = store.rules();

        let mut config = SuperTipConfig {
            fid: 9,
            trigger_phrase: "CELO".to_string(),
            token_address: "0x471EcE3750Da237f93B8E339c536989b8978a438".to_string(),
            token_symbol: "CELO".to_string(),
            amount: 5.0,
            is_enabled: true,
        };
        rules.upsert_super_tip_config(&config).await.unwrap();

        config.trigger_phrase = "GM".to_string();
        rules.upsert_super_tip_config(&config).await.unwrap();

        let stored = rules.super_tip_config(ActorId(9)).await.unwrap().unwrap();
        assert_eq!(stored.trigger_phrase, "GM");
    }
}
