//! Tip-rule selection.
//!
//! For text-bearing interaction kinds the sender's super-tip configuration
//! is checked first: if its trigger phrase appears in the text
//! (case-insensitive substring), it fully overrides the per-kind amount.
//! Otherwise the enabled per-kind configuration applies, and `None` means
//! the sender has not configured tipping for this kind.

use crate::error::PipelineError;
use crate::store::RuleStore;
use crate::types::{ActorId, InteractionKind};

/// The tip configuration chosen for one interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTip {
    pub token_address: String,
    pub token_symbol: String,
    /// Decimal amount in whole-token units.
    pub amount: f64,
    /// Whether a super-tip trigger phrase produced this selection.
    pub super_tip: bool,
}

#[derive(Clone)]
pub struct TipRuleSelector {
    rules: RuleStore,
}

impl TipRuleSelector {
    pub fn new(rules: RuleStore) -> Self {
        Self { rules }
    }

    /// Selects the tip configuration for (sender, kind, text).
    pub async fn select(
        &self,
        sender: ActorId,
        kind: InteractionKind,
        text: Option<&str>,
    ) -> Result<Option<SelectedTip>, PipelineError> {
        if kind.super_tip_eligible()
            && let Some(text) = text
            && let Some(config) = self.rules.super_tip_config(sender).await?
            && text
                .to_lowercase()
                .contains(&config.trigger_phrase.to_lowercase())
        {
            tracing::info!(
                %sender,
                phrase = %config.trigger_phrase,
                amount = config.amount,
                "super-tip trigger matched"
            );
            return Ok(Some(SelectedTip {
                token_address: config.token_address,
                token_symbol: config.token_symbol,
                amount: config.amount,
                super_tip: true,
            }));
        }

        Ok(self
            .rules
            .tip_config(sender, kind)
            .await?
            .map(|config| SelectedTip {
                token_address: config.token_address,
                token_symbol: config.token_symbol,
                amount: config.amount,
                super_tip: false,
            }))
    }
}
