//! The tip pipeline: verified event in, terminal outcome out.
//!
//! Every branch of the state machine is a value of [`TipOutcome`], so the
//! handler can map outcomes to webhook responses without re-deriving any
//! decision. Soft stops (self-interaction, unresolved identities, no rule,
//! insufficient allowance) acknowledge the delivery and leave no ledger row;
//! only attempts that reach the relay create one, and that row is opened
//! `pending` before submission.

use alloy::primitives::U256;
use std::sync::Arc;

use crate::chain::{TipChain, parse_address, to_token_units};
use crate::error::PipelineError;
use crate::events::{Classification, Interaction, WebhookEvent, classify};
use crate::identity::IdentityResolver;
use crate::notify::Notify;
use crate::rules::TipRuleSelector;
use crate::store::Ledger;
use crate::store::models::NewTipRecord;
use crate::types::WebhookResponse;

/// Terminal outcome of processing one webhook event.
#[derive(Debug, Clone)]
pub enum TipOutcome {
    /// Recognized but not tip-relevant (unsupported type, missing fields,
    /// top-level cast).
    Ignored(&'static str),
    /// Actor interacted with their own content.
    SelfInteraction,
    /// Sender has no stored wallet address; they have not opted in.
    SenderUnregistered,
    /// Recipient wallet could not be resolved, locally or via lookup.
    RecipientUnresolved,
    /// Sender has no enabled tip configuration for this interaction kind.
    NoTipRule,
    /// The allowance could not be read; treated as a stop, never a guess.
    AllowanceUnverifiable,
    /// Allowance is below the configured tip amount. Sender is notified.
    InsufficientAllowance,
    /// Relay submission or receipt failed; ledger row is `failed`.
    RelayFailed { ledger_id: String, error: String },
    /// Tip confirmed on-chain; ledger row is `completed`.
    Completed { ledger_id: String, tx_hash: String },
}

impl TipOutcome {
    /// The body returned to the webhook caller. Soft stops acknowledge the
    /// delivery so the event source does not re-deliver.
    pub fn webhook_response(&self) -> WebhookResponse {
        match self {
            TipOutcome::Ignored(reason) => WebhookResponse::ok(*reason),
            TipOutcome::SelfInteraction => WebhookResponse::ok("Self-interaction skipped"),
            TipOutcome::SenderUnregistered => {
                WebhookResponse::ok("Sender has no connected wallet")
            }
            TipOutcome::RecipientUnresolved => {
                WebhookResponse::ok("Recipient has no resolvable wallet address")
            }
            TipOutcome::NoTipRule => {
                WebhookResponse::ok("No tip configured for this interaction")
            }
            TipOutcome::AllowanceUnverifiable => {
                WebhookResponse::ok("Tipping allowance could not be verified")
            }
            TipOutcome::InsufficientAllowance => {
                WebhookResponse::ok("Insufficient tipping allowance")
            }
            TipOutcome::RelayFailed { .. } => WebhookResponse::rejected("Tip transfer failed"),
            TipOutcome::Completed { .. } => WebhookResponse::ok("Tip sent successfully"),
        }
    }
}

/// Orchestrates classification, resolution, rule selection, the allowance
/// gate, the relayed transfer and the ledger transitions.
pub struct TipPipeline {
    resolver: IdentityResolver,
    selector: TipRuleSelector,
    ledger: Ledger,
    chain: Arc<dyn TipChain>,
    notifier: Arc<dyn Notify>,
}

impl TipPipeline {
    pub fn new(
        resolver: IdentityResolver,
        selector: TipRuleSelector,
        ledger: Ledger,
        chain: Arc<dyn TipChain>,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        Self {
            resolver,
            selector,
            ledger,
            chain,
            notifier,
        }
    }

    /// Runs one verified webhook event through the full pipeline.
    #[tracing::instrument(skip_all)]
    pub async fn process(&self, event: &WebhookEvent) -> Result<TipOutcome, PipelineError> {
        let interaction = match classify(event) {
            Classification::Tip(interaction) => interaction,
            Classification::SelfInteraction => {
                tracing::debug!("self-interaction, skipping");
                return Ok(TipOutcome::SelfInteraction);
            }
            Classification::NotApplicable(reason) => {
                tracing::debug!(reason, "event not applicable");
                return Ok(TipOutcome::Ignored(reason));
            }
        };
        self.process_interaction(interaction).await
    }

    async fn process_interaction(
        &self,
        interaction: Interaction,
    ) -> Result<TipOutcome, PipelineError> {
        let Interaction {
            from,
            to,
            kind,
            cast_ref,
            text,
            from_username,
        } = interaction;
        tracing::info!(%from, %to, kind = kind.as_str(), "processing interaction");

        // Senders are never looked up externally: a missing profile means
        // they have not opted in to tipping.
        let Some(sender_address) = self.resolver.sender_address(from).await? else {
            return Ok(TipOutcome::SenderUnregistered);
        };

        let Some(tip) = self.selector.select(from, kind, text.as_deref()).await? else {
            return Ok(TipOutcome::NoTipRule);
        };

        let Some(recipient_address) = self.resolver.resolve(to).await? else {
            return Ok(TipOutcome::RecipientUnresolved);
        };

        let sender = parse_address(&sender_address)?;
        let recipient = parse_address(&recipient_address)?;
        let token = parse_address(&tip.token_address)?;

        // Advisory allowance gate. Read failures stop the attempt without a
        // notification; only a confirmed shortfall notifies the sender. The
        // contract re-checks atomically during the transfer either way.
        let amount_units = match self.check_allowance(sender, token, tip.amount).await {
            AllowanceCheck::Covered(units) => units,
            AllowanceCheck::Short => {
                tracing::info!(%from, token = %tip.token_symbol, "allowance below configured amount");
                self.notifier.allowance_exhausted(from, &tip.token_symbol).await;
                return Ok(TipOutcome::InsufficientAllowance);
            }
            AllowanceCheck::Unverifiable => return Ok(TipOutcome::AllowanceUnverifiable),
        };

        // Durable record first: a crash after this point leaves a `pending`
        // row for reconciliation instead of a silently lost transfer.
        let ledger_id = self
            .ledger
            .create(NewTipRecord {
                from_fid: from.0,
                to_fid: to.0,
                token_address: tip.token_address.clone(),
                token_symbol: tip.token_symbol.clone(),
                amount: tip.amount,
                interaction_type: kind.as_str().to_string(),
                cast_hash: cast_ref.as_ref().map(|c| c.0.clone()),
            })
            .await?;

        match self
            .chain
            .send_tip(sender, recipient, token, amount_units, kind, cast_ref.as_ref())
            .await
        {
            Ok(tx_hash) => {
                let tx_hash = tx_hash.to_string();
                self.ledger.mark_completed(&ledger_id, &tx_hash).await?;
                tracing::info!(%ledger_id, %tx_hash, super_tip = tip.super_tip, "tip completed");

                let sender_handle = from_username.as_deref().unwrap_or("someone");
                self.notifier
                    .tip_received(to, sender_handle, tip.amount, &tip.token_symbol, kind)
                    .await;

                Ok(TipOutcome::Completed { ledger_id, tx_hash })
            }
            Err(e) => {
                let error = e.to_string();
                self.ledger.mark_failed(&ledger_id, &error).await?;
                tracing::warn!(%ledger_id, error = %error, "tip relay failed");
                Ok(TipOutcome::RelayFailed { ledger_id, error })
            }
        }
    }

    async fn check_allowance(
        &self,
        sender: alloy::primitives::Address,
        token: alloy::primitives::Address,
        amount: f64,
    ) -> AllowanceCheck {
        let decimals = match self.chain.decimals(token).await {
            Ok(decimals) => decimals,
            Err(e) => {
                tracing::warn!(%token, error = %e, "decimals read failed");
                return AllowanceCheck::Unverifiable;
            }
        };
        let units = match to_token_units(amount, decimals) {
            Ok(units) => units,
            Err(e) => {
                tracing::warn!(amount, error = %e, "configured amount not representable");
                return AllowanceCheck::Unverifiable;
            }
        };
        match self.chain.allowance(sender, token).await {
            Ok(allowance) if allowance >= units => AllowanceCheck::Covered(units),
            Ok(_) => AllowanceCheck::Short,
            Err(e) => {
                tracing::warn!(%sender, %token, error = %e, "allowance read failed");
                AllowanceCheck::Unverifiable
            }
        }
    }
}

enum AllowanceCheck {
    Covered(U256),
    Short,
    Unverifiable,
}
