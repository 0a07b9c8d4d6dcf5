//! On-chain access: the allowance read and the relayed tip transfer.
//!
//! [`TipChain`] is the seam between the pipeline and the chain so the state
//! machine can be exercised without an RPC endpoint; [`evm::EvmRelay`] is
//! the production implementation.

pub mod evm;

use alloy::primitives::utils::parse_units;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;

use crate::types::{CastRef, InteractionKind};

pub use evm::EvmRelay;

/// Errors from on-chain reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A stored address failed to parse.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// A configured tip amount cannot be expressed in token units.
    #[error("invalid tip amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    /// An RPC call or transaction submission failed.
    #[error("contract call failed: {0}")]
    ContractCall(String),

    /// The transaction was mined but its receipt reports failure.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
}

/// The contract surface the pipeline consumes.
#[async_trait]
pub trait TipChain: Send + Sync {
    /// Remaining amount of `token` the relayer may move for `owner`,
    /// in native token units. Advisory only — the contract enforces the
    /// true limit atomically during the transfer.
    async fn allowance(&self, owner: Address, token: Address) -> Result<U256, ChainError>;

    /// The token's declared decimals.
    async fn decimals(&self, token: Address) -> Result<u8, ChainError>;

    /// Signs and submits the tip transfer through the relayer key, waiting
    /// for confirmation. The single mutating, irreversible step in the
    /// pipeline: at most one submission per ledger row.
    async fn send_tip(
        &self,
        from: Address,
        to: Address,
        token: Address,
        amount: U256,
        kind: InteractionKind,
        cast_ref: Option<&CastRef>,
    ) -> Result<TxHash, ChainError>;
}

/// Parses an address stored as text (profile rows, tip configs).
pub fn parse_address(s: &str) -> Result<Address, ChainError> {
    s.parse()
        .map_err(|_| ChainError::InvalidAddress(s.to_string()))
}

/// Converts a decimal whole-token amount to native integer units.
pub fn to_token_units(amount: f64, decimals: u8) -> Result<U256, ChainError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ChainError::InvalidAmount {
            amount: amount.to_string(),
            reason: "amount must be a positive finite number".to_string(),
        });
    }
    // f64 Display never uses exponent notation, so this is a plain decimal
    // string parse_units understands.
    let parsed = parse_units(&amount.to_string(), decimals).map_err(|e| ChainError::InvalidAmount {
        amount: amount.to_string(),
        reason: e.to_string(),
    })?;
    Ok(parsed.get_absolute())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_decimal_amounts_to_units() {
        assert_eq!(
            to_token_units(0.01, 18).unwrap(),
            U256::from(10).pow(U256::from(16))
        );
        assert_eq!(to_token_units(5.0, 6).unwrap(), U256::from(5_000_000u64));
        assert_eq!(to_token_units(1.5, 2).unwrap(), U256::from(150u64));
    }

    #[test]
    fn rejects_non_positive_and_non_finite_amounts() {
        assert!(to_token_units(0.0, 18).is_err());
        assert!(to_token_units(-0.5, 18).is_err());
        assert!(to_token_units(f64::NAN, 18).is_err());
        assert!(to_token_units(f64::INFINITY, 18).is_err());
    }

    #[test]
    fn rejects_amounts_finer_than_token_decimals() {
        // 0.001 of a 2-decimal token cannot be represented.
        assert!(to_token_units(0.001, 2).is_err());
    }

    #[test]
    fn parses_checksummed_and_lowercase_addresses() {
        assert!(parse_address("0x765DE816845861e75A25fCA122bb6898B8B1282a").is_ok());
        assert!(parse_address("0x765de816845861e75a25fca122bb6898b8b1282a").is_ok());
        assert!(parse_address("not-an-address").is_err());
    }
}
