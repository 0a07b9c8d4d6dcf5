//! Alloy-backed implementation of [`TipChain`].
//!
//! One relayer key signs every tip transfer, so submissions are serialized
//! behind a lock and nonces are allocated locally from a pending-aware cache.
//! On any submission or receipt failure the cached nonce is reset, forcing a
//! fresh `pending` query before the next transfer.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::ProviderBuilder;
use alloy::providers::fillers::NonceManager;
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::chain::{ChainError, TipChain};
use crate::config::ChainConfig;
use crate::error::PipelineError;
use crate::types::{CastRef, InteractionKind};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface ITipJar {
        function getUserAllowance(address user, address tokenAddress) external view returns (uint256);
        function sendTip(
            address from,
            address to,
            address tokenAddress,
            uint256 amount,
            string interactionType,
            string castHash
        ) external;
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IErc20Metadata {
        function decimals() external view returns (uint8);
    }
}

/// Combined filler type for gas, blob gas, nonce, and chain ID.
type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// The fully composed provider: fee/nonce/chain-id fillers plus wallet
/// signing over a [`RootProvider`].
pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Relays tip transfers through the tip-jar contract with the relayer key.
pub struct EvmRelay {
    inner: InnerProvider,
    tip_contract: Address,
    relayer_address: Address,
    confirmations: u64,
    receipt_timeout: Duration,
    nonce_manager: PendingNonceManager,
    /// Serializes submissions from the single relayer key so locally
    /// allocated nonces reach the mempool in order.
    submit_lock: Arc<Mutex<()>>,
}

impl EvmRelay {
    /// Builds the provider stack from the relayer private key and chain
    /// configuration. Does not touch the network.
    pub fn try_new(private_key: &str, config: &ChainConfig) -> Result<Self, PipelineError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|_| PipelineError::Config("invalid relayer private key".to_string()))?;
        let relayer_address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let tip_contract: Address = config
            .tip_contract
            .parse()
            .map_err(|_| {
                PipelineError::Config(format!("invalid tip contract address '{}'", config.tip_contract))
            })?;

        let url: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| PipelineError::Config(format!("invalid RPC URL '{}': {e}", config.rpc_url)))?;

        let http_client = alloy::transports::http::reqwest::Client::builder()
            .connect_timeout(config.rpc_timeout())
            .timeout(config.rpc_timeout())
            .build()
            .map_err(|e| PipelineError::Config(format!("RPC HTTP client: {e}")))?;
        let client = RpcClient::builder().http_with_client(http_client, url);

        // Nonce manager is created explicitly so failures can reset it.
        let nonce_manager = PendingNonceManager::default();
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );
        let inner = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(client);

        tracing::info!(
            rpc = %config.rpc_url,
            tip_contract = %tip_contract,
            relayer = %relayer_address,
            "initialized relay provider"
        );

        Ok(Self {
            inner,
            tip_contract,
            relayer_address,
            confirmations: config.confirmations,
            receipt_timeout: config.receipt_timeout(),
            nonce_manager,
            submit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Address the relayer signs with.
    pub fn relayer_address(&self) -> Address {
        self.relayer_address
    }
}

#[async_trait]
impl TipChain for EvmRelay {
    async fn allowance(&self, owner: Address, token: Address) -> Result<U256, ChainError> {
        let jar = ITipJar::new(self.tip_contract, &self.inner);
        let span = tracing::info_span!("call_getUserAllowance", %owner, %token);
        jar.getUserAllowance(owner, token)
            .call()
            .into_future()
            .instrument(span)
            .await
            .map_err(|e| ChainError::ContractCall(format!("getUserAllowance: {e}")))
    }

    async fn decimals(&self, token: Address) -> Result<u8, ChainError> {
        let erc20 = IErc20Metadata::new(token, &self.inner);
        let span = tracing::info_span!("call_decimals", %token);
        erc20
            .decimals()
            .call()
            .into_future()
            .instrument(span)
            .await
            .map_err(|e| ChainError::ContractCall(format!("decimals: {e}")))
    }

    async fn send_tip(
        &self,
        from: Address,
        to: Address,
        token: Address,
        amount: U256,
        kind: InteractionKind,
        cast_ref: Option<&CastRef>,
    ) -> Result<TxHash, ChainError> {
        let span = tracing::info_span!(
            "call_sendTip",
            %from,
            %to,
            %token,
            %amount,
            kind = kind.as_str()
        );
        async {
            // One in-flight transaction per relayer key at a time.
            let _guard = self.submit_lock.lock().await;

            let jar = ITipJar::new(self.tip_contract, &self.inner);
            let cast_hash = cast_ref.map(|c| c.0.clone()).unwrap_or_default();
            let pending = match jar
                .sendTip(from, to, token, amount, kind.as_str().to_string(), cast_hash)
                .send()
                .await
            {
                Ok(pending) => pending,
                Err(e) => {
                    // Submission failed; on-chain nonce state is unknown.
                    self.nonce_manager.reset_nonce(self.relayer_address).await;
                    return Err(ChainError::ContractCall(format!("sendTip submission: {e}")));
                }
            };

            let tx_hash = *pending.tx_hash();
            tracing::info!(%tx_hash, "tip transaction submitted, awaiting receipt");

            let receipt = match pending
                .with_required_confirmations(self.confirmations)
                .with_timeout(Some(self.receipt_timeout))
                .get_receipt()
                .await
            {
                Ok(receipt) => receipt,
                Err(e) => {
                    self.nonce_manager.reset_nonce(self.relayer_address).await;
                    return Err(ChainError::ContractCall(format!(
                        "receipt for {tx_hash}: {e}"
                    )));
                }
            };

            if !receipt.status() {
                return Err(ChainError::Reverted {
                    tx_hash: receipt.transaction_hash.to_string(),
                });
            }
            tracing::info!(
                tx_hash = %receipt.transaction_hash,
                block = receipt.block_number,
                "tip transaction confirmed"
            );
            Ok(receipt.transaction_hash)
        }
        .instrument(span)
        .await
    }
}

/// Nonce manager that allocates nonces locally after one initial query of
/// the `pending` block (falling back to `latest` for RPCs that reject the
/// pending tag). `u64::MAX` is the not-yet-fetched sentinel; `reset_nonce`
/// restores it so the next allocation requeries the chain.
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<std::sync::Mutex<HashMap<Address, Arc<Mutex<u64>>>>>,
}

impl PendingNonceManager {
    const NONE: u64 = u64::MAX;

    fn slot(&self, address: Address) -> Arc<Mutex<u64>> {
        let mut map = self
            .nonces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            map.entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(Self::NONE))),
        )
    }

    /// Forgets the cached nonce for `address` so the next allocation queries
    /// the RPC provider. Called after any failed submission, when the actual
    /// mempool state is unknown.
    pub async fn reset_nonce(&self, address: Address) {
        let slot = self.slot(address);
        let mut nonce = slot.lock().await;
        *nonce = Self::NONE;
        tracing::debug!(%address, "reset nonce cache, will requery on next use");
    }
}

#[async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(
        &self,
        provider: &P,
        address: Address,
    ) -> alloy::transports::TransportResult<u64>
    where
        P: Provider<N>,
        N: alloy::network::Network,
    {
        // The outer map lock is never held across the await below.
        let slot = self.slot(address);
        let mut nonce = slot.lock().await;

        let new_nonce = if *nonce == Self::NONE {
            match provider.get_transaction_count(address).pending().await {
                Ok(pending_nonce) => {
                    tracing::info!(%address, nonce = pending_nonce, "nonce fetched from pending block");
                    pending_nonce
                }
                Err(e) => {
                    tracing::warn!(
                        %address,
                        error = ?e,
                        "pending block tag not supported by RPC, falling back to latest"
                    );
                    provider.get_transaction_count(address).latest().await?
                }
            }
        } else {
            *nonce + 1
        };
        *nonce = new_nonce;
        tracing::debug!(%address, allocated_nonce = new_nonce, "nonce allocated");
        Ok(new_nonce)
    }
}
