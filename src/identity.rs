//! Identity resolution: actor id → payable wallet address.
//!
//! The profile store is consulted first. On a miss (or a profile without an
//! address) the external user-lookup service is queried; the first verified
//! address wins, falling back to the custody address. Whatever is found is
//! upserted into the profile store before being returned, so the next event
//! for the same actor resolves locally.
//!
//! Lookup failures are treated as not-found (fail closed): the event is
//! dropped for this attempt and the source's at-least-once delivery covers
//! retries.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::store::ProfileStore;
use crate::store::profiles::ProfileUpdate;
use crate::types::ActorId;

/// What the lookup service knows about an actor.
#[derive(Debug, Clone, Default)]
pub struct ResolvedIdentity {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    /// First verified address, else custody address, else `None`.
    pub wallet_address: Option<String>,
}

/// Seam for the external user-lookup service.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Fetches identity data for an actor. `Ok(None)` means the service does
    /// not know the actor at all.
    async fn lookup(&self, fid: ActorId) -> Result<Option<ResolvedIdentity>, PipelineError>;
}

/// HTTP client for the bulk-user lookup API.
pub struct HttpIdentityLookup {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BulkUserResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    pfp_url: Option<String>,
    #[serde(default)]
    verified_addresses: Option<VerifiedAddresses>,
    #[serde(default)]
    custody_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifiedAddresses {
    #[serde(default)]
    eth_addresses: Vec<String>,
}

impl HttpIdentityLookup {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("lookup HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityLookup for HttpIdentityLookup {
    async fn lookup(&self, fid: ActorId) -> Result<Option<ResolvedIdentity>, PipelineError> {
        let url = format!("{}/farcaster/user/bulk?fids={}", self.api_base, fid);
        let mut request = self.http.get(&url).header("accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("api_key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Lookup(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PipelineError::Lookup(format!(
                "lookup service returned {}",
                response.status()
            )));
        }

        let body: BulkUserResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Lookup(e.to_string()))?;
        let Some(user) = body.users.into_iter().next() else {
            return Ok(None);
        };

        // First verified address wins; custody address is the fallback.
        let wallet_address = user
            .verified_addresses
            .and_then(|v| v.eth_addresses.into_iter().next())
            .or(user.custody_address);

        Ok(Some(ResolvedIdentity {
            username: user.username,
            display_name: user.display_name,
            pfp_url: user.pfp_url,
            wallet_address,
        }))
    }
}

/// Resolves actor ids to wallet addresses, persisting what it learns.
/// Sole writer of the profile store.
#[derive(Clone)]
pub struct IdentityResolver {
    profiles: ProfileStore,
    lookup: Arc<dyn IdentityLookup>,
}

impl IdentityResolver {
    pub fn new(profiles: ProfileStore, lookup: Arc<dyn IdentityLookup>) -> Self {
        Self { profiles, lookup }
    }

    /// Address of a tip *sender*: profile store only, no lookup fallback.
    ///
    /// A sender with no stored address has not opted in to tipping — looking
    /// them up externally would register users who never connected a wallet.
    pub async fn sender_address(&self, fid: ActorId) -> Result<Option<String>, PipelineError> {
        Ok(self.profiles.connected_address(fid).await?)
    }

    /// Full resolution for a tip *recipient*: store first, then the lookup
    /// service, persisting anything found.
    pub async fn resolve(&self, fid: ActorId) -> Result<Option<String>, PipelineError> {
        if let Some(address) = self.profiles.connected_address(fid).await? {
            return Ok(Some(address));
        }

        let identity = match self.lookup.lookup(fid).await {
            Ok(identity) => identity,
            Err(e) => {
                // Fail closed: an unreachable lookup service means the
                // recipient is unresolvable for this attempt.
                tracing::warn!(%fid, error = %e, "identity lookup failed, treating as unresolved");
                return Ok(None);
            }
        };

        let Some(identity) = identity else {
            return Ok(None);
        };
        let Some(address) = identity.wallet_address.clone() else {
            return Ok(None);
        };

        self.profiles
            .upsert(
                fid,
                ProfileUpdate {
                    username: identity.username,
                    display_name: identity.display_name,
                    pfp_url: identity.pfp_url,
                    connected_address: Some(address.clone()),
                },
            )
            .await?;
        tracing::info!(%fid, address = %address, "resolved and persisted recipient address");
        Ok(Some(address))
    }
}
