//! Parcel and proposal token contracts, consumed as an opaque capability.
//!
//! Nothing here signs, submits or retries transactions. Implementors of
//! [`ParcelContract`] own that; the helpers only sequence calls.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ValidationError};
use crate::metadata::{MetadataSource, ProposalMetadata};

pub type TokenId = u64;

/// Account address as the contract reports it.
pub type Address = String;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelRecord {
    pub osm_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub parcel_ids: Vec<String>,
    pub is_conditional: bool,
    pub image_uri: String,
    pub proposer: Address,
    pub is_active: bool,
    pub eth_amount: u128,
    pub token_amount: u128,
    pub acceptance_count: u64,
}

pub trait ParcelContract {
    fn mint(
        &self,
        owner: &str,
        parcel_ids: &[String],
        is_conditional: bool,
        metadata_uri: &str,
    ) -> impl Future<Output = Result<TokenId, Error>>;

    fn get_parcel(&self, token: TokenId) -> impl Future<Output = Result<ParcelRecord, Error>>;

    fn owner_of(&self, token: TokenId) -> impl Future<Output = Result<Address, Error>>;

    fn balance_of(&self, owner: &str) -> impl Future<Output = Result<u64, Error>>;

    fn token_of_owner_by_index(
        &self,
        owner: &str,
        index: u64,
    ) -> impl Future<Output = Result<TokenId, Error>>;

    fn get_proposal(&self, token: TokenId) -> impl Future<Output = Result<Proposal, Error>>;

    fn token_uri(&self, token: TokenId) -> impl Future<Output = Result<String, Error>>;

    fn accept_proposal(
        &self,
        token: TokenId,
        parcel_id: &str,
    ) -> impl Future<Output = Result<(), Error>>;

    /// Attaches `value` wei to the proposal.
    fn deposit_funds(&self, token: TokenId, value: u128)
    -> impl Future<Output = Result<(), Error>>;
}

/// Tokens held by `owner`, in contract index order.
pub async fn owned_tokens<C: ParcelContract>(
    contract: &C,
    owner: &str,
) -> Result<Vec<TokenId>, Error> {
    let balance = contract.balance_of(owner).await?;
    let mut tokens = Vec::new();
    for index in 0..balance {
        tokens.push(contract.token_of_owner_by_index(owner, index).await?);
    }
    tracing::debug!(owner, count = tokens.len(), "enumerated owned tokens");
    Ok(tokens)
}

/// Parcel records behind every token `owner` holds.
pub async fn owned_parcels<C: ParcelContract>(
    contract: &C,
    owner: &str,
) -> Result<Vec<(TokenId, ParcelRecord)>, Error> {
    let mut parcels = Vec::new();
    for token in owned_tokens(contract, owner).await? {
        parcels.push((token, contract.get_parcel(token).await?));
    }
    Ok(parcels)
}

/// Mints a proposal over `parcel_ids`, kept in the order they were selected.
pub async fn submit_proposal<C: ParcelContract>(
    contract: &C,
    owner: &str,
    parcel_ids: &[String],
    is_conditional: bool,
    metadata_uri: &str,
) -> Result<TokenId, Error> {
    if parcel_ids.is_empty() {
        return Err(ValidationError::EmptySelection.into());
    }
    let token = contract
        .mint(owner, parcel_ids, is_conditional, metadata_uri)
        .await?;
    tracing::info!(token, parcels = parcel_ids.len(), is_conditional, "minted proposal");
    Ok(token)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProposalView {
    pub token: TokenId,
    pub proposal: Proposal,
    pub metadata_uri: String,
    /// `None` when the metadata document could not be fetched.
    pub metadata: Option<ProposalMetadata>,
}

/// Reads a proposal and resolves its metadata document.
///
/// A metadata fetch failure is logged and leaves `metadata` empty; contract
/// failures propagate.
pub async fn load_proposal<C, M>(
    contract: &C,
    metadata: &M,
    token: TokenId,
) -> Result<ProposalView, Error>
where
    C: ParcelContract,
    M: MetadataSource,
{
    let proposal = contract.get_proposal(token).await?;
    let metadata_uri = contract.token_uri(token).await?;
    let document = match metadata.fetch_metadata(&metadata_uri).await {
        Ok(document) => Some(document),
        Err(err) => {
            tracing::warn!(token, uri = %metadata_uri, %err, "proposal metadata unavailable");
            None
        }
    };
    Ok(ProposalView {
        token,
        proposal,
        metadata_uri,
        metadata: document,
    })
}
