//! Collaborator traits the payout engine depends on.

use payout_types::{Address, Credential, TxHash, TxStatus};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// A single token transfer: `amount` from `from` to `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub amount: u64,
}

/// A signed grant to claim `amount` tokens, issued by the game API.
///
/// Submitting a claim transaction requires the exact values the grant was
/// issued for, so a grant is requested once per claim and then reused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAuthorization {
    /// Hex signature without `0x` prefix.
    pub signature: String,
    pub amount: u64,
    pub timestamp: u64,
}

/// Read and write access to the token chain.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Next unused transaction sequence number (nonce) for `address`.
    async fn sequence_number(&self, address: &Address) -> Result<u64, ChainError>;

    /// Claimed (spendable) token balance of `address`.
    async fn token_balance(&self, address: &Address) -> Result<u64, ChainError>;

    /// Sign and broadcast a token transfer at exactly `sequence`.
    async fn submit_transfer(
        &self,
        transfer: &Transfer,
        sequence: u64,
        credential: &Credential,
    ) -> Result<TxHash, ChainError>;

    /// Sign and broadcast a claim of previously-authorized tokens at exactly `sequence`.
    async fn submit_claim(
        &self,
        address: &Address,
        authorization: &ClaimAuthorization,
        sequence: u64,
        credential: &Credential,
    ) -> Result<TxHash, ChainError>;

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxStatus, ChainError>;
}

/// The game API side of claiming.
#[allow(async_fn_in_trait)]
pub trait ClaimAuthorizationService {
    /// Tokens earned in game but not yet claimed on chain.
    async fn unclaimed_balance(&self, address: &Address) -> Result<u64, ChainError>;

    /// Obtain a signed grant to claim the account's unclaimed tokens.
    async fn request_authorization(
        &self,
        address: &Address,
        credential: &Credential,
    ) -> Result<ClaimAuthorization, ChainError>;
}
