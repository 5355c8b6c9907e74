//! Collaborators of the payout engine.
//!
//! The engine only talks to the outside world through the traits defined
//! here:
//! - [`ChainClient`]: sequence numbers, token balances, transaction submission
//! - [`ClaimAuthorizationService`]: unclaimed balances and signed claim grants
//! - [`TransactionSigner`]: turns a transaction descriptor into a wire payload
//!
//! Production implementations speak Ethereum-style JSON-RPC
//! ([`RpcChainClient`]) and the game's HTTP API ([`GameApiClient`]). Upstream
//! response schemas drift between revisions, so every wire struct is private
//! to its module.

pub mod abi;
pub mod client;
pub mod error;
pub mod game_api;
pub mod rpc;
pub mod signer;

pub use client::{ChainClient, ClaimAuthorization, ClaimAuthorizationService, Transfer};
pub use error::ChainError;
pub use game_api::{GameApiClient, GameApiConfig};
pub use rpc::{RpcChainClient, RpcConfig};
pub use signer::{RemoteSigner, SignedTransaction, TransactionRequest, TransactionSigner};
