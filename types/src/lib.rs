//! Fundamental types for the payout tool.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! chain addresses, transaction hashes, opaque account credentials, the payout
//! step enum and transaction status.

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod step;

pub use address::Address;
pub use error::ParseError;
pub use hash::TxHash;
pub use keys::Credential;
pub use step::{TransactionStep, TxStatus};
