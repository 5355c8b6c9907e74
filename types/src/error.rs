//! Parse errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid address {0:?}: expected `ronin:` or `0x` followed by 40 hex digits")]
    InvalidAddress(String),

    #[error("invalid transaction hash {0:?}: expected `0x` followed by 64 hex digits")]
    InvalidTxHash(String),

    #[error("credential is empty")]
    EmptyCredential,
}
