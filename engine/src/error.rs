use payout_chain::ChainError;
use payout_types::Address;
use thiserror::Error;

use crate::config::ConfigError;

/// An observed sequence number that no correct run can produce.
///
/// These are never folded into "not started" or "incomplete": they mean
/// something outside this run moved the account, and resubmitting could
/// double-spend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceAnomaly {
    #[error("sequence went backwards: base {base}, observed {actual}")]
    Regressed { base: u64, actual: u64 },

    #[error("sequence overshot the plan: expected {expected}, observed {actual}")]
    Overshot { expected: u64, actual: u64 },

    #[error("payout already complete inside the retry loop: base {base}, observed {actual}")]
    AlreadyComplete { base: u64, actual: u64 },
}

/// A sequence anomaly attributed to one account.
///
/// Reported in [`PayoutReport::violations`](crate::PayoutReport) rather
/// than returned as an error: other accounts keep going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violation for '{account}' ({address}): {anomaly}")]
pub struct InvariantViolation {
    pub account: String,
    pub address: Address,
    pub anomaly: SequenceAnomaly,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("chain error for '{account}': {source}")]
    Chain {
        account: String,
        #[source]
        source: ChainError,
    },

    #[error("config store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn chain(account: impl Into<String>, source: ChainError) -> Self {
        Self::Chain {
            account: account.into(),
            source,
        }
    }
}
