//! The payout state machine.
//!
//! A run claims every account's unclaimed tokens, then splits each claimed
//! balance into three transfers (player share, organization share, service
//! fee) executed as consecutive transactions from the account:
//!
//! - [`splitter`]: the deterministic three-way split
//! - [`sequence`]: per-address sequence numbers, refreshed from the chain
//! - [`completion`]: classifies progress from sequence-number deltas
//! - [`claim`]: claim rounds with cached authorizations
//! - [`payout`]: payout rounds that resume only the missing steps
//! - [`run`]: composes the two workflows into one operator-driven run
//!
//! Every money-moving round is gated by a [`payout_utils::ConfirmationPrompt`]
//! and followed by a settle wait through [`payout_utils::Delay`].

pub mod account;
pub mod claim;
pub mod completion;
pub mod config;
pub mod error;
pub mod payout;
pub mod protect;
pub mod run;
pub mod sequence;
pub mod settings;
pub mod splitter;

pub use account::Account;
pub use claim::{
    ClaimAttempt, ClaimRecord, ClaimReport, ClaimState, ClaimWorkflow, SubmissionOutcome, UnresolvedClaim,
};
pub use completion::{classify, Completion};
pub use config::{ConfigError, Roster};
pub use error::{EngineError, InvariantViolation, SequenceAnomaly};
pub use payout::{PayoutPlan, PayoutReport, PayoutWorkflow, PlanSet, StepAttempt, UnresolvedPayout};
pub use run::{PayoutRun, RunOptions, RunReport};
pub use sequence::SequenceTracker;
pub use protect::{KdfParams, ProtectedFile};
pub use settings::Settings;
pub use splitter::{split, FeePolicy, FeeRate, ShareRatio, SplitResult};
