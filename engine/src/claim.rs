//! Claim rounds: turn unclaimed in-game tokens into spendable balances.
//!
//! Each account with unclaimed tokens gets a [`ClaimRecord`]. A round
//! submits every pending record, waits the claim settle period, then checks
//! balances. Records whose balance reached `claimed_before + unclaimed` are
//! complete; the rest stay pending until the operator declines a retry.

use payout_chain::{ChainClient, ChainError, ClaimAuthorization, ClaimAuthorizationService};
use payout_types::{Address, TxHash};
use payout_utils::{format_duration, ConfirmationPrompt, Delay};
use tracing::{info, warn};

use crate::account::Account;
use crate::error::EngineError;
use crate::run::RunOptions;
use crate::sequence::SequenceTracker;

/// Whether a claim grant has been obtained for a record.
///
/// A grant is tied to the amount and timestamp it was issued for, so once
/// `Signed` a record never asks for another one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimState {
    Unsigned,
    Signed(ClaimAuthorization),
}

/// One account's pending claim.
#[derive(Debug)]
pub struct ClaimRecord<'a> {
    account: &'a Account,
    unclaimed: u64,
    claimed_before: u64,
    state: ClaimState,
    last_error: Option<String>,
}

impl<'a> ClaimRecord<'a> {
    pub fn new(account: &'a Account, unclaimed: u64, claimed_before: u64) -> Self {
        Self {
            account,
            unclaimed,
            claimed_before,
            state: ClaimState::Unsigned,
            last_error: None,
        }
    }

    pub fn account(&self) -> &'a Account {
        self.account
    }

    pub fn unclaimed(&self) -> u64 {
        self.unclaimed
    }

    pub fn claimed_before(&self) -> u64 {
        self.claimed_before
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.state, ClaimState::Signed(_))
    }

    /// Balance at which the claim counts as landed.
    pub fn target_balance(&self) -> u64 {
        self.claimed_before.saturating_add(self.unclaimed)
    }

    /// The cached grant, requesting it first if this record has none.
    pub async fn authorization<A: ClaimAuthorizationService>(
        &mut self,
        api: &A,
    ) -> Result<ClaimAuthorization, ChainError> {
        if let ClaimState::Signed(grant) = &self.state {
            return Ok(grant.clone());
        }
        let grant = api
            .request_authorization(&self.account.address, &self.account.credential)
            .await?;
        self.state = ClaimState::Signed(grant.clone());
        Ok(grant)
    }
}

/// Outcome of one submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Submitted(TxHash),
    Failed(String),
    /// Already landed in an earlier round.
    Skipped,
}

impl SubmissionOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimAttempt {
    pub account: String,
    pub address: Address,
    pub sequence: Option<u64>,
    pub outcome: SubmissionOutcome,
}

/// A claim still pending when the workflow stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedClaim {
    pub account: String,
    pub address: Address,
    pub unclaimed: u64,
    pub reason: String,
    /// A signed claim transaction may still be mined at the account's
    /// next sequence number.
    pub signed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimReport {
    /// Names of accounts whose claim landed.
    pub completed: Vec<String>,
    pub unresolved: Vec<UnresolvedClaim>,
    /// Every submission attempt, one inner list per round.
    pub rounds: Vec<Vec<ClaimAttempt>>,
    /// The operator declined to (re)try while claims were pending.
    pub aborted: bool,
}

impl ClaimReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Drives claim rounds for a batch of accounts.
pub struct ClaimWorkflow<'c, C, A, P, D> {
    chain: &'c C,
    api: &'c A,
    prompt: &'c P,
    delay: &'c D,
    options: &'c RunOptions,
}

impl<'c, C, A, P, D> ClaimWorkflow<'c, C, A, P, D>
where
    C: ChainClient,
    A: ClaimAuthorizationService,
    P: ConfirmationPrompt,
    D: Delay,
{
    pub fn new(chain: &'c C, api: &'c A, prompt: &'c P, delay: &'c D, options: &'c RunOptions) -> Self {
        Self {
            chain,
            api,
            prompt,
            delay,
            options,
        }
    }

    /// Refresh every account's sequence number and build a record for each
    /// account with unclaimed tokens.
    pub async fn discover<'a>(
        &self,
        accounts: &'a [Account],
        tracker: &mut SequenceTracker,
    ) -> Result<Vec<ClaimRecord<'a>>, EngineError> {
        info!("Checking for unclaimed tokens");
        let mut records = Vec::new();
        for account in accounts {
            let sequence = tracker
                .refresh(self.chain, &account.address)
                .await
                .map_err(|e| EngineError::chain(&account.name, e))?;
            let unclaimed = self
                .api
                .unclaimed_balance(&account.address)
                .await
                .map_err(|e| EngineError::chain(&account.name, e))?;

            if unclaimed == 0 {
                tracing::debug!(account = %account.name, "nothing to claim");
                continue;
            }

            let claimed_before = self
                .chain
                .token_balance(&account.address)
                .await
                .map_err(|e| EngineError::chain(&account.name, e))?;
            info!(
                "Account '{}' (sequence: {}) has {} unclaimed tokens.",
                account.name, sequence, unclaimed
            );
            records.push(ClaimRecord::new(account, unclaimed, claimed_before));
        }
        Ok(records)
    }

    /// Run claim rounds until every record lands or the operator stops.
    pub async fn run(
        &self,
        mut pending: Vec<ClaimRecord<'_>>,
        tracker: &mut SequenceTracker,
    ) -> ClaimReport {
        let mut report = ClaimReport::default();
        let mut question = "Would you like to claim tokens?";

        while !pending.is_empty() {
            if !self.prompt.ask_yes_no(question) {
                report.aborted = true;
                break;
            }
            question = "Would you like to retry the claim process?";

            let mut attempts = Vec::with_capacity(pending.len());
            for record in pending.iter_mut() {
                attempts.push(self.submit(record, tracker).await);
                self.delay.sleep(self.options.pacing).await;
            }
            report.rounds.push(attempts);

            info!(
                "Waiting {} for claims to settle",
                format_duration(self.options.claim_settle.as_secs())
            );
            self.delay.sleep(self.options.claim_settle).await;

            let mut still_pending = Vec::with_capacity(pending.len());
            for mut record in pending {
                if self.has_landed(&mut record).await {
                    tracker.advance(&record.account.address);
                    info!("Claim for '{}' completed.", record.account.name);
                    report.completed.push(record.account.name.clone());
                } else {
                    still_pending.push(record);
                }
            }
            pending = still_pending;

            if pending.is_empty() {
                info!("All claims completed successfully!");
            } else {
                warn!("The following claims didn't complete successfully:");
                for record in &pending {
                    warn!(
                        "  - Account '{}' has {} unclaimed tokens{}",
                        record.account.name,
                        record.unclaimed,
                        record
                            .last_error
                            .as_deref()
                            .map(|e| format!(" ({e})"))
                            .unwrap_or_default()
                    );
                }
            }
        }

        report.unresolved = pending
            .into_iter()
            .map(|r| UnresolvedClaim {
                account: r.account.name.clone(),
                address: r.account.address.clone(),
                unclaimed: r.unclaimed,
                signed: r.is_signed(),
                reason: r
                    .last_error
                    .unwrap_or_else(|| "claim not confirmed on chain".to_string()),
            })
            .collect();
        report
    }

    async fn submit(&self, record: &mut ClaimRecord<'_>, tracker: &mut SequenceTracker) -> ClaimAttempt {
        let account = record.account;
        info!("Claiming {} tokens for '{}'...", record.unclaimed, account.name);

        let sequence = match tracker.get(&account.address) {
            Some(s) => s,
            None => match tracker.refresh(self.chain, &account.address).await {
                Ok(s) => s,
                Err(e) => return self.failed(record, None, e),
            },
        };

        let result = match record.authorization(self.api).await {
            Ok(grant) => {
                self.chain
                    .submit_claim(&account.address, &grant, sequence, &account.credential)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(hash) => {
                record.last_error = None;
                info!(
                    "Claim submitted for '{}'. Hash: {} - Explorer: {}{}",
                    account.name, hash, self.options.explorer_url, hash
                );
                ClaimAttempt {
                    account: account.name.clone(),
                    address: account.address.clone(),
                    sequence: Some(sequence),
                    outcome: SubmissionOutcome::Submitted(hash),
                }
            }
            Err(e) => self.failed(record, Some(sequence), e),
        }
    }

    fn failed(&self, record: &mut ClaimRecord<'_>, sequence: Option<u64>, error: ChainError) -> ClaimAttempt {
        let account = record.account;
        warn!("   ERROR claiming for '{}': {}", account.name, error);
        record.last_error = Some(error.to_string());
        ClaimAttempt {
            account: account.name.clone(),
            address: account.address.clone(),
            sequence,
            outcome: SubmissionOutcome::Failed(error.to_string()),
        }
    }

    /// Only signed records can have landed; a failed balance query leaves
    /// the record pending.
    async fn has_landed(&self, record: &mut ClaimRecord<'_>) -> bool {
        if !record.is_signed() {
            return false;
        }
        match self.chain.token_balance(&record.account.address).await {
            Ok(balance) => balance >= record.target_balance(),
            Err(e) => {
                warn!(
                    "   ERROR reading balance of '{}': {}",
                    record.account.name, e
                );
                record.last_error = Some(format!("balance check failed: {e}"));
                false
            }
        }
    }
}
