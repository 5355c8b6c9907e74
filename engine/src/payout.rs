//! Payout rounds: three transfers per account, resumable after partial failure.
//!
//! A [`PayoutPlan`] snapshots the account's sequence number as its base.
//! Step `k` of the chain is always submitted at `base + k`, never at the
//! "current" sequence, so resubmitting a step replaces its own earlier
//! attempt instead of creating a second transfer.
//!
//! Each round:
//! 1. For every plan, `tracker - base` tells how many steps already landed;
//!    only the remaining steps are submitted.
//! 2. Wait the payout settle period.
//! 3. Refresh every plan's sequence from the chain.
//! 4. A plan is complete iff the refreshed sequence is `base + 3`.
//!
//! Any sequence outside `base..=base + 3`, or a plan that looks complete at
//! the start of a round, is an [`InvariantViolation`]: the plan is dropped
//! from the loop and reported separately.

use payout_chain::{ChainClient, Transfer};
use payout_types::{Address, TransactionStep, TxHash, TxStatus};
use payout_utils::{format_duration, ConfirmationPrompt, Delay};
use tracing::{error, info, warn};

use crate::account::Account;
use crate::claim::SubmissionOutcome;
use crate::completion::{classify, Completion};
use crate::config::ConfigError;
use crate::error::{EngineError, InvariantViolation, SequenceAnomaly};
use crate::run::RunOptions;
use crate::sequence::SequenceTracker;
use crate::splitter::{split, FeePolicy, SplitResult};

const STEPS: u64 = TransactionStep::COUNT;

/// One account's payout chain. Immutable once built: the split is computed
/// once and reused across every retry.
#[derive(Debug)]
pub struct PayoutPlan<'a> {
    account: &'a Account,
    balance: u64,
    base_sequence: u64,
    split: SplitResult,
    transfers: [Transfer; 3],
}

impl<'a> PayoutPlan<'a> {
    /// Build the plan for a non-zero `balance` starting at `base_sequence`.
    pub fn new(
        account: &'a Account,
        balance: u64,
        base_sequence: u64,
        organization: &Address,
        fee: &FeePolicy,
    ) -> Result<Self, ConfigError> {
        if balance == 0 {
            return Err(ConfigError::Field {
                account: account.name.clone(),
                field: "balance",
                reason: "zero balances are not paid out".into(),
            });
        }

        let split = split(balance, account.share, fee.rate);
        let transfer = |to: &Address, amount: u64| Transfer {
            from: account.address.clone(),
            to: to.clone(),
            amount,
        };
        let transfers = [
            transfer(&account.payout_address, split.primary),
            transfer(organization, split.secondary),
            transfer(&fee.address, split.fee),
        ];

        Ok(Self {
            account,
            balance,
            base_sequence,
            split,
            transfers,
        })
    }

    pub fn account(&self) -> &'a Account {
        self.account
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn base_sequence(&self) -> u64 {
        self.base_sequence
    }

    pub fn split(&self) -> &SplitResult {
        &self.split
    }

    pub fn transfer(&self, step: TransactionStep) -> &Transfer {
        &self.transfers[step.offset() as usize]
    }

    /// The sequence number `step` must be submitted at.
    pub fn sequence_for(&self, step: TransactionStep) -> u64 {
        self.base_sequence + step.offset()
    }

    /// The account's sequence number once the whole chain has landed.
    pub fn expected_final(&self) -> u64 {
        self.base_sequence + STEPS
    }

    /// Nothing was submitted for this plan.
    fn not_started(&self) -> UnresolvedPayout {
        UnresolvedPayout {
            steps_done: Some(0),
            ..self.unverified()
        }
    }

    /// The final sequence read failed, so progress is unknown.
    fn unverified(&self) -> UnresolvedPayout {
        UnresolvedPayout {
            account: self.account.name.clone(),
            address: self.account.address.clone(),
            steps_done: None,
            expected_sequence: self.expected_final(),
            actual_sequence: None,
        }
    }

    /// Log the plan for operator review.
    pub fn preview(&self) {
        info!("Payout for '{}'", self.account.name);
        info!("├─ Balance: {} tokens", self.balance);
        info!("├─ Sequence: {}", self.base_sequence);
        for step in TransactionStep::ALL {
            let t = self.transfer(step);
            let branch = if step == TransactionStep::Fee { "└─" } else { "├─" };
            info!(
                "{} {:<14}: send {:>5} tokens from {} to {}",
                branch, step.label(), t.amount, t.from, t.to
            );
        }
    }
}

/// Plans to execute plus the accounts left out for having nothing to pay.
#[derive(Debug, Default)]
pub struct PlanSet<'a> {
    pub plans: Vec<PayoutPlan<'a>>,
    /// Names of accounts skipped for a zero balance.
    pub skipped: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepAttempt {
    pub account: String,
    pub step: TransactionStep,
    pub sequence: u64,
    pub outcome: SubmissionOutcome,
}

/// A plan still incomplete when the workflow stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedPayout {
    pub account: String,
    pub address: Address,
    /// `None` when the final sequence could not be read.
    pub steps_done: Option<u64>,
    pub expected_sequence: u64,
    /// Last sequence observed, if the final refresh succeeded.
    pub actual_sequence: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayoutReport {
    /// Names of accounts whose three transfers all landed.
    pub completed: Vec<String>,
    pub unresolved: Vec<UnresolvedPayout>,
    pub violations: Vec<InvariantViolation>,
    /// Every step attempt, one inner list per round.
    pub rounds: Vec<Vec<StepAttempt>>,
    /// The operator declined to (re)try while plans were incomplete.
    pub aborted: bool,
}

impl PayoutReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.violations.is_empty()
    }
}

/// Result of checking one plan after the settle wait.
enum Verdict {
    Complete,
    Incomplete(UnresolvedPayout),
    Violated(InvariantViolation),
}

/// Drives payout rounds.
pub struct PayoutWorkflow<'c, C, P, D> {
    chain: &'c C,
    prompt: &'c P,
    delay: &'c D,
    options: &'c RunOptions,
}

impl<'c, C, P, D> PayoutWorkflow<'c, C, P, D>
where
    C: ChainClient,
    P: ConfirmationPrompt,
    D: Delay,
{
    pub fn new(chain: &'c C, prompt: &'c P, delay: &'c D, options: &'c RunOptions) -> Self {
        Self {
            chain,
            prompt,
            delay,
            options,
        }
    }

    /// Read every account's balance and base sequence and build its plan.
    /// Zero-balance accounts are skipped.
    pub async fn plan<'a>(
        &self,
        accounts: impl IntoIterator<Item = &'a Account>,
        organization: &Address,
        fee: &FeePolicy,
        tracker: &mut SequenceTracker,
    ) -> Result<PlanSet<'a>, EngineError> {
        let mut set = PlanSet::default();
        for account in accounts {
            let balance = self
                .chain
                .token_balance(&account.address)
                .await
                .map_err(|e| EngineError::chain(&account.name, e))?;

            if balance == 0 {
                info!(
                    "Skipping account '{}' ({}) because its balance is zero.",
                    account.name, account.address
                );
                set.skipped.push(account.name.clone());
                continue;
            }

            let base = tracker
                .refresh(self.chain, &account.address)
                .await
                .map_err(|e| EngineError::chain(&account.name, e))?;
            set.plans
                .push(PayoutPlan::new(account, balance, base, organization, fee)?);
        }
        Ok(set)
    }

    /// Run payout rounds until every plan completes or the operator stops.
    pub async fn run(&self, mut active: Vec<PayoutPlan<'_>>, tracker: &mut SequenceTracker) -> PayoutReport {
        let mut report = PayoutReport::default();
        let mut question = "Would you like to execute payouts?";

        while !active.is_empty() {
            if !self.prompt.ask_yes_no(question) {
                report.aborted = true;
                if report.rounds.is_empty() {
                    report.unresolved = active.iter().map(PayoutPlan::not_started).collect();
                }
                break;
            }
            question = "Would you like to retry the payout process?";

            info!("Executing payouts...");
            let mut attempts = Vec::new();
            let mut runnable = Vec::with_capacity(active.len());
            for plan in active {
                match self.execute(&plan, tracker, &mut attempts).await {
                    Ok(()) => runnable.push(plan),
                    Err(violation) => {
                        error!("{violation}");
                        report.violations.push(violation);
                    }
                }
            }

            info!(
                "Waiting {} for payouts to be mined...",
                format_duration(self.options.payout_settle.as_secs())
            );
            self.delay.sleep(self.options.payout_settle).await;

            let mut incomplete = Vec::new();
            active = Vec::with_capacity(runnable.len());
            for plan in runnable {
                match self.verify(&plan, tracker).await {
                    Verdict::Complete => {
                        info!("Payout for '{}' completed.", plan.account.name);
                        report.completed.push(plan.account.name.clone());
                    }
                    Verdict::Incomplete(unresolved) => {
                        self.log_statuses(&plan, &attempts).await;
                        incomplete.push(unresolved);
                        active.push(plan);
                    }
                    Verdict::Violated(violation) => {
                        error!("{violation}");
                        report.violations.push(violation);
                    }
                }
            }
            report.rounds.push(attempts);

            if active.is_empty() && report.violations.is_empty() {
                info!("All payouts completed successfully!");
            }
            report.unresolved = incomplete;
        }

        report
    }

    /// Submit the steps of `plan` that have not landed yet.
    async fn execute(
        &self,
        plan: &PayoutPlan<'_>,
        tracker: &mut SequenceTracker,
        attempts: &mut Vec<StepAttempt>,
    ) -> Result<(), InvariantViolation> {
        let account = plan.account;
        info!("Executing payout for '{}'", account.name);

        // The cached value may still carry optimistic advances from a round
        // whose verification failed, so always start from the chain.
        let current = match tracker.refresh(self.chain, &account.address).await {
            Ok(current) => current,
            Err(e) => {
                warn!("└─ Could not read sequence for '{}': {}", account.name, e);
                for step in TransactionStep::ALL {
                    attempts.push(StepAttempt {
                        account: account.name.clone(),
                        step,
                        sequence: plan.sequence_for(step),
                        outcome: SubmissionOutcome::Failed(format!("sequence unavailable: {e}")),
                    });
                }
                return Ok(());
            }
        };

        let violation = |anomaly| InvariantViolation {
            account: account.name.clone(),
            address: account.address.clone(),
            anomaly,
        };
        let done = match classify(plan.base_sequence, STEPS, current) {
            Ok(Completion::Complete) => {
                return Err(violation(SequenceAnomaly::AlreadyComplete {
                    base: plan.base_sequence,
                    actual: current,
                }))
            }
            Ok(progress) => progress.steps_done(STEPS),
            Err(anomaly) => return Err(violation(anomaly)),
        };

        for step in TransactionStep::ALL {
            let sequence = plan.sequence_for(step);
            let transfer = plan.transfer(step);

            if step.offset() < done {
                info!("├─ {} skipped because it has succeeded already.", step.label());
                attempts.push(StepAttempt {
                    account: account.name.clone(),
                    step,
                    sequence,
                    outcome: SubmissionOutcome::Skipped,
                });
                continue;
            }

            info!(
                "├─ {}: sending {} tokens from {} to {} (sequence {})...",
                step.label(),
                transfer.amount,
                transfer.from,
                transfer.to,
                sequence
            );
            let outcome = match self
                .chain
                .submit_transfer(transfer, sequence, &account.credential)
                .await
            {
                Ok(hash) => {
                    tracker.advance(&account.address);
                    info!(
                        "│  Hash: {} - Explorer: {}{}",
                        hash, self.options.explorer_url, hash
                    );
                    SubmissionOutcome::Submitted(hash)
                }
                Err(e) => {
                    warn!("│  WARNING: {} failed: {}", step.label(), e);
                    SubmissionOutcome::Failed(e.to_string())
                }
            };
            attempts.push(StepAttempt {
                account: account.name.clone(),
                step,
                sequence,
                outcome,
            });
            self.delay.sleep(self.options.pacing).await;
        }

        Ok(())
    }

    /// Refresh the plan's sequence from the chain and classify it.
    async fn verify(&self, plan: &PayoutPlan<'_>, tracker: &mut SequenceTracker) -> Verdict {
        let account = plan.account;
        let expected = plan.expected_final();

        let actual = match tracker.refresh(self.chain, &account.address).await {
            Ok(actual) => actual,
            Err(e) => {
                warn!(
                    "Could not verify payout for '{}': {}. Expected sequence: {}.",
                    account.name, e, expected
                );
                return Verdict::Incomplete(plan.unverified());
            }
        };

        match classify(plan.base_sequence, STEPS, actual) {
            Ok(Completion::Complete) => Verdict::Complete,
            Ok(progress) => {
                let steps_done = progress.steps_done(STEPS);
                warn!(
                    "Payout for '{}' didn't succeed completely. Only {} out of {} succeeded. Expected sequence: {}. Actual sequence: {}",
                    account.name, steps_done, STEPS, expected, actual
                );
                Verdict::Incomplete(UnresolvedPayout {
                    account: account.name.clone(),
                    address: account.address.clone(),
                    steps_done: Some(steps_done),
                    expected_sequence: expected,
                    actual_sequence: Some(actual),
                })
            }
            Err(anomaly) => Verdict::Violated(InvariantViolation {
                account: account.name.clone(),
                address: account.address.clone(),
                anomaly,
            }),
        }
    }

    /// Log the on-chain status of this round's submissions for an incomplete plan.
    async fn log_statuses(&self, plan: &PayoutPlan<'_>, attempts: &[StepAttempt]) {
        let submitted = attempts.iter().filter_map(|a| match &a.outcome {
            SubmissionOutcome::Submitted(hash) if a.account == plan.account.name => {
                Some((a.step, *hash))
            }
            _ => None,
        });
        for (step, hash) in submitted {
            let status = self.status_of(&hash).await;
            warn!("  - {} ({}): {}", step.label(), hash, status);
        }
    }

    async fn status_of(&self, hash: &TxHash) -> String {
        match self.chain.transaction_status(hash).await {
            Ok(TxStatus::Failed) => "failed on chain".to_string(),
            Ok(status) => status.to_string(),
            Err(e) => format!("status unavailable ({e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::{FeeRate, ShareRatio};
    use payout_types::Credential;

    fn addr(b: u8) -> Address {
        Address::parse(&format!("0x{}", format!("{b:02x}").repeat(20))).unwrap()
    }

    fn alice() -> Account {
        Account {
            name: "Alice".into(),
            address: addr(1),
            payout_address: addr(2),
            credential: Credential::new("0x01").unwrap(),
            share: ShareRatio::from_fraction(0.5).unwrap(),
        }
    }

    fn fee() -> FeePolicy {
        FeePolicy {
            address: addr(0xfe),
            rate: FeeRate::DEFAULT,
        }
    }

    #[test]
    fn plan_binds_each_step_to_its_sequence() {
        let account = alice();
        let plan = PayoutPlan::new(&account, 100, 42, &addr(0xaa), &fee()).unwrap();

        assert_eq!(plan.sequence_for(TransactionStep::Primary), 42);
        assert_eq!(plan.sequence_for(TransactionStep::Secondary), 43);
        assert_eq!(plan.sequence_for(TransactionStep::Fee), 44);
        assert_eq!(plan.expected_final(), 45);

        let primary = plan.transfer(TransactionStep::Primary);
        assert_eq!((primary.to.clone(), primary.amount), (addr(2), 50));
        let secondary = plan.transfer(TransactionStep::Secondary);
        assert_eq!((secondary.to.clone(), secondary.amount), (addr(0xaa), 49));
        let fee_transfer = plan.transfer(TransactionStep::Fee);
        assert_eq!((fee_transfer.to.clone(), fee_transfer.amount), (addr(0xfe), 1));
        assert!(TransactionStep::ALL
            .iter()
            .all(|s| plan.transfer(*s).from == account.address));
        assert_eq!(plan.split().total(), 100);
    }

    #[test]
    fn zero_balance_has_no_plan() {
        let account = alice();
        let err = PayoutPlan::new(&account, 0, 1, &addr(0xaa), &fee()).unwrap_err();
        assert!(matches!(err, ConfigError::Field { field: "balance", .. }));
    }
}
