//! payout: claim unclaimed game tokens and pay out every account's balance.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use payout_chain::{GameApiClient, RemoteSigner, RpcChainClient};
use payout_engine::{protect, PayoutRun, Roster, RunReport, Settings};
use payout_utils::{init_logging, ConsolePrompt, LogFormat, TokioDelay};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "payout", version, about = "Claim and split game token payouts")]
struct Cli {
    /// Path to a TOML settings file. File values are the base; flags and
    /// env vars override them.
    #[arg(long, env = "PAYOUT_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the chain node.
    #[arg(long, env = "PAYOUT_RPC_URL")]
    rpc_url: Option<String>,

    /// HTTP signer holding the account keys.
    #[arg(long, env = "PAYOUT_SIGNER_URL")]
    signer_url: Option<String>,

    /// Fee rate in basis points (100 = 1%).
    #[arg(long, env = "PAYOUT_FEE_BPS")]
    fee_bps: Option<u32>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PAYOUT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PAYOUT_LOG_FORMAT")]
    log_format: Option<String>,

    /// Directory for daily log files.
    #[arg(long, env = "PAYOUT_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log to stdout only.
    #[arg(long)]
    no_log_file: bool,

    /// Password for encrypted rosters.
    #[arg(long, env = "PAYOUT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Read the password from the first line of this file.
    #[arg(long, conflicts_with = "password")]
    password_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Claim unclaimed tokens, then pay out every account.
    Run {
        #[arg(long)]
        roster: PathBuf,
        /// The roster is an encrypted store.
        #[arg(long)]
        encrypted: bool,
    },
    /// Encrypt a clear roster file.
    Encrypt {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Decrypt an encrypted roster to a clear file.
    Reveal {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the roster with credentials redacted.
    Show {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long)]
        encrypted: bool,
    },
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let base = match &self.config {
            Some(path) => Settings::from_toml_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::default(),
        };
        Ok(Settings {
            rpc_url: self.rpc_url.clone().unwrap_or(base.rpc_url.clone()),
            signer_url: self.signer_url.clone().unwrap_or(base.signer_url.clone()),
            fee_bps: self.fee_bps.unwrap_or(base.fee_bps),
            log_level: self.log_level.clone().unwrap_or(base.log_level.clone()),
            log_format: self.log_format.clone().unwrap_or(base.log_format.clone()),
            log_dir: if self.no_log_file {
                None
            } else {
                self.log_dir.clone().or(base.log_dir.clone())
            },
            ..base
        })
    }

    fn password(&self) -> anyhow::Result<Zeroizing<String>> {
        if let Some(password) = &self.password {
            return Ok(Zeroizing::new(password.clone()));
        }
        let Some(path) = &self.password_file else {
            bail!("a password is required: set PAYOUT_PASSWORD or pass --password-file");
        };
        let contents = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading password file {}", path.display()))?,
        );
        let password = contents.lines().next().unwrap_or_default();
        if password.is_empty() {
            bail!("password file {} is empty", path.display());
        }
        Ok(Zeroizing::new(password.to_string()))
    }

    fn roster(&self, path: &Path, encrypted: bool) -> anyhow::Result<Roster> {
        let bytes = std::fs::read(path).with_context(|| format!("reading roster {}", path.display()))?;
        if encrypted || protect::is_protected(&bytes) {
            let file = protect::load(path)?;
            let clear = protect::decrypt(&file, &self.password()?)?;
            return Ok(Roster::from_slice(&clear)?);
        }
        Ok(Roster::from_slice(&bytes)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let format: LogFormat = settings.log_format.parse().map_err(anyhow::Error::msg)?;
    init_logging(format, &settings.log_level, settings.log_dir.as_deref())
        .context("opening log file")?;

    let result = match &cli.command {
        Command::Run { roster, encrypted } => {
            let roster = cli.roster(roster, *encrypted)?;
            run(&settings, &roster).await.map(|report| summarize(&report))
        }
        Command::Encrypt { input, output } => {
            let clear = Zeroizing::new(
                std::fs::read(input).with_context(|| format!("reading {}", input.display()))?,
            );
            // Refuse to protect something that would not load later.
            Roster::from_slice(&clear)?;
            let file = protect::encrypt(&clear, &cli.password()?)?;
            protect::save(&file, output)?;
            tracing::info!("Encrypted roster written to {}", output.display());
            Ok(())
        }
        Command::Reveal { input, output } => {
            let file = protect::load(input)?;
            let clear = protect::decrypt(&file, &cli.password()?)?;
            std::fs::write(output, clear.as_slice())
                .with_context(|| format!("writing {}", output.display()))?;
            tracing::info!("Clear roster written to {}", output.display());
            Ok(())
        }
        Command::Show { roster, encrypted } => {
            let roster = cli.roster(roster, *encrypted)?;
            tracing::info!("Organization payout address: {}", roster.organization);
            for account in &roster.accounts {
                tracing::info!(
                    "'{}' {} pays {}% to {}",
                    account.name,
                    account.address,
                    account.share.percent(),
                    account.payout_address
                );
            }
            Ok(())
        }
    };

    tracing::info!("Goodbye.");
    result
}

async fn run(settings: &Settings, roster: &Roster) -> anyhow::Result<RunReport> {
    let fee = settings.fee_policy()?;
    let chain = RpcChainClient::new(settings.rpc_config()?, RemoteSigner::new(settings.signer_url.clone())?)?;
    let api = GameApiClient::new(settings.game_api_config(), RemoteSigner::new(settings.signer_url.clone())?)?;
    let prompt = ConsolePrompt::stdin();
    let delay = TokioDelay;

    tracing::info!(
        "Loaded {} account(s); fee {} bps to {}",
        roster.accounts.len(),
        fee.rate.bps(),
        fee.address
    );

    let run = PayoutRun::new(&chain, &api, &prompt, &delay, settings.run_options());
    Ok(run.execute(roster, &fee).await?)
}

fn summarize(report: &RunReport) {
    tracing::info!(
        "Claims: {} completed, {} unresolved. Payouts: {} completed, {} unresolved, {} skipped.",
        report.claims.completed.len(),
        report.claims.unresolved.len(),
        report.payouts.completed.len(),
        report.payouts.unresolved.len(),
        report.skipped.len()
    );
    for name in &report.held {
        tracing::warn!("Payout for '{name}' held until its claim settles.");
    }
    for unresolved in &report.payouts.unresolved {
        let done = unresolved
            .steps_done
            .map_or_else(|| "unknown".to_string(), |n| n.to_string());
        tracing::warn!(
            "Payout for '{}' ({}) incomplete: {} of 3 steps done, expected sequence {}",
            unresolved.account,
            unresolved.address,
            done,
            unresolved.expected_sequence
        );
    }
    for violation in &report.payouts.violations {
        tracing::error!("{violation}");
    }
}
