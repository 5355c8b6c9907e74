//! Tool settings with TOML file support.
//!
//! Every field has a default, so an empty file (or no file) is valid. The
//! CLI layers flags and environment variables on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use payout_chain::{GameApiConfig, RpcConfig};
use payout_types::Address;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::run::{RunOptions, DEFAULT_EXPLORER_URL};
use crate::splitter::{FeePolicy, FeeRate};

/// Receives the service fee of every payout unless overridden.
pub const DEFAULT_FEE_ADDRESS: &str = "ronin:a0caa7803205026ec08818664c4211aff7565f56";
/// The game token contract.
pub const DEFAULT_TOKEN_CONTRACT: &str = "0xa8754b9fa15fc18bb59458815510e40a12cd2014";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// JSON-RPC endpoint of the chain node.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_token_contract")]
    pub token_contract: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    #[serde(default = "default_gas_price_wei")]
    pub gas_price_wei: u64,

    #[serde(default = "default_items_url")]
    pub items_url: String,

    #[serde(default = "default_claim_url")]
    pub claim_url: String,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// HTTP signer holding the account keys.
    #[serde(default = "default_signer_url")]
    pub signer_url: String,

    #[serde(default = "default_fee_address")]
    pub fee_address: String,

    /// Basis points; 100 = 1%.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,

    #[serde(default = "default_claim_settle_secs")]
    pub claim_settle_secs: u64,

    #[serde(default = "default_payout_settle_secs")]
    pub payout_settle_secs: u64,

    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    #[serde(default = "default_claim_cooldown_days")]
    pub claim_cooldown_days: u64,

    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,

    /// "trace", "debug", "info", "warn" or "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Daily log files are written here when set.
    #[serde(default = "default_log_dir")]
    pub log_dir: Option<PathBuf>,
}

fn default_rpc_url() -> String {
    "https://api.roninchain.com/rpc".to_string()
}

fn default_token_contract() -> String {
    DEFAULT_TOKEN_CONTRACT.to_string()
}

fn default_chain_id() -> u64 {
    RpcConfig::DEFAULT_CHAIN_ID
}

fn default_gas_price_wei() -> u64 {
    RpcConfig::DEFAULT_GAS_PRICE_WEI as u64
}

fn default_items_url() -> String {
    GameApiConfig::default().items_url
}

fn default_claim_url() -> String {
    GameApiConfig::default().claim_url
}

fn default_gateway_url() -> String {
    GameApiConfig::default().gateway_url
}

fn default_signer_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_fee_address() -> String {
    DEFAULT_FEE_ADDRESS.to_string()
}

fn default_fee_bps() -> u32 {
    FeeRate::DEFAULT.bps()
}

fn default_claim_settle_secs() -> u64 {
    30
}

fn default_payout_settle_secs() -> u64 {
    300
}

fn default_pacing_ms() -> u64 {
    250
}

fn default_claim_cooldown_days() -> u64 {
    14
}

fn default_explorer_url() -> String {
    DEFAULT_EXPLORER_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_dir() -> Option<PathBuf> {
    Some(PathBuf::from("logs"))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            token_contract: default_token_contract(),
            chain_id: default_chain_id(),
            gas_price_wei: default_gas_price_wei(),
            items_url: default_items_url(),
            claim_url: default_claim_url(),
            gateway_url: default_gateway_url(),
            signer_url: default_signer_url(),
            fee_address: default_fee_address(),
            fee_bps: default_fee_bps(),
            claim_settle_secs: default_claim_settle_secs(),
            payout_settle_secs: default_payout_settle_secs(),
            pacing_ms: default_pacing_ms(),
            claim_cooldown_days: default_claim_cooldown_days(),
            explorer_url: default_explorer_url(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_dir: default_log_dir(),
        }
    }
}

impl Settings {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Settings(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Settings(e.to_string()))
    }

    pub fn rpc_config(&self) -> Result<RpcConfig, ConfigError> {
        let token_contract = Address::parse(&self.token_contract)
            .map_err(|e| ConfigError::Settings(format!("token_contract: {e}")))?;
        Ok(RpcConfig {
            chain_id: self.chain_id,
            gas_price_wei: u128::from(self.gas_price_wei),
            ..RpcConfig::new(self.rpc_url.clone(), token_contract)
        })
    }

    pub fn game_api_config(&self) -> GameApiConfig {
        GameApiConfig {
            items_url: self.items_url.clone(),
            claim_url: self.claim_url.clone(),
            gateway_url: self.gateway_url.clone(),
            claim_cooldown: Duration::from_secs(self.claim_cooldown_days.saturating_mul(24 * 60 * 60)),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            claim_settle: Duration::from_secs(self.claim_settle_secs),
            payout_settle: Duration::from_secs(self.payout_settle_secs),
            pacing: Duration::from_millis(self.pacing_ms),
            explorer_url: self.explorer_url.clone(),
        }
    }

    pub fn fee_policy(&self) -> Result<FeePolicy, ConfigError> {
        let address = Address::parse(&self.fee_address)
            .map_err(|e| ConfigError::Settings(format!("fee_address: {e}")))?;
        Ok(FeePolicy {
            address,
            rate: FeeRate::from_bps(self.fee_bps)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let s = Settings::from_toml_str("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.fee_bps, 100);
        assert_eq!(s.claim_settle_secs, 30);
        assert_eq!(s.payout_settle_secs, 300);
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let s = Settings::from_toml_str(
            r#"
            rpc_url = "http://localhost:8545"
            fee_bps = 250
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(s.rpc_url, "http://localhost:8545");
        assert_eq!(s.fee_bps, 250);
        assert_eq!(s.log_format, "json");
        assert_eq!(s.pacing_ms, 250);
    }

    #[test]
    fn unknown_types_rejected() {
        assert!(matches!(
            Settings::from_toml_str("fee_bps = \"lots\""),
            Err(ConfigError::Settings(_))
        ));
    }

    #[test]
    fn converts_to_collaborator_configs() {
        let s = Settings::default();
        let rpc = s.rpc_config().unwrap();
        assert_eq!(rpc.chain_id, 2020);
        assert_eq!(rpc.token_contract.as_str(), DEFAULT_TOKEN_CONTRACT);

        let fee = s.fee_policy().unwrap();
        assert_eq!(fee.rate.bps(), 100);
        assert_eq!(fee.address.as_str(), "0xa0caa7803205026ec08818664c4211aff7565f56");

        let opts = s.run_options();
        assert_eq!(opts.payout_settle, Duration::from_secs(300));
        assert_eq!(opts.pacing, Duration::from_millis(250));

        assert_eq!(s.game_api_config().claim_cooldown, Duration::from_secs(14 * 86_400));
    }

    #[test]
    fn invalid_fee_settings_rejected() {
        let s = Settings {
            fee_bps: 10_001,
            ..Settings::default()
        };
        assert!(matches!(s.fee_policy(), Err(ConfigError::FeeRate(10_001))));

        let s = Settings {
            fee_address: "nowhere".into(),
            ..Settings::default()
        };
        assert!(s.fee_policy().is_err());
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payout.toml");
        let s = Settings {
            chain_id: 2021,
            ..Settings::default()
        };
        std::fs::write(&path, s.to_toml_string().unwrap()).unwrap();
        assert_eq!(Settings::from_toml_file(&path).unwrap().chain_id, 2021);
    }
}
