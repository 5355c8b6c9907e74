//! JSON-RPC implementation of [`ChainClient`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use payout_types::{Address, Credential, TxHash, TxStatus};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::abi;
use crate::client::{ChainClient, ClaimAuthorization, Transfer};
use crate::error::ChainError;
use crate::signer::{TransactionRequest, TransactionSigner};

/// Connection and gas parameters for the token chain.
#[derive(Clone, Debug)]
pub struct RpcConfig {
    pub url: String,
    pub chain_id: u64,
    /// The token contract that holds balances and accepts claims.
    pub token_contract: Address,
    pub gas_price_wei: u128,
    pub transfer_gas: u64,
    pub claim_gas: u64,
}

impl RpcConfig {
    pub const DEFAULT_CHAIN_ID: u64 = 2020;
    pub const DEFAULT_GAS_PRICE_WEI: u128 = 1_000_000_000;
    pub const DEFAULT_TRANSFER_GAS: u64 = 100_000;
    pub const DEFAULT_CLAIM_GAS: u64 = 1_000_000;

    pub fn new(url: impl Into<String>, token_contract: Address) -> Self {
        Self {
            url: url.into(),
            chain_id: Self::DEFAULT_CHAIN_ID,
            token_contract,
            gas_price_wei: Self::DEFAULT_GAS_PRICE_WEI,
            transfer_gas: Self::DEFAULT_TRANSFER_GAS,
            claim_gas: Self::DEFAULT_CLAIM_GAS,
        }
    }
}

/// Ethereum-style JSON-RPC client for the token chain.
///
/// Reads go straight to the node; writes are built here, signed by `S`, and
/// broadcast with `eth_sendRawTransaction`.
pub struct RpcChainClient<S> {
    http: reqwest::Client,
    config: RpcConfig,
    signer: S,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct Receipt {
    #[serde(default)]
    status: Option<String>,
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(raw: &str) -> Result<u64, ChainError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("quantity without 0x: {raw}")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|_| {
        if digits.len() > 16 {
            ChainError::Overflow(raw.to_string())
        } else {
            ChainError::InvalidResponse(format!("invalid quantity: {raw}"))
        }
    })
}

fn as_str(value: &Value, what: &str) -> Result<String, ChainError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ChainError::InvalidResponse(format!("{what} is not a string: {value}")))
}

impl<S: TransactionSigner> RpcChainClient<S> {
    pub fn new(config: RpcConfig, signer: S) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChainError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            signer,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = self.http.post(&self.config.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ChainError::Http(format!(
                "{method}: node returned HTTP {}",
                response.status()
            )));
        }

        let resp: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = resp.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    async fn send_signed(
        &self,
        to: &Address,
        data: Vec<u8>,
        gas: u64,
        sequence: u64,
        credential: &Credential,
    ) -> Result<TxHash, ChainError> {
        let request = TransactionRequest {
            chain_id: self.config.chain_id,
            nonce: sequence,
            gas,
            gas_price: self.config.gas_price_wei,
            to: to.clone(),
            data: format!("0x{}", hex::encode(data)),
        };
        let signed = self.signer.sign_transaction(&request, credential).await?;

        let result = self
            .rpc_call("eth_sendRawTransaction", json!([signed.raw]))
            .await?;
        let reported = TxHash::parse(&as_str(&result, "transaction hash")?)
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
        if reported != signed.hash {
            tracing::warn!(
                signed = %signed.hash,
                reported = %reported,
                "node reported a different transaction hash than the signer"
            );
        }
        Ok(reported)
    }
}

impl<S: TransactionSigner> ChainClient for RpcChainClient<S> {
    async fn sequence_number(&self, address: &Address) -> Result<u64, ChainError> {
        let result = self
            .rpc_call(
                "eth_getTransactionCount",
                json!([address.as_str(), "latest"]),
            )
            .await?;
        parse_quantity(&as_str(&result, "transaction count")?)
    }

    async fn token_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let call = json!({
            "to": self.config.token_contract.as_str(),
            "data": format!("0x{}", hex::encode(abi::encode_balance_of(address))),
        });
        let result = self.rpc_call("eth_call", json!([call, "latest"])).await?;
        let raw = as_str(&result, "balanceOf result")?;
        let bytes = hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| ChainError::InvalidResponse(format!("balanceOf result: {e}")))?;
        abi::decode_u64_word(&bytes)
    }

    async fn submit_transfer(
        &self,
        transfer: &Transfer,
        sequence: u64,
        credential: &Credential,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_transfer(&transfer.to, transfer.amount);
        let contract = self.config.token_contract.clone();
        self.send_signed(&contract, data, self.config.transfer_gas, sequence, credential)
            .await
    }

    async fn submit_claim(
        &self,
        address: &Address,
        authorization: &ClaimAuthorization,
        sequence: u64,
        credential: &Credential,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_checkpoint(
            address,
            authorization.amount,
            authorization.timestamp,
            &authorization.signature,
        )?;
        let contract = self.config.token_contract.clone();
        self.send_signed(&contract, data, self.config.claim_gas, sequence, credential)
            .await
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxStatus, ChainError> {
        let hash_str = hash.to_string();
        let receipt = self
            .rpc_call("eth_getTransactionReceipt", json!([hash_str]))
            .await?;

        if receipt.is_null() {
            let tx = self
                .rpc_call("eth_getTransactionByHash", json!([hash_str]))
                .await?;
            return Ok(if tx.is_null() {
                TxStatus::NotFound
            } else {
                TxStatus::Pending
            });
        }

        let receipt: Receipt = serde_json::from_value(receipt)
            .map_err(|e| ChainError::InvalidResponse(format!("receipt: {e}")))?;
        match receipt.status.as_deref() {
            Some("0x1") => Ok(TxStatus::Success),
            Some("0x0") => Ok(TxStatus::Failed),
            _ => Ok(TxStatus::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x1a").unwrap(), 26);
        assert!(parse_quantity("1a").is_err());
        assert!(parse_quantity("0xzz").is_err());
        assert!(matches!(
            parse_quantity("0x1ffffffffffffffff"),
            Err(ChainError::Overflow(_))
        ));
    }

    #[test]
    fn config_defaults() {
        let contract =
            Address::parse("0xa8754b9fa15fc18bb59458815510e40a12cd2014").unwrap();
        let cfg = RpcConfig::new("https://rpc.example", contract);
        assert_eq!(cfg.chain_id, 2020);
        assert_eq!(cfg.gas_price_wei, 1_000_000_000);
        assert_eq!(cfg.transfer_gas, 100_000);
        assert_eq!(cfg.claim_gas, 1_000_000);
    }

    #[test]
    fn rpc_error_body_deserializes() {
        let resp: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "nonce too low" }
        }))
        .unwrap();
        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "nonce too low");
    }
}
