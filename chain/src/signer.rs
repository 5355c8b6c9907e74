//! Transaction and message signing collaborator.
//!
//! Signing is not done in-process: a [`TransactionSigner`] receives a fully
//! specified transaction descriptor plus the account credential and returns
//! the wire-ready payload and its hash. [`RemoteSigner`] talks to a local
//! signing sidecar over HTTP.

use std::time::Duration;

use payout_types::{Address, Credential, TxHash};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// Everything needed to sign a legacy (pre-1559) transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas: u64,
    pub gas_price: u128,
    pub to: Address,
    /// Hex-encoded calldata, `0x`-prefixed.
    pub data: String,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Hex-encoded raw transaction, `0x`-prefixed.
    pub raw: String,
    pub hash: TxHash,
}

#[allow(async_fn_in_trait)]
pub trait TransactionSigner {
    async fn sign_transaction(
        &self,
        request: &TransactionRequest,
        credential: &Credential,
    ) -> Result<SignedTransaction, ChainError>;

    /// Personal-message signature (hex) used to obtain API access tokens.
    async fn sign_message(&self, message: &str, credential: &Credential)
        -> Result<String, ChainError>;
}

/// HTTP client for a local signing sidecar.
///
/// Endpoints: `POST {url}/sign/transaction` and `POST {url}/sign/message`.
#[derive(Clone)]
pub struct RemoteSigner {
    http: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct SignTransactionBody<'a> {
    transaction: &'a TransactionRequest,
    private_key: &'a str,
}

#[derive(Deserialize)]
struct SignTransactionResponse {
    #[serde(alias = "rawTransaction")]
    raw: String,
    hash: String,
}

#[derive(Serialize)]
struct SignMessageBody<'a> {
    message: &'a str,
    private_key: &'a str,
}

#[derive(Deserialize)]
struct SignMessageResponse {
    signature: String,
}

impl RemoteSigner {
    pub fn new(url: impl Into<String>) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChainError::Signer(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ChainError> {
        let response = self
            .http
            .post(format!("{}{}", self.url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::Signer(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ChainError::Signer(format!(
                "signer returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChainError::Signer(format!("invalid signer response: {e}")))
    }
}

impl TransactionSigner for RemoteSigner {
    async fn sign_transaction(
        &self,
        request: &TransactionRequest,
        credential: &Credential,
    ) -> Result<SignedTransaction, ChainError> {
        let body = SignTransactionBody {
            transaction: request,
            private_key: credential.expose(),
        };
        let resp: SignTransactionResponse = self.post("/sign/transaction", &body).await?;
        let hash = TxHash::parse(&resp.hash)
            .map_err(|e| ChainError::Signer(format!("signer returned {e}")))?;
        Ok(SignedTransaction {
            raw: resp.raw,
            hash,
        })
    }

    async fn sign_message(
        &self,
        message: &str,
        credential: &Credential,
    ) -> Result<String, ChainError> {
        let body = SignMessageBody {
            message,
            private_key: credential.expose(),
        };
        let resp: SignMessageResponse = self.post("/sign/message", &body).await?;
        Ok(resp.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transaction_body_carries_descriptor_and_key() {
        let request = TransactionRequest {
            chain_id: 2020,
            nonce: 7,
            gas: 100_000,
            gas_price: 1_000_000_000,
            to: Address::parse("ronin:a8754b9fa15fc18bb59458815510e40a12cd2014").unwrap(),
            data: "0xa9059cbb".into(),
        };
        let body = SignTransactionBody {
            transaction: &request,
            private_key: "0x01",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["transaction"]["nonce"], 7);
        assert_eq!(value["transaction"]["chain_id"], 2020);
        assert_eq!(
            value["transaction"]["to"],
            "0xa8754b9fa15fc18bb59458815510e40a12cd2014"
        );
        assert_eq!(value["private_key"], "0x01");
    }

    #[test]
    fn transaction_response_accepts_either_raw_field_name() {
        let hash = format!("0x{}", "ab".repeat(32));
        let a: SignTransactionResponse =
            serde_json::from_value(json!({ "raw": "0xf86b", "hash": hash })).unwrap();
        let b: SignTransactionResponse =
            serde_json::from_value(json!({ "rawTransaction": "0xf86b", "hash": hash })).unwrap();
        assert_eq!(a.raw, b.raw);
    }

    #[test]
    fn signer_url_is_normalized() {
        let signer = RemoteSigner::new("http://127.0.0.1:8545/").unwrap();
        assert_eq!(signer.url, "http://127.0.0.1:8545");
    }
}
