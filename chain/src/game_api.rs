//! HTTP implementation of [`ClaimAuthorizationService`] against the game API.
//!
//! The upstream schema has changed field names and hosts across revisions,
//! so responses are read leniently (numbers or numeric strings, aliased
//! field names) and every endpoint is configurable.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use payout_types::{Address, Credential};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{ClaimAuthorization, ClaimAuthorizationService};
use crate::error::ChainError;
use crate::signer::TransactionSigner;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.77 Safari/537.36";

/// Attempts made for the unclaimed-balance lookup before giving up.
const UNCLAIMED_ATTEMPTS: u32 = 3;
const UNCLAIMED_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Endpoints and policy for the game API.
#[derive(Clone, Debug)]
pub struct GameApiConfig {
    /// Base URL of the read API serving per-player item totals.
    pub items_url: String,
    /// Base URL of the API issuing claim grants.
    pub claim_url: String,
    /// GraphQL gateway issuing access tokens.
    pub gateway_url: String,
    /// Tokens claimed less than this long ago cannot be claimed again.
    pub claim_cooldown: Duration,
}

impl Default for GameApiConfig {
    fn default() -> Self {
        Self {
            items_url: "https://game-api-pre.skymavis.com".to_string(),
            claim_url: "https://game-api.skymavis.com".to_string(),
            gateway_url: "https://graphql-gateway.axieinfinity.com/graphql".to_string(),
            claim_cooldown: Duration::from_secs(14 * 24 * 60 * 60),
        }
    }
}

/// Read a JSON number or numeric string as `u64`.
fn lenient_u64(value: &Value, field: &str) -> Result<u64, ChainError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ChainError::InvalidResponse(format!("{field} is not a u64: {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| ChainError::InvalidResponse(format!("{field} is not numeric: {s:?}"))),
        other => Err(ChainError::InvalidResponse(format!(
            "{field} missing or malformed: {other}"
        ))),
    }
}

fn field<'a>(body: &'a Value, names: &[&str]) -> &'a Value {
    names
        .iter()
        .find_map(|n| body.get(*n))
        .unwrap_or(&Value::Null)
}

/// Unclaimed amount from an items response, honoring the claim cooldown.
///
/// Unclaimed is gross total minus the already-claimable part
/// (`rawTotal - rawClaimableTotal`). Within `cooldown` of the last claim
/// nothing can be claimed, so the result is 0.
pub fn unclaimed_from_items(body: &Value, now_secs: u64, cooldown: Duration) -> Result<u64, ChainError> {
    let raw_total = lenient_u64(field(body, &["rawTotal", "raw_total"]), "rawTotal")?;
    let raw_claimable = lenient_u64(
        field(body, &["rawClaimableTotal", "raw_claimable_total", "claimableTotal"]),
        "rawClaimableTotal",
    )?;
    let last_claimed = lenient_u64(
        field(body, &["lastClaimedItemAt", "last_claimed_item_at"]),
        "lastClaimedItemAt",
    )?;

    let total = raw_total.checked_sub(raw_claimable).ok_or_else(|| {
        ChainError::InvalidResponse(format!(
            "rawClaimableTotal {raw_claimable} exceeds rawTotal {raw_total}"
        ))
    })?;

    if now_secs.saturating_sub(cooldown.as_secs()) < last_claimed {
        return Ok(0);
    }
    Ok(total)
}

/// Extract the claim grant from a claim response.
pub fn authorization_from_claim(body: &Value) -> Result<ClaimAuthorization, ChainError> {
    let sig = body
        .get("blockchain_related")
        .or_else(|| body.get("blockchainRelated"))
        .and_then(|b| b.get("signature"))
        .ok_or_else(|| ChainError::Api("claim response has no signature block".into()))?;

    let signature = sig
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Api("claim signature missing".into()))?
        .trim_start_matches("0x")
        .to_string();

    Ok(ClaimAuthorization {
        signature,
        amount: lenient_u64(field(sig, &["amount"]), "amount")?,
        timestamp: lenient_u64(field(sig, &["timestamp"]), "timestamp")?,
    })
}

#[derive(Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
}

/// Game API client. Message signing for access tokens goes through `S`.
pub struct GameApiClient<S> {
    http: reqwest::Client,
    config: GameApiConfig,
    signer: S,
}

impl<S: TransactionSigner> GameApiClient<S> {
    pub fn new(config: GameApiConfig, signer: S) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ChainError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            signer,
        })
    }

    async fn graphql(&self, payload: Value, operation: &str) -> Result<Value, ChainError> {
        let response = self
            .http
            .post(&self.config.gateway_url)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChainError::Api(format!(
                "{operation}: gateway returned HTTP {}",
                response.status()
            )));
        }
        let body: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{operation}: {e}")))?;
        body.data
            .ok_or_else(|| ChainError::Api(format!("{operation}: response has no data")))
    }

    async fn random_message(&self) -> Result<String, ChainError> {
        let data = self
            .graphql(
                json!({
                    "operationName": "CreateRandomMessage",
                    "variables": {},
                    "query": "mutation CreateRandomMessage { createRandomMessage }",
                }),
                "CreateRandomMessage",
            )
            .await?;
        data.get("createRandomMessage")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChainError::Api("CreateRandomMessage: no message".into()))
    }

    async fn access_token(
        &self,
        address: &Address,
        credential: &Credential,
    ) -> Result<String, ChainError> {
        let message = self.random_message().await?;
        let signature = self.signer.sign_message(&message, credential).await?;

        let data = self
            .graphql(
                json!({
                    "operationName": "CreateAccessTokenWithSignature",
                    "variables": {
                        "input": {
                            "mainnet": "ronin",
                            "owner": address.as_str(),
                            "message": message,
                            "signature": signature,
                        }
                    },
                    "query": "mutation CreateAccessTokenWithSignature($input: SignatureInput!) { createAccessTokenWithSignature(input: $input) { newAccount result accessToken __typename } }",
                }),
                "CreateAccessTokenWithSignature",
            )
            .await?;

        data.get("createAccessTokenWithSignature")
            .and_then(|d| d.get("accessToken"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChainError::Api("CreateAccessTokenWithSignature: no token".into()))
    }
}

impl<S: TransactionSigner> ClaimAuthorizationService for GameApiClient<S> {
    async fn unclaimed_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let url = format!(
            "{}/v1/players/{}/items/1",
            self.config.items_url.trim_end_matches('/'),
            address.as_str()
        );

        let mut last_error = ChainError::Api("no attempt made".into());
        for attempt in 1..=UNCLAIMED_ATTEMPTS {
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: Value = resp
                        .json()
                        .await
                        .map_err(|e| ChainError::InvalidResponse(format!("items: {e}")))?;
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or(0);
                    return unclaimed_from_items(&body, now, self.config.claim_cooldown);
                }
                Ok(resp) => {
                    last_error = ChainError::Api(format!("items returned HTTP {}", resp.status()));
                }
                Err(e) => last_error = e.into(),
            }
            tracing::debug!(%address, attempt, error = %last_error, "unclaimed lookup failed");
            if attempt < UNCLAIMED_ATTEMPTS {
                tokio::time::sleep(UNCLAIMED_RETRY_DELAY).await;
            }
        }
        Err(last_error)
    }

    async fn request_authorization(
        &self,
        address: &Address,
        credential: &Credential,
    ) -> Result<ClaimAuthorization, ChainError> {
        let token = self.access_token(address, credential).await?;
        let url = format!(
            "{}/game-api/clients/{}/items/1/claim",
            self.config.claim_url.trim_end_matches('/'),
            address.as_str()
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!(""))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChainError::Api(format!(
                "claim returned HTTP {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("claim: {e}")))?;
        authorization_from_claim(&body)
    }
}
