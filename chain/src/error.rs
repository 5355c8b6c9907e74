use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("game API error: {0}")]
    Api(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("value {0} does not fit in 64 bits")]
    Overflow(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Http(e.to_string())
    }
}
