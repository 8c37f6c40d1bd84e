use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("token authentication failed")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issued-at")]
    InvalidIat,
    #[error("invalid expiration")]
    InvalidExp,
    #[error("invalid subject")]
    InvalidSubject,
    #[error("invalid key material")]
    InvalidKey,
    #[error("failed to generate nonce")]
    Nonce,
    #[error("time parse error")]
    TimeParse,
    #[error("time format error")]
    TimeFormat,
}
