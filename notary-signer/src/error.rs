use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("fingerprint {0:?} is not 16 colon-separated hex bytes")]
    InvalidFingerprint(String),

    #[error("failed to load RSA private key: {0}")]
    KeyLoad(String),

    #[error("signing failed: {0}")]
    SigningFailure(String),
}
