//! Error taxonomy for the observation store.

use thiserror::Error;

/// Errors surfaced by [`crate::ObservationStore`] implementations.
///
/// `Unique` and `Constraint` are absorbed by the store internally (they
/// represent idempotent-intent races) and should rarely escape to callers;
/// they are kept in the public enum so backends and tests can observe them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("observation violates a uniqueness constraint")]
    Unique,

    #[error("observation violates a range/shape constraint: {0}")]
    Constraint(String),

    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur parsing a service identifier of the form
/// `host:port,type`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceIdError {
    #[error("missing ',type' suffix in service id")]
    MissingType,

    #[error("unknown service type {0:?}, expected 1 (ssh) or 2 (tls)")]
    UnknownType(String),

    #[error("missing ':port' in service id")]
    MissingPort,

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("empty host in service id")]
    EmptyHost,
}
