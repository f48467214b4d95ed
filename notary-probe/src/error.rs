//! The probe error taxonomy. All variants are non-fatal to the caller: a
//! probe failure becomes a metric and a log line, never an escaped
//! exception.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("TLS alert level={level} code={code}")]
    TlsAlert { level: u8, code: u8 },

    #[error("connection refused")]
    ConnRefused,

    #[error("connection reset")]
    ConnReset,

    #[error("no route to host")]
    NoRoute,

    #[error("DNS resolution failed")]
    DnsFailure,

    #[error("fingerprint {0:?} did not match the expected shape")]
    InvalidFingerprint(String),

    #[error("probe failed: {0}")]
    Other(String),
}

impl ProbeError {
    /// Classify a raw I/O error the way `threaded_scanner.py`'s
    /// `record_failure` classifies `errno` values, for per-kind stats
    /// tallying.
    pub fn from_io_error(e: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionRefused => ProbeError::ConnRefused,
            ErrorKind::ConnectionReset => ProbeError::ConnReset,
            ErrorKind::TimedOut => ProbeError::Timeout,
            ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable => ProbeError::NoRoute,
            _ => {
                // `std::io::ErrorKind` doesn't expose a DNS-specific
                // variant; name resolution failures surface as `Other`
                // from getaddrinfo and are reclassified by the caller
                // before falling through here.
                ProbeError::Other(e.to_string())
            }
        }
    }
}
