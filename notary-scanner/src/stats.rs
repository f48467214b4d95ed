//! Failure-taxonomy tallying, grounded in the `GlobalStats` class from the
//! original Python implementation's `threaded_scanner.py`.

use notary_probe::ProbeError;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ScanStats {
    pub started: AtomicU64,
    pub completed: AtomicU64,
    pub failure_timeout: AtomicU64,
    pub failure_tls_alert: AtomicU64,
    pub failure_conn_refused: AtomicU64,
    pub failure_conn_reset: AtomicU64,
    pub failure_no_route: AtomicU64,
    pub failure_dns: AtomicU64,
    pub failure_other: AtomicU64,
}

impl ScanStats {
    pub fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, err: &ProbeError) {
        let counter = match err {
            ProbeError::Timeout => &self.failure_timeout,
            ProbeError::TlsAlert { .. } => &self.failure_tls_alert,
            ProbeError::ConnRefused => &self.failure_conn_refused,
            ProbeError::ConnReset => &self.failure_conn_reset,
            ProbeError::NoRoute => &self.failure_no_route,
            ProbeError::DnsFailure => &self.failure_dns,
            ProbeError::InvalidFingerprint(_) | ProbeError::Other(_) => &self.failure_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failure_timeout: self.failure_timeout.load(Ordering::Relaxed),
            failure_tls_alert: self.failure_tls_alert.load(Ordering::Relaxed),
            failure_conn_refused: self.failure_conn_refused.load(Ordering::Relaxed),
            failure_conn_reset: self.failure_conn_reset.load(Ordering::Relaxed),
            failure_no_route: self.failure_no_route.load(Ordering::Relaxed),
            failure_dns: self.failure_dns.load(Ordering::Relaxed),
            failure_other: self.failure_other.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanStatsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failure_timeout: u64,
    pub failure_tls_alert: u64,
    pub failure_conn_refused: u64,
    pub failure_conn_reset: u64,
    pub failure_no_route: u64,
    pub failure_dns: u64,
    pub failure_other: u64,
}

impl ScanStatsSnapshot {
    pub fn total_failures(&self) -> u64 {
        self.failure_timeout
            + self.failure_tls_alert
            + self.failure_conn_refused
            + self.failure_conn_reset
            + self.failure_no_route
            + self.failure_dns
            + self.failure_other
    }
}
