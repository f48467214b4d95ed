//! Active TLS/SSH fingerprint probing.

pub mod error;
mod ssh;
mod tls;
mod tls_record;

pub use error::ProbeError;

use notary_core::ServiceType;

/// Probing configuration, shared across all probes a `ProbeClient` issues.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout_sec: u64,
    /// Whether TLS probes send an SNI extension (falls back to no-SNI on
    /// a TLS alert regardless of this setting).
    pub sni: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_sec: 10,
            sni: true,
        }
    }
}

/// Issues on-demand and scan probes against a single `host:port`.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    config: ProbeConfig,
}

impl ProbeClient {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe `host:port` for its fingerprint, dispatching to the TLS or
    /// SSH implementation by `service_type`.
    pub async fn probe(
        &self,
        host: &str,
        port: u16,
        service_type: ServiceType,
    ) -> Result<String, ProbeError> {
        match service_type {
            ServiceType::Tls => {
                tls::probe_tls_fingerprint(host, port, self.config.timeout_sec, self.config.sni)
                    .await
            }
            ServiceType::Ssh => {
                ssh::probe_ssh_fingerprint(host, port, self.config.timeout_sec).await
            }
        }
    }
}
