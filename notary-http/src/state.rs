//! Shared application state for the notary HTTP surface.

use notary_admission::AdmissionGate;
use notary_cache::Cache;
use notary_core::ObservationStore;
use notary_metrics::MetricsRecorder;
use notary_probe::ProbeClient;
use notary_signer::Signer;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObservationStore>,
    pub cache: Arc<dyn Cache>,
    pub admission: Arc<AdmissionGate>,
    pub signer: Arc<Signer>,
    pub probe: Arc<ProbeClient>,
    pub metrics: Arc<MetricsRecorder>,
    pub cache_ttl: Duration,
    pub public_key_pem: Arc<String>,
    /// When true, a store miss never triggers an on-demand probe
    /// (`--cache-only`); the request simply falls through to 404.
    pub cache_only: bool,
}
