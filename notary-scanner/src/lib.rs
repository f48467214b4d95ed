//! Rate-paced batch scanning, grounded in the original Python
//! implementation's `threaded_scanner.py`: launch a batch of probes, pace
//! to roughly `rate` per second, flush results to the store, repeat until
//! the service list is exhausted.

mod stats;

pub use stats::{ScanStats, ScanStatsSnapshot};

use notary_core::{ObservationStore, ServiceId};
use notary_metrics::{EventKind, MetricsRecorder};
use notary_probe::ProbeClient;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Probes launched per pacing tick.
    pub rate: usize,
    pub timeout_sec: u64,
    pub sni: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rate: 10,
            timeout_sec: 10,
            sni: true,
        }
    }
}

enum ProbeOutcome {
    Success { service: String, fingerprint: String },
    Failure,
}

pub struct ScannerPool {
    config: ScannerConfig,
    probe_client: Arc<ProbeClient>,
    store: Arc<dyn ObservationStore>,
    metrics: Arc<MetricsRecorder>,
}

impl ScannerPool {
    pub fn new(
        config: ScannerConfig,
        probe_client: Arc<ProbeClient>,
        store: Arc<dyn ObservationStore>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            config,
            probe_client,
            store,
            metrics,
        }
    }

    /// Scan every service in `services`, writing successful sightings to
    /// the store as they complete. Returns tallied statistics.
    pub async fn scan(&self, services: Vec<ServiceId>) -> ScanStatsSnapshot {
        let stats = Arc::new(ScanStats::default());
        // Soft worker ceiling, generously sized relative to the pacing rate.
        let worker_ceiling = Arc::new(Semaphore::new((6 * self.config.rate.max(1)).max(1)));
        let (tx, mut rx) = mpsc::channel::<ProbeOutcome>(self.config.rate.max(1) * 4);

        let store = self.store.clone();
        let drain_stats = stats.clone();
        let drain_metrics = self.metrics.clone();
        let drain_task = tokio::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                match outcome {
                    ProbeOutcome::Success {
                        service,
                        fingerprint,
                    } => {
                        if let Err(e) = store.report_observation(&service, &fingerprint).await {
                            warn!(service = %service, error = %e, "failed to persist observation");
                            drain_metrics.record(EventKind::ServiceScanFailure);
                        } else {
                            drain_stats.record_success();
                            drain_metrics.record(EventKind::ServiceScanKeyUpdated);
                        }
                    }
                    ProbeOutcome::Failure => {
                        drain_metrics.record(EventKind::ServiceScanFailure);
                    }
                }
            }
        });

        let mut handles = Vec::with_capacity(services.len());
        for chunk in services.chunks(self.config.rate.max(1)) {
            for service_id in chunk {
                stats.record_start();
                self.metrics.record(EventKind::ServiceScanStart);
                let permit = worker_ceiling.clone().acquire_owned().await.expect(
                    "worker ceiling semaphore is never closed while the scan is running",
                );
                let probe_client = self.probe_client.clone();
                let tx = tx.clone();
                let stats = stats.clone();
                let metrics = self.metrics.clone();
                let host = service_id.host.clone();
                let port = service_id.port;
                let service_type = service_id.service_type;
                let service_name = service_id.to_string();

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let started = Instant::now();
                    let result = probe_client.probe(&host, port, service_type).await;
                    if started.elapsed() > Duration::from_secs(20) {
                        warn!(service = %service_name, "long-running scan worker");
                    }
                    let outcome = match result {
                        Ok(fingerprint) => ProbeOutcome::Success {
                            service: service_name,
                            fingerprint,
                        },
                        Err(e) => {
                            stats.record_failure(&e);
                            ProbeOutcome::Failure
                        }
                    };
                    metrics.record(EventKind::ServiceScanStop);
                    let _ = tx.send(outcome).await;
                }));
            }

            // Pace roughly `rate` probes per second before the next batch.
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        drop(tx);

        let drain_deadline = Duration::from_secs(2 * self.config.timeout_sec.max(1));
        if timeout(drain_deadline, futures_join_all(handles)).await.is_err() {
            warn!("scan drain window elapsed with workers still outstanding");
        }

        let _ = drain_task.await;

        stats.snapshot()
    }
}

async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
