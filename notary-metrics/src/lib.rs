//! Rate-limited event metrics. Recording is capped at
//! `interval` per event kind so a noisy caller (e.g. a scan flood) cannot
//! turn metrics emission itself into a load problem; events suppressed by
//! the rate limit are tallied and folded into the next emission of that
//! kind as a "skipped N" note.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GetObservationsForService,
    ScanForNewService,
    ProbeLimitExceeded,
    ServiceScanStart,
    ServiceScanStop,
    ServiceScanFailure,
    OnDemandServiceScanFailure,
    CacheHit,
    CacheMiss,
    EventTypeUnknown,
    ServiceScanKeyUpdated,
    ServiceScanPrevKeyUpdated,
}

impl EventKind {
    fn as_str(&self) -> &'static str {
        match self {
            EventKind::GetObservationsForService => "get_observations_for_service",
            EventKind::ScanForNewService => "scan_for_new_service",
            EventKind::ProbeLimitExceeded => "probe_limit_exceeded",
            EventKind::ServiceScanStart => "service_scan_start",
            EventKind::ServiceScanStop => "service_scan_stop",
            EventKind::ServiceScanFailure => "service_scan_failure",
            EventKind::OnDemandServiceScanFailure => "on_demand_service_scan_failure",
            EventKind::CacheHit => "cache_hit",
            EventKind::CacheMiss => "cache_miss",
            EventKind::EventTypeUnknown => "event_type_unknown",
            EventKind::ServiceScanKeyUpdated => "service_scan_key_updated",
            EventKind::ServiceScanPrevKeyUpdated => "service_scan_prev_key_updated",
        }
    }
}

/// Where recorded events end up. Exclusive — a recorder is wired to
/// exactly one sink.
pub trait MetricsSink: Send + Sync {
    fn emit(&self, kind: EventKind, skipped_since_last: u64);
}

/// Logs via `tracing`.
pub struct LogSink;

impl MetricsSink for LogSink {
    fn emit(&self, kind: EventKind, skipped_since_last: u64) {
        if skipped_since_last > 0 {
            tracing::info!(
                event = kind.as_str(),
                skipped = skipped_since_last,
                "metric event (rate-limited)"
            );
        } else {
            tracing::info!(event = kind.as_str(), "metric event");
        }
    }
}

/// Delegates to any externally-supplied persistence, e.g. a table in the
/// observation store, without coupling `notary-metrics` to `notary-core`.
pub trait MetricsStore: Send + Sync {
    fn record_event(&self, kind: &str, skipped_since_last: u64);
}

pub struct StoreSink<S: MetricsStore> {
    store: S,
}

impl<S: MetricsStore> StoreSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: MetricsStore> MetricsSink for StoreSink<S> {
    fn emit(&self, kind: EventKind, skipped_since_last: u64) {
        self.store.record_event(kind.as_str(), skipped_since_last);
    }
}

struct RateState {
    last_emitted: Option<Instant>,
    skipped: u64,
}

/// Records notary events, rate-limited to at most one emission per `kind`
/// per `interval`. The sink is a trait object so the binary entry point
/// can pick `LogSink` or `StoreSink` at runtime from a CLI flag.
pub struct MetricsRecorder {
    sink: Arc<dyn MetricsSink>,
    interval: Duration,
    state: Mutex<HashMap<EventKind, RateState>>,
}

impl MetricsRecorder {
    pub fn new(sink: Arc<dyn MetricsSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_interval(sink: Arc<dyn MetricsSink>) -> Self {
        Self::new(sink, Duration::from_secs(1))
    }

    pub fn record(&self, kind: EventKind) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let entry = state.entry(kind).or_insert(RateState {
            last_emitted: None,
            skipped: 0,
        });

        let should_emit = match entry.last_emitted {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };

        if should_emit {
            let skipped = entry.skipped;
            entry.last_emitted = Some(now);
            entry.skipped = 0;
            drop(state);
            self.sink.emit(kind, skipped);
        } else {
            entry.skipped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        emits: Arc<AtomicU64>,
        last_skipped: Arc<AtomicU64>,
    }

    impl MetricsSink for CountingSink {
        fn emit(&self, _kind: EventKind, skipped_since_last: u64) {
            self.emits.fetch_add(1, Ordering::SeqCst);
            self.last_skipped.store(skipped_since_last, Ordering::SeqCst);
        }
    }

    #[test]
    fn first_event_of_a_kind_always_emits() {
        let emits = Arc::new(AtomicU64::new(0));
        let sink = CountingSink {
            emits: emits.clone(),
            last_skipped: Arc::new(AtomicU64::new(0)),
        };
        let recorder = MetricsRecorder::new(Arc::new(sink), Duration::from_secs(1));
        recorder.record(EventKind::CacheHit);
        assert_eq!(emits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bursts_within_the_interval_are_rate_limited_and_counted() {
        let emits = Arc::new(AtomicU64::new(0));
        let last_skipped = Arc::new(AtomicU64::new(0));
        let sink = CountingSink {
            emits: emits.clone(),
            last_skipped: last_skipped.clone(),
        };
        let recorder = MetricsRecorder::new(Arc::new(sink), Duration::from_secs(60));

        for _ in 0..5 {
            recorder.record(EventKind::CacheMiss);
        }
        assert_eq!(emits.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(5));
        // still within the interval; all of these are suppressed too
        for _ in 0..3 {
            recorder.record(EventKind::CacheMiss);
        }
        assert_eq!(emits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_kinds_are_rate_limited_independently() {
        let emits = Arc::new(AtomicU64::new(0));
        let sink = CountingSink {
            emits: emits.clone(),
            last_skipped: Arc::new(AtomicU64::new(0)),
        };
        let recorder = MetricsRecorder::new(Arc::new(sink), Duration::from_secs(60));

        recorder.record(EventKind::CacheHit);
        recorder.record(EventKind::CacheMiss);
        assert_eq!(emits.load(Ordering::SeqCst), 2);
    }
}
