//! Guards the notary from unbounded on-demand probe fan-out: a global
//! semaphore caps concurrent probes, and an in-flight set collapses
//! duplicate requests for the same service into a single probe.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_PROBE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No permit was available; every in-flight slot is occupied.
    LimitExceeded,
    /// A probe for this service is already in flight.
    Duplicate,
}

/// Held for the lifetime of one on-demand probe. Dropping it (on any exit
/// path, including an early `?` return or a panic unwind) releases the
/// semaphore permit and removes the service from the in-flight set,
/// enforced by construction rather than by caller discipline.
pub struct Admission {
    service: String,
    inflight: Arc<Mutex<HashSet<String>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.inflight.lock().unwrap().remove(&self.service);
    }
}

pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    inflight: Arc<Mutex<HashSet<String>>>,
}

impl AdmissionGate {
    pub fn new(probe_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(probe_limit)),
            inflight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Attempt to admit `service` for an on-demand probe.
    pub fn try_admit(&self, service: &str) -> Result<Admission, RejectReason> {
        let permit = self.semaphore.clone().try_acquire_owned().map_err(|_| {
            tracing::debug!(service, "admission rejected: probe limit exceeded");
            RejectReason::LimitExceeded
        })?;

        let mut inflight = self.inflight.lock().unwrap();
        if inflight.contains(service) {
            drop(permit);
            tracing::debug!(service, "admission rejected: probe already in flight");
            return Err(RejectReason::Duplicate);
        }
        inflight.insert(service.to_string());
        drop(inflight);

        Ok(Admission {
            service: service.to_string(),
            inflight: self.inflight.clone(),
            _permit: permit,
        })
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_LIMIT)
    }
}
