//! The `ObservationStore` trait: persistence boundary for services and
//! observations, and the continuity algorithm contract it implements.

use crate::error::StoreError;
use crate::model::Observation;
use async_trait::async_trait;

/// Persists `(service, key, start, end)` rows with a continuity algorithm,
/// and exposes the read-side queries the rest of the notary needs.
///
/// Implementations own all persistent state exclusively; callers only ever
/// see value copies of rows, never live references into storage.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Record a fresh sighting of `key` at `service`, applying the
    /// continuity algorithm.
    async fn report_observation(&self, service: &str, key: &str) -> Result<(), StoreError>;

    /// All observations for `service`, ordered by `(key, start)`. An empty
    /// vector is a valid result (including for an unknown service).
    async fn get_observations(&self, service: &str) -> Result<Vec<Observation>, StoreError>;

    /// Idempotently ensure `service` exists.
    async fn insert_service(&self, service: &str) -> Result<(), StoreError>;

    /// Idempotently ensure every name in `services` exists.
    async fn insert_bulk_services(&self, services: &[String]) -> Result<(), StoreError>;

    async fn count_services(&self) -> Result<u64, StoreError>;

    async fn count_observations(&self) -> Result<u64, StoreError>;

    async fn get_all_service_names(&self) -> Result<Vec<String>, StoreError>;

    /// Services with any observation whose `end > end_limit`.
    async fn get_newest_service_names(&self, end_limit: i64) -> Result<Vec<String>, StoreError>;

    /// Services whose *most recent* observation has `end <= end_limit`.
    async fn get_oldest_service_names(&self, end_limit: i64) -> Result<Vec<String>, StoreError>;
}
