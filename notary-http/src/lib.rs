//! `NotaryHTTP`: the single `GET /` endpoint orchestrating
//! cache → store → admission → probe → sign, plus the static info page and
//! public-key publication at `/index.html`.
//!
//! Built on `axum` (`Router`, `tower_http::trace::TraceLayer`). Request
//! logging of any kind is forbidden for privacy, so the trace layer here
//! only creates spans — it carries no `on_request`/`on_response`
//! callbacks that would log per-request fields like the client's address
//! or query string.

mod handler;
pub mod state;
mod validation;

pub use state::AppState;
pub use validation::{validate_query, NotaryQuery, QueryOutcome};

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the notary's axum `Router`: `GET /` for queries and the static
/// info page, `GET /index.html` for the published public key.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::handle_request))
        .route("/index.html", get(handler::handle_index_html))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use notary_admission::AdmissionGate;
    use notary_cache::{Cache, CacheError, LruCache};
    use notary_core::{ObservationStore, Observation, ServiceType, StoreError};
    use notary_metrics::{LogSink, MetricsRecorder};
    use notary_probe::{ProbeClient, ProbeConfig};
    use notary_signer::Signer;
    use rsa::rand_core::OsRng;
    use rsa::RsaPrivateKey;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EmptyStore;

    #[async_trait::async_trait]
    impl ObservationStore for EmptyStore {
        async fn report_observation(&self, _service: &str, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_observations(&self, _service: &str) -> Result<Vec<Observation>, StoreError> {
            Ok(Vec::new())
        }
        async fn insert_service(&self, _service: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert_bulk_services(&self, _services: &[String]) -> Result<(), StoreError> {
            Ok(())
        }
        async fn count_services(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn count_observations(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn get_all_service_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn get_newest_service_names(&self, _end_limit: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn get_oldest_service_names(&self, _end_limit: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// Always returns a single well-formed observation for any service,
    /// regardless of what's queried.
    struct SingleObservationStore;

    #[async_trait::async_trait]
    impl ObservationStore for SingleObservationStore {
        async fn report_observation(&self, _service: &str, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_observations(&self, _service: &str) -> Result<Vec<Observation>, StoreError> {
            Ok(vec![Observation::new(
                "00:11:22:33:44:55:66:77:88:99:aa:bb:cc:dd:ee:ff",
                100,
                200,
            )])
        }
        async fn insert_service(&self, _service: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert_bulk_services(&self, _services: &[String]) -> Result<(), StoreError> {
            Ok(())
        }
        async fn count_services(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn count_observations(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn get_all_service_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn get_newest_service_names(&self, _end_limit: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn get_oldest_service_names(&self, _end_limit: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// Same as [`SingleObservationStore`], but the observation's key isn't
    /// 16 colon-separated hex bytes, so `Signer::sign_reply` fails.
    struct MalformedKeyStore;

    #[async_trait::async_trait]
    impl ObservationStore for MalformedKeyStore {
        async fn report_observation(&self, _service: &str, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_observations(&self, _service: &str) -> Result<Vec<Observation>, StoreError> {
            Ok(vec![Observation::new("not-a-fingerprint", 100, 200)])
        }
        async fn insert_service(&self, _service: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn insert_bulk_services(&self, _services: &[String]) -> Result<(), StoreError> {
            Ok(())
        }
        async fn count_services(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn count_observations(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn get_all_service_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn get_newest_service_names(&self, _end_limit: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn get_oldest_service_names(&self, _end_limit: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// A cache that always reports itself unavailable, to exercise the
    /// degrade-to-store fallback.
    struct AlwaysFailingCache;

    #[async_trait::async_trait]
    impl Cache for AlwaysFailingCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("simulated outage".to_string()))
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("simulated outage".to_string()))
        }
    }

    fn test_state() -> AppState {
        let key = RsaPrivateKey::new(&mut OsRng, 512).unwrap();
        AppState {
            store: Arc::new(EmptyStore),
            cache: Arc::new(LruCache::new(1024 * 1024)),
            admission: Arc::new(AdmissionGate::new(10)),
            signer: Arc::new(Signer::new(key)),
            probe: Arc::new(ProbeClient::new(ProbeConfig {
                timeout_sec: 1,
                sni: false,
            })),
            metrics: Arc::new(MetricsRecorder::with_default_interval(Arc::new(LogSink))),
            cache_ttl: Duration::from_secs(60),
            public_key_pem: Arc::new("-----BEGIN PUBLIC KEY-----\ntest\n-----END PUBLIC KEY-----\n".to_string()),
            cache_only: false,
        }
    }

    #[tokio::test]
    async fn empty_query_serves_the_static_info_page() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_query_is_rejected() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/?host=example.com&port=not-a-number&service_type=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_service_returns_404_and_launches_an_on_demand_probe() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/?host=127.0.0.1&port=1&service_type=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn a_cache_outage_degrades_silently_to_the_store() {
        let mut state = test_state();
        state.store = Arc::new(SingleObservationStore);
        state.cache = Arc::new(AlwaysFailingCache);
        let app = build_router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/?host=example.com&port=443&service_type=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn a_signing_failure_returns_500() {
        let mut state = test_state();
        state.store = Arc::new(MalformedKeyStore);
        let app = build_router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/?host=example.com&port=443&service_type=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn index_html_serves_the_public_key_pem() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/index.html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
