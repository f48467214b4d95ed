//! The single `GET /` request state machine.

use crate::state::AppState;
use crate::validation::{validate_query, NotaryQuery, QueryOutcome};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use notary_admission::RejectReason;
use notary_metrics::EventKind;
use tracing::warn;

const INFO_PAGE: &str = include_str!("../static/info.html");

pub async fn handle_request(
    State(state): State<AppState>,
    Query(raw_params): Query<Vec<(String, String)>>,
) -> Response {
    match validate_query(&raw_params) {
        QueryOutcome::Empty => Html(INFO_PAGE).into_response(),
        QueryOutcome::Invalid => StatusCode::BAD_REQUEST.into_response(),
        QueryOutcome::Valid(query) => handle_valid_query(state, query).await,
    }
}

pub async fn handle_index_html(State(state): State<AppState>) -> Response {
    (
        [("Content-Type", "application/x-pem-file")],
        state.public_key_pem.as_str().to_string(),
    )
        .into_response()
}

async fn handle_valid_query(state: AppState, query: NotaryQuery) -> Response {
    let service_id = notary_core::ServiceId {
        host: query.host.clone(),
        port: query.port,
        service_type: query.service_type,
    }
    .to_string();

    match state.cache.get(&service_id).await {
        Ok(Some(xml)) => {
            state.metrics.record(EventKind::CacheHit);
            return xml_response(xml);
        }
        Ok(None) => state.metrics.record(EventKind::CacheMiss),
        Err(e) => {
            // A cache outage degrades silently to the store, it never
            // fails the request.
            warn!(service = %service_id, error = %e, "cache unavailable, falling through to store");
        }
    }

    state.metrics.record(EventKind::GetObservationsForService);
    let observations = match state.store.get_observations(&service_id).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(service = %service_id, error = %e, "store unavailable");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    if !observations.is_empty() {
        let xml = match state
            .signer
            .sign_reply(&service_id, query.service_type, &observations)
        {
            Ok(xml) => xml,
            Err(e) => {
                warn!(service = %service_id, error = %e, "failed to sign reply");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        if let Err(e) = state
            .cache
            .set(&service_id, xml.clone(), state.cache_ttl)
            .await
        {
            warn!(service = %service_id, error = %e, "failed to populate cache");
        }

        return xml_response(xml);
    }

    if state.cache_only {
        return StatusCode::NOT_FOUND.into_response();
    }

    state.metrics.record(EventKind::ScanForNewService);
    match state.admission.try_admit(&service_id) {
        Ok(admission) => {
            let host = query.host;
            let port = query.port;
            let service_type = query.service_type;
            let probe = state.probe.clone();
            let store = state.store.clone();
            let metrics = state.metrics.clone();
            let service_id = service_id.clone();

            tokio::spawn(async move {
                let _admission = admission;
                metrics.record(EventKind::ServiceScanStart);
                match probe.probe(&host, port, service_type).await {
                    Ok(fingerprint) => {
                        if let Err(e) = store.report_observation(&service_id, &fingerprint).await
                        {
                            warn!(service = %service_id, error = %e, "on-demand probe succeeded but the store rejected it");
                        } else {
                            metrics.record(EventKind::ServiceScanKeyUpdated);
                        }
                    }
                    Err(e) => {
                        warn!(service = %service_id, error = %e, "on-demand probe failed");
                        metrics.record(EventKind::OnDemandServiceScanFailure);
                    }
                }
                metrics.record(EventKind::ServiceScanStop);
            });
        }
        Err(RejectReason::LimitExceeded) => {
            state.metrics.record(EventKind::ProbeLimitExceeded);
        }
        Err(RejectReason::Duplicate) => {}
    }

    StatusCode::NOT_FOUND.into_response()
}

fn xml_response(xml: String) -> Response {
    ([("Content-Type", "text/xml")], xml).into_response()
}
