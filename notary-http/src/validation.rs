//! Request validation: `service_type ∈ {1,2}`, `host`
//! non-empty and hostname/IP-shaped, `port ∈ [1,65535]`.

use notary_core::ServiceType;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryQuery {
    pub host: String,
    pub port: u16,
    pub service_type: ServiceType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// No query parameters at all; the caller should serve the static
    /// informational page.
    Empty,
    Valid(NotaryQuery),
    Invalid,
}

/// A conservative hostname/IPv4/IPv6-literal sanity check. This is not a
/// full DNS-name grammar validator; it only rejects obviously malformed
/// input before it reaches the probe layer.
static HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.:\-]*[A-Za-z0-9])?$").unwrap());

const ALLOWED_PARAMS: &[&str] = &["host", "port", "service_type"];

pub fn validate_query(params: &[(String, String)]) -> QueryOutcome {
    if params.is_empty() {
        return QueryOutcome::Empty;
    }

    for (key, _) in params {
        if !ALLOWED_PARAMS.contains(&key.as_str()) {
            return QueryOutcome::Invalid;
        }
    }

    let get = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let (Some(host), Some(port_raw), Some(type_raw)) =
        (get("host"), get("port"), get("service_type"))
    else {
        return QueryOutcome::Invalid;
    };

    if host.is_empty() || !HOST_RE.is_match(host) {
        return QueryOutcome::Invalid;
    }

    let Ok(port) = port_raw.parse::<u16>() else {
        return QueryOutcome::Invalid;
    };
    if port == 0 {
        return QueryOutcome::Invalid;
    }

    let service_type = match type_raw {
        "1" => ServiceType::Ssh,
        "2" => ServiceType::Tls,
        _ => return QueryOutcome::Invalid,
    };

    QueryOutcome::Valid(NotaryQuery {
        host: host.to_string(),
        port,
        service_type,
    })
}
