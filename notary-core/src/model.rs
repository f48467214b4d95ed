//! The notary's data model: services, service types, and observations.

use crate::error::ServiceIdError;
use std::fmt;
use std::str::FromStr;

/// The default maximum gap, in seconds, across which a fresh sighting may
/// retroactively extend a prior observation's `end`, or an existing
/// observation may be extended rather than superseded by a new span.
///
/// 48 hours, chosen to tolerate scan jitter without asserting continuity
/// through a multi-day outage.
pub const DEFAULT_UPDATE_LIMIT_SECS: i64 = 48 * 3600;

/// The kind of service a notary observes.
///
/// Wire representation is the single ASCII digit used in both the
/// `service_id` string (`host:port,type`) and historically in
/// `notary_common.SSL_TYPE`/`SSH_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Ssh = 1,
    Tls = 2,
}

impl ServiceType {
    pub fn as_wire_char(self) -> char {
        match self {
            ServiceType::Ssh => '1',
            ServiceType::Tls => '2',
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_char())
    }
}

impl FromStr for ServiceType {
    type Err = ServiceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(ServiceType::Ssh),
            "2" => Ok(ServiceType::Tls),
            other => Err(ServiceIdError::UnknownType(other.to_string())),
        }
    }
}

/// A service identity: `host:port,type`.
///
/// Services are unique, created lazily on first observation, and are never
/// deleted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub host: String,
    pub port: u16,
    pub service_type: ServiceType,
}

impl ServiceId {
    pub fn new(host: impl Into<String>, port: u16, service_type: ServiceType) -> Self {
        Self {
            host: host.into(),
            port,
            service_type,
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.host, self.port, self.service_type)
    }
}

impl FromStr for ServiceId {
    type Err = ServiceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host_port, ty) = s.rsplit_once(',').ok_or(ServiceIdError::MissingType)?;
        let service_type: ServiceType = ty.parse()?;

        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or(ServiceIdError::MissingPort)?;

        if host.is_empty() {
            return Err(ServiceIdError::EmptyHost);
        }

        let port: u16 = port
            .parse()
            .map_err(|_| ServiceIdError::InvalidPort(port.to_string()))?;

        Ok(ServiceId::new(host, port, service_type))
    }
}

/// A single `(service, key, start, end)` record: the notary witnessed `key`
/// at `service` continuously throughout `[start, end]` (Unix seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub key: String,
    pub start: i64,
    pub end: i64,
}

impl Observation {
    pub fn new(key: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            key: key.into(),
            start,
            end,
        }
    }
}
