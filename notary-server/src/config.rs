//! CLI surface for the notary binary, mirroring the `clap`-derive +
//! `env`-fallback shape seen in `proxy-server/src/main.rs`'s `Args`
//! struct, generalized to the notary's flag set.

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// `notary --webport P | --envport`, plus `--sni`, pool/queue sizing, cache
/// selection, and database-selection flags. Exactly one of
/// `--webport`/`--envport` and at most one of `--pycache`/`--memcache`/
/// `--redis` may be given; `clap::ArgGroup` enforces both.
#[derive(Parser, Debug)]
#[command(name = "notary", about = "Network Notary: attests to the history of keys observed for Internet services")]
#[command(group(ArgGroup::new("port_source").args(["webport", "envport"]).required(true)))]
#[command(group(ArgGroup::new("cache_backend").args(["pycache", "memcache", "redis"])))]
pub struct Args {
    /// Bind to this TCP port.
    #[arg(long)]
    pub webport: Option<u16>,

    /// Bind to the port named by the `PORT` environment variable.
    #[arg(long)]
    pub envport: bool,

    /// Send an SNI extension in TLS probes (falls back to no-SNI on a TLS
    /// alert regardless).
    #[arg(long)]
    pub sni: bool,

    /// Listener backlog size. Logged at startup; the OS-level socket
    /// backlog tuning this names is not independently exercised by the
    /// async runtime's listener (see DESIGN.md).
    #[arg(long, default_value_t = 128)]
    pub socket_queue_size: u32,

    /// Number of OS threads in the notary's tokio runtime.
    #[arg(long, default_value_t = 10)]
    pub thread_pool_size: usize,

    /// TTL for cached signed replies, e.g. `10m`, `1h30m`.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10m")]
    pub cache_expiry: Duration,

    /// In-process LRU cache capacity, e.g. `64M`, `1G`.
    #[arg(long)]
    pub pycache: Option<String>,

    /// Use a Memcached-compatible cache backend (not implemented by this
    /// build; see DESIGN.md for why).
    #[arg(long)]
    pub memcache: bool,

    /// Use a Redis-compatible cache backend. Requires `REDIS_SERVERS`.
    #[arg(long)]
    pub redis: bool,

    /// Never launch an on-demand probe on a store miss; serve from
    /// cache/store only and return 404 otherwise.
    #[arg(long)]
    pub cache_only: bool,

    /// Database backend. Only `sqlite` is implemented by this build.
    #[arg(long, default_value = "sqlite")]
    pub dbtype: String,

    /// Path to the SQLite database file.
    #[arg(long, env = "DATABASE_URL", default_value = "notary.db")]
    pub dbname: String,

    /// Reserved for remote database backends (unused by the `sqlite`
    /// backend this build ships).
    #[arg(long)]
    pub dbhost: Option<String>,

    /// Reserved for remote database backends (unused by the `sqlite`
    /// backend this build ships).
    #[arg(long)]
    pub dbuser: Option<String>,

    /// Path to the RSA private signing key (PEM, PKCS#1 or PKCS#8).
    #[arg(long, env = "NOTARY_PRIVATE_KEY")]
    pub private_key: String,

    /// Path to the matching RSA public key, published verbatim at
    /// `/index.html`.
    #[arg(long, env = "NOTARY_PUBLIC_KEY")]
    pub public_key: String,

    /// Maximum concurrent on-demand probes (`PROBE_LIMIT`).
    #[arg(long, default_value_t = 10)]
    pub probe_limit: usize,

    /// Wall-clock timeout for a single probe.
    #[arg(long, default_value_t = 10)]
    pub probe_timeout_sec: u64,

    /// Newline-separated service-id file to drive the bulk scanner.
    /// If omitted, only on-demand probing runs.
    #[arg(long)]
    pub service_list: Option<PathBuf>,

    /// How often to re-walk the full service list.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1h")]
    pub scan_interval: Duration,

    /// Probes launched per pacing tick during a bulk scan.
    #[arg(long, default_value_t = 10)]
    pub scan_rate: usize,
}

impl Args {
    /// Resolve the TCP port to bind from `--webport` or the `PORT` env var
    /// (`--envport`).
    pub fn resolved_port(&self) -> Result<u16> {
        if let Some(p) = self.webport {
            return Ok(p);
        }
        let raw = std::env::var("PORT").context("--envport given but PORT is not set")?;
        raw.parse::<u16>()
            .with_context(|| format!("PORT={raw:?} is not a valid port number"))
    }
}

/// Parse a `SIZE[M|G]` cache-capacity string (`--pycache`) into a byte
/// count.
pub fn parse_cache_bytes(spec: &str) -> Result<usize> {
    let spec = spec.trim();
    if spec.is_empty() {
        bail!("empty cache size");
    }
    let (digits, multiplier) = match spec.chars().last() {
        Some('M') | Some('m') => (&spec[..spec.len() - 1], 1024 * 1024),
        Some('G') | Some('g') => (&spec[..spec.len() - 1], 1024 * 1024 * 1024),
        _ => (spec, 1),
    };
    let count: usize = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid cache size {spec:?}"))?;
    Ok(count * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_megabyte_cache_sizes() {
        assert_eq!(parse_cache_bytes("64M").unwrap(), 64 * 1024 * 1024);
    }

    #[test]
    fn parses_gigabyte_cache_sizes() {
        assert_eq!(parse_cache_bytes("1G").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn parses_bare_byte_counts() {
        assert_eq!(parse_cache_bytes("1024").unwrap(), 1024);
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert!(parse_cache_bytes("not-a-size").is_err());
    }
}
