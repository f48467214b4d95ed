//! Network notary binary: wires `ObservationStore`, `Cache`, `Signer`,
//! `ProbeClient`, `AdmissionGate`, `MetricsRecorder`, `ScannerPool`, and the
//! `notary-http` router into one running process.
//!
//! Mirrors `proxy-server/src/main.rs` and `model-server/src/main.rs`'s
//! shape: `clap` args (with `.env` support via `dotenvy`), a
//! `tracing-subscriber` `EnvFilter` setup, and an `anyhow::Result` main so a
//! fatal startup error exits 1 with a logged cause.

mod config;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::Args;
use notary_admission::AdmissionGate;
use notary_cache::{Cache, LruCache};
use notary_core::{ObservationStore, ServiceId, SqliteStore};
use notary_http::{build_router, AppState};
use notary_metrics::{LogSink, MetricsRecorder};
use notary_probe::{ProbeClient, ProbeConfig};
use notary_scanner::{ScannerConfig, ScannerPool};
use notary_signer::{load_private_key, load_public_key_pem, Signer};
use std::io::BufRead;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.thread_pool_size.max(1))
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run(args));
    if let Err(e) = &result {
        error!(error = %e, "fatal startup error");
    }
    result
}

async fn run(args: Args) -> Result<()> {
    let port = args.resolved_port()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(
        socket_queue_size = args.socket_queue_size,
        thread_pool_size = args.thread_pool_size,
        dbtype = %args.dbtype,
        "starting network notary"
    );

    let private_key =
        load_private_key(&args.private_key).context("failed to load RSA private key")?;
    let public_key_pem =
        load_public_key_pem(&args.public_key).context("failed to load RSA public key")?;
    let signer = Arc::new(Signer::new(private_key));

    if args.dbtype != "sqlite" {
        bail!(
            "--dbtype {:?} is not implemented by this build; only \"sqlite\" is available",
            args.dbtype
        );
    }
    let store: Arc<dyn ObservationStore> =
        Arc::new(SqliteStore::open(&args.dbname).context("failed to open observation store")?);

    let cache = build_cache(&args)?;
    let metrics = Arc::new(MetricsRecorder::with_default_interval(Arc::new(LogSink)));
    let probe = Arc::new(ProbeClient::new(ProbeConfig {
        timeout_sec: args.probe_timeout_sec,
        sni: args.sni,
    }));
    let admission = Arc::new(AdmissionGate::new(args.probe_limit));

    let state = AppState {
        store: store.clone(),
        cache,
        admission,
        signer,
        probe: probe.clone(),
        metrics: metrics.clone(),
        cache_ttl: args.cache_expiry,
        public_key_pem: Arc::new(public_key_pem),
        cache_only: args.cache_only,
    };
    let router = build_router(state);

    if let Some(path) = args.service_list.clone() {
        let store = store.clone();
        let probe = probe.clone();
        let metrics = metrics.clone();
        let scan_config = ScannerConfig {
            rate: args.scan_rate,
            timeout_sec: args.probe_timeout_sec,
            sni: args.sni,
        };
        let scan_interval = args.scan_interval;
        tokio::spawn(run_scan_loop(
            path,
            store,
            probe,
            metrics,
            scan_config,
            scan_interval,
        ));
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("shut down cleanly");
    Ok(())
}

/// Waits for Ctrl-C or, on Unix, SIGTERM — either triggers a graceful
/// drain of in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining");
}

/// Periodically re-reads `path` and walks the full service list. Runs for
/// the lifetime of the process; a load failure is logged and retried on
/// the next interval rather than aborting the notary.
async fn run_scan_loop(
    path: PathBuf,
    store: Arc<dyn ObservationStore>,
    probe: Arc<ProbeClient>,
    metrics: Arc<MetricsRecorder>,
    config: ScannerConfig,
    interval: Duration,
) {
    loop {
        match load_service_list(&path) {
            Ok(services) => {
                let names: Vec<String> = services.iter().map(|s| s.to_string()).collect();
                if let Err(e) = store.insert_bulk_services(&names).await {
                    warn!(error = %e, "failed to register services from service list");
                }

                let pool = ScannerPool::new(
                    config.clone(),
                    probe.clone(),
                    store.clone(),
                    metrics.clone(),
                );
                let stats = pool.scan(services).await;
                info!(
                    started = stats.started,
                    completed = stats.completed,
                    failures = stats.total_failures(),
                    "scan pass complete"
                );
            }
            Err(e) => warn!(error = %e, path = %path.display(), "failed to load service list"),
        }

        tokio::time::sleep(interval).await;
    }
}

/// Newline-separated service ids, `#`-comment lines ignored.
fn load_service_list(path: &Path) -> Result<Vec<ServiceId>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open service list {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<ServiceId>() {
            Ok(id) => out.push(id),
            Err(e) => warn!(line, error = %e, "skipping unparseable service id"),
        }
    }
    Ok(out)
}

fn build_cache(args: &Args) -> Result<Arc<dyn Cache>> {
    if args.redis {
        let url = std::env::var("REDIS_SERVERS")
            .context("--redis requires the REDIS_SERVERS environment variable")?;
        let cache = notary_cache::RedisCache::new(&url).context("failed to connect to redis")?;
        return Ok(Arc::new(cache));
    }
    if args.memcache {
        bail!(
            "--memcache is not implemented by this build (no Memcached-protocol crate in the \
             dependency stack; see DESIGN.md); use --pycache or --redis instead"
        );
    }

    let bytes = match &args.pycache {
        Some(spec) => config::parse_cache_bytes(spec)?,
        None => 64 * 1024 * 1024,
    };
    Ok(Arc::new(LruCache::new(bytes)))
}
