// # dyncfd - Cloudflare dynamic DNS daemon
//
// Thin integration layer: reads the environment, wires the Cloudflare
// provider, the HTTP IP source and the state store into a reconciler, and
// serves the status endpoints next to it. All reconciliation logic lives in
// dyncf-core.
//
// ## Configuration
//
// ### Cloudflare
// - `CLOUDFLARE_API_TOKEN`: scoped API token (preferred)
// - `CLOUDFLARE_API_KEY` + `CLOUDFLARE_API_EMAIL`: legacy global key
//
// ### Hosts
// - `HOST_LIST`: comma-separated hostnames to keep updated
// - `ALLOW_CREATE_HOSTS`: create missing A records (true/yes/1)
// - `DYNCF_DUPLICATE_POLICY`: first, lowest-id or exclude
//
// ### Loop
// - `UPDATE_INTERVAL`: seconds between checks (default 60)
// - `IP_LOOKUP_URL`: public IP service (default api.ipify.org)
//
// ### Files and ports
// - `DYNCF_STATE_PATH`: persisted state (default /app/logs/config.json)
// - `DYNCF_HEARTBEAT_PATH`: heartbeat file (default /tmp/dyncfdns_health.json)
// - `API_PORT`: status server port, 0 disables (default 8080)
// - `DYNCF_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=your_token
// export HOST_LIST=home.example.com,vpn.example.com
// dyncfd
//
// # container health probe
// dyncfd healthcheck
// ```

mod config;
mod status;

use anyhow::{Context, Result};
use chrono::Utc;
use config::{DaemonConfig, ProbeConfig, parse_log_level};
use dyncf_core::config::{ProviderConfig, StateStoreConfig};
use dyncf_core::{
    EngineEvent, FileStateStore, HeartbeatFile, MemoryStateStore, Reconciler, SharedState,
    StateStore,
};
use dyncf_ip_http::HttpIpSource;
use dyncf_provider_cloudflare::CloudflareProvider;
use status::StatusState;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes
///
/// - 0: clean shutdown, or a healthy probe
/// - 1: configuration or startup failure, or an unhealthy probe
/// - 2: unexpected runtime failure
#[derive(Debug, Clone, Copy)]
enum DyncfExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DyncfExitCode> for ExitCode {
    fn from(code: DyncfExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    match env::args().nth(1).as_deref() {
        None => {}
        Some("healthcheck") => return healthcheck(),
        Some(other) => {
            eprintln!("Unknown argument '{}'. Usage: dyncfd [healthcheck]", other);
            return DyncfExitCode::ConfigError.into();
        }
    }

    let log_level = match parse_log_level(env::var("DYNCF_LOG_LEVEL").ok()) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DyncfExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyncfExitCode::ConfigError.into();
    }

    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DyncfExitCode::ConfigError.into();
        }
    };

    info!("Starting dyncfd");
    info!(
        "Configuration loaded: {} host(s), interval {}s",
        config.reconciler.hosts.len(),
        config.reconciler.engine.interval_secs
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyncfExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Probe the heartbeat file and exit 0 (fresh) or 1 (stale or missing)
fn healthcheck() -> ExitCode {
    let probe = ProbeConfig::from_env();
    let heartbeat = HeartbeatFile::new(&probe.heartbeat_path);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return DyncfExitCode::ConfigError.into();
        }
    };

    let health = rt.block_on(heartbeat.check(probe.staleness_limit, Utc::now()));
    println!("{}", health);

    if health.is_active() {
        DyncfExitCode::CleanShutdown.into()
    } else {
        DyncfExitCode::ConfigError.into()
    }
}

async fn run_daemon(config: DaemonConfig) -> DyncfExitCode {
    let (reconciler, events) = match build_reconciler(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return DyncfExitCode::ConfigError;
        }
    };

    let event_logger = tokio::spawn(log_events(events));

    let server = config.api_port.map(|port| {
        spawn_status_server(
            port,
            StatusState {
                state: reconciler.state(),
                staleness_limit: config.reconciler.engine.staleness_limit(),
            },
        )
    });

    let code = match reconciler.run().await {
        Ok(()) => {
            info!("dyncfd stopped");
            DyncfExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Reconciler error: {}", e);
            DyncfExitCode::RuntimeError
        }
    };

    if let Some(server) = server {
        server.abort();
    }
    drop(reconciler);
    let _ = event_logger.await;

    code
}

/// Create the state store, provider and IP source, then resolve the hosts
async fn build_reconciler(
    config: &DaemonConfig,
) -> Result<(Reconciler, mpsc::Receiver<EngineEvent>)> {
    let reconciler_config = &config.reconciler;

    let store: Arc<dyn StateStore> = match &reconciler_config.state_store {
        StateStoreConfig::File { path } => Arc::new(
            FileStateStore::new(path)
                .await
                .with_context(|| format!("Failed to open state file {}", path.display()))?,
        ),
        StateStoreConfig::Memory => Arc::new(MemoryStateStore::new()),
    };
    let state = Arc::new(SharedState::load(store).await?);

    let ProviderConfig::Cloudflare { credentials } = &reconciler_config.provider;
    let provider = CloudflareProvider::new(credentials.clone())?;
    let ip_source = HttpIpSource::new(&reconciler_config.ip_lookup)?;

    let (reconciler, events) = Reconciler::new(
        Box::new(ip_source),
        Box::new(provider),
        state,
        reconciler_config.hosts.clone(),
        reconciler_config.engine.clone(),
    )?;

    reconciler.bootstrap().await?;
    Ok((reconciler, events))
}

fn spawn_status_server(port: u16, state: StatusState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Status server disabled, cannot bind port {}: {}", port, e);
                return;
            }
        };

        info!("Status server listening on port {}", port);
        if let Err(e) = axum::serve(listener, status::router(state)).await {
            warn!("Status server stopped: {}", e);
        }
    })
}

async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::IpChanged { previous, current } => match previous {
                Some(previous) => info!("Public IP changed: {} -> {}", previous, current),
                None => info!("Public IP detected: {}", current),
            },
            EngineEvent::RegistryRebuilt { hosts } => {
                info!("Registry rebuilt with {} host(s)", hosts)
            }
            EngineEvent::CycleCompleted { cycle, outcome } if !outcome.is_success() => {
                warn!("Cycle {} did not complete cleanly: {:?}", cycle, outcome)
            }
            other => debug!("Engine event: {:?}", other),
        }
    }
}
