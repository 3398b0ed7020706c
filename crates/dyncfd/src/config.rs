// Environment configuration for the daemon
//
// Everything is read through a lookup function so tests can feed a map
// instead of touching the process environment.

use anyhow::{Context, Result, bail};
use dyncf_core::config::{
    Credentials, DEFAULT_IP_LOOKUP_URL, DuplicateRecordPolicy, EngineConfig, IpLookupConfig,
    MAX_INTERVAL_SECS, ProviderConfig, ReconcilerConfig, StateStoreConfig, parse_flag, parse_host_list,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, warn};

pub const DEFAULT_STATE_PATH: &str = "/app/logs/config.json";
pub const DEFAULT_HEARTBEAT_PATH: &str = "/tmp/dyncfdns_health.json";
pub const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Daemon configuration
#[derive(Debug)]
pub struct DaemonConfig {
    pub reconciler: ReconcilerConfig,
    /// Status server port, `None` when disabled
    pub api_port: Option<u16>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::from_parts(
            get("CLOUDFLARE_API_TOKEN"),
            get("CLOUDFLARE_API_KEY"),
            get("CLOUDFLARE_API_EMAIL"),
        )?;

        let hosts = parse_host_list(&get("HOST_LIST").unwrap_or_default());
        if hosts.is_empty() {
            bail!(
                "HOST_LIST must contain at least one host. \
                Set it via: export HOST_LIST=home.example.com,vpn.example.com"
            );
        }

        let duplicate_policy = match get("DYNCF_DUPLICATE_POLICY") {
            Some(raw) if !raw.trim().is_empty() => raw.parse::<DuplicateRecordPolicy>()?,
            _ => DuplicateRecordPolicy::default(),
        };

        let api_port = match get("API_PORT") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("API_PORT must be a port number (0 disables). Got: {}", raw))?,
            _ => DEFAULT_API_PORT,
        };

        let mut reconciler = ReconcilerConfig::new(ProviderConfig::Cloudflare { credentials }, hosts);
        reconciler.ip_lookup = IpLookupConfig {
            url: non_empty(get("IP_LOOKUP_URL")).unwrap_or_else(|| DEFAULT_IP_LOOKUP_URL.to_string()),
            ..IpLookupConfig::default()
        };
        reconciler.state_store = StateStoreConfig::File {
            path: PathBuf::from(
                non_empty(get("DYNCF_STATE_PATH")).unwrap_or_else(|| DEFAULT_STATE_PATH.to_string()),
            ),
        };
        reconciler.engine = EngineConfig {
            interval_secs: parse_interval(get("UPDATE_INTERVAL")),
            allow_create_hosts: get("ALLOW_CREATE_HOSTS").is_some_and(|v| parse_flag(&v)),
            duplicate_policy,
            heartbeat_path: Some(heartbeat_path(&get)),
            ..EngineConfig::default()
        };

        reconciler.validate()?;

        Ok(Self {
            reconciler,
            api_port: (api_port != 0).then_some(api_port),
        })
    }
}

/// What the health probe needs: where the heartbeat lives and how old it may get
#[derive(Debug)]
pub struct ProbeConfig {
    pub heartbeat_path: PathBuf,
    pub staleness_limit: Duration,
}

impl ProbeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = EngineConfig {
            interval_secs: parse_interval(get("UPDATE_INTERVAL")),
            ..EngineConfig::default()
        };
        Self {
            heartbeat_path: heartbeat_path(&get),
            staleness_limit: engine.staleness_limit(),
        }
    }
}

/// Parse `UPDATE_INTERVAL`; anything unusable falls back to the default
pub fn parse_interval(raw: Option<String>) -> u64 {
    let Some(raw) = non_empty(raw) else {
        return DEFAULT_INTERVAL_SECS;
    };

    match raw.trim().parse::<u64>() {
        Ok(secs) if (1..=MAX_INTERVAL_SECS).contains(&secs) => secs,
        _ => {
            warn!(
                "Invalid UPDATE_INTERVAL '{}' (expected 1-{}), using default of {}s",
                raw, MAX_INTERVAL_SECS, DEFAULT_INTERVAL_SECS
            );
            DEFAULT_INTERVAL_SECS
        }
    }
}

/// Parse `DYNCF_LOG_LEVEL` (default info)
pub fn parse_log_level(raw: Option<String>) -> Result<Level> {
    let raw = non_empty(raw).unwrap_or_else(|| "info".to_string());
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "DYNCF_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

fn heartbeat_path<F: Fn(&str) -> Option<String>>(get: &F) -> PathBuf {
    PathBuf::from(non_empty(get("DYNCF_HEARTBEAT_PATH")).unwrap_or_else(|| DEFAULT_HEARTBEAT_PATH.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
