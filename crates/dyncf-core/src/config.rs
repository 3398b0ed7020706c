//! Configuration types for the reconciler
//!
//! This module defines the configuration consumed by the engine. The daemon
//! fills it from environment variables; embedders can build it directly or
//! deserialize it.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Key under which the last persisted IP is stored in the state file
pub const PREVIOUS_IP_KEY: &str = "previous_ip";

/// IP seeded into the state file when no previous IP is known
pub const DEFAULT_PLACEHOLDER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 254));

/// Default IP lookup endpoint (returns `{"ip": "..."}`)
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

/// Longest accepted polling interval (one day, also the created-record TTL ceiling)
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Main reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Hostnames to keep pointed at the public IP
    pub hosts: Vec<String>,

    /// Public IP lookup configuration
    #[serde(default)]
    pub ip_lookup: IpLookupConfig,

    /// Durable state configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ReconcilerConfig {
    /// Create a configuration for the given provider and hosts with defaults
    pub fn new(provider: ProviderConfig, hosts: Vec<String>) -> Self {
        Self {
            provider,
            hosts,
            ip_lookup: IpLookupConfig::default(),
            state_store: StateStoreConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hosts.is_empty() {
            return Err(crate::Error::config("No hosts configured"));
        }

        for host in &self.hosts {
            validate_domain_name(host)?;
        }

        self.provider.validate()?;
        self.ip_lookup.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// How to authenticate against the API
        credentials: Credentials,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { credentials } => credentials.validate(),
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

/// Provider credentials
///
/// The Debug implementation never prints secret values.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    /// Scoped API token, sent as a bearer token
    ApiToken {
        /// Token value
        token: String,
    },
    /// Legacy global API key plus account email
    GlobalKey {
        /// Global API key
        key: String,
        /// Account email
        email: String,
    },
}

impl Credentials {
    /// Pick credentials from the optional token/key/email triple
    ///
    /// A token wins over a key/email pair. Returns a configuration error when
    /// neither complete form is present.
    pub fn from_parts(
        token: Option<String>,
        key: Option<String>,
        email: Option<String>,
    ) -> Result<Self, crate::Error> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(token) = non_empty(token) {
            return Ok(Credentials::ApiToken { token });
        }

        match (non_empty(key), non_empty(email)) {
            (Some(key), Some(email)) => Ok(Credentials::GlobalKey { key, email }),
            (Some(_), None) => Err(crate::Error::config(
                "CLOUDFLARE_API_KEY requires CLOUDFLARE_API_EMAIL",
            )),
            _ => Err(crate::Error::config(
                "CLOUDFLARE_API_TOKEN (or CLOUDFLARE_API_KEY and CLOUDFLARE_API_EMAIL) is required",
            )),
        }
    }

    /// Validate that no secret is empty
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            Credentials::ApiToken { token } if token.is_empty() => {
                Err(crate::Error::config("API token cannot be empty"))
            }
            Credentials::GlobalKey { key, email } if key.is_empty() || email.is_empty() => {
                Err(crate::Error::config("API key and email cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiToken { .. } => f
                .debug_struct("ApiToken")
                .field("token", &"<REDACTED>")
                .finish(),
            Credentials::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("key", &"<REDACTED>")
                .field("email", email)
                .finish(),
        }
    }
}

/// Public IP lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpLookupConfig {
    /// Endpoint returning a JSON body with an `ip` field
    #[serde(default = "default_ip_lookup_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_ip_lookup_timeout_secs")]
    pub timeout_secs: u64,
}

impl IpLookupConfig {
    /// Validate the lookup configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "IP lookup URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("IP lookup timeout must be > 0"));
        }
        Ok(())
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IpLookupConfig {
    fn default() -> Self {
        Self {
            url: default_ip_lookup_url(),
            timeout_secs: default_ip_lookup_timeout_secs(),
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// JSON key/value file
    File {
        /// Path to the state file
        path: PathBuf,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

/// How to pick a record when the provider returns several for one name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateRecordPolicy {
    /// Take the first record in provider order
    #[default]
    First,
    /// Take the record with the lexicographically lowest id
    LowestId,
    /// Drop the host from the registry
    Exclude,
}

impl std::str::FromStr for DuplicateRecordPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "lowest-id" | "lowest_id" => Ok(Self::LowestId),
            "exclude" => Ok(Self::Exclude),
            other => Err(crate::Error::config(format!(
                "Unknown duplicate record policy '{}'. Valid: first, lowest-id, exclude",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed delay between reconciliation cycles (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Extra time allowed past the interval before the service counts as unhealthy
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Create an "A" record for hosts that have none
    #[serde(default)]
    pub allow_create_hosts: bool,

    /// Tie-break for hosts with several matching records
    #[serde(default)]
    pub duplicate_policy: DuplicateRecordPolicy,

    /// Re-resolve the registry after an update reports a missing record
    #[serde(default = "default_rebuild_on_missing")]
    pub rebuild_on_missing: bool,

    /// Heartbeat file rewritten at the end of every cycle
    #[serde(default)]
    pub heartbeat_path: Option<PathBuf>,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Update interval must be > 0"));
        }
        if self.interval_secs > MAX_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Update interval must be at most {}s. Got: {}",
                MAX_INTERVAL_SECS, self.interval_secs
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Delay between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Maximum heartbeat age before the service counts as unhealthy
    pub fn staleness_limit(&self) -> Duration {
        Duration::from_secs(self.interval_secs.saturating_add(self.grace_secs))
    }

    /// TTL used for auto-created records
    ///
    /// Follows the polling interval, clamped to the range Cloudflare accepts.
    pub fn created_record_ttl(&self) -> u32 {
        self.interval_secs.clamp(60, MAX_INTERVAL_SECS) as u32
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            grace_secs: default_grace_secs(),
            allow_create_hosts: false,
            duplicate_policy: DuplicateRecordPolicy::default(),
            rebuild_on_missing: default_rebuild_on_missing(),
            heartbeat_path: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Split a comma-separated host list
///
/// Entries are trimmed and lower-cased; blanks and duplicates are dropped
/// while keeping first-seen order.
pub fn parse_host_list(raw: &str) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for host in raw.split(',') {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        if !host.is_empty() && !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

/// Parse a boolean flag the way the environment is usually written
pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Validate that a string is a valid DNS host name
///
/// Basic RFC 1035 checks: total length, label length, characters, hyphens.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // '*' is allowed as a whole wildcard label
        if label != "*" && !label.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_ip_lookup_url() -> String {
    DEFAULT_IP_LOOKUP_URL.to_string()
}

fn default_ip_lookup_timeout_secs() -> u64 {
    15
}

fn default_interval_secs() -> u64 {
    60
}

fn default_grace_secs() -> u64 {
    15
}

fn default_rebuild_on_missing() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    1000
}
