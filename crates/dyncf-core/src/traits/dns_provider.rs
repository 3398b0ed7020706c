// # DNS Provider Trait
//
// Defines the narrow client interface the engine uses to talk to a DNS
// provider: list zones, find records by exact name, create a record and
// update a record.
//
// ## Implementations
//
// - Cloudflare: `dyncf-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dyncf_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zones = provider.list_zones().await?;
//     let records = provider.list_records(&zones[0].id, "home.example.com").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A provider zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Opaque zone identifier
    pub id: String,
    /// Zone apex name (e.g. "example.com")
    pub name: String,
}

/// An existing DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Opaque record identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type ("A", "AAAA", "CNAME", ...)
    pub record_type: String,
    /// Record content
    pub content: String,
    /// Whether traffic is proxied through the provider
    pub proxied: bool,
}

impl DnsRecord {
    /// Whether this record maps a name to an address
    pub fn is_address(&self) -> bool {
        matches!(self.record_type.as_str(), "A" | "AAAA")
    }
}

/// Payload for creating a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    pub record_type: String,
    /// Record content
    pub content: String,
    /// Proxy flag
    pub proxied: bool,
    /// Time-to-live in seconds
    pub ttl: u32,
}

/// Payload for updating one existing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// Zone owning the record
    pub zone_id: String,
    /// Record to update
    pub record_id: String,
    /// Record type, passed through unchanged
    pub record_type: String,
    /// Fully-qualified record name
    pub name: String,
    /// New content
    pub content: String,
    /// Proxy flag, passed through unchanged
    pub proxied: bool,
}

/// Trait for DNS provider implementations
///
/// Implementations perform exactly one remote call per method invocation and
/// never retry, sleep or cache: scheduling and retries belong to the
/// reconciliation loop, which simply tries again on the next cycle.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Errors
///
/// - [`crate::Error::Authentication`] when credentials are rejected
/// - [`crate::Error::RecordNotFound`] when an update targets a record that no
///   longer exists
/// - [`crate::Error::RateLimited`] on provider throttling
/// - [`crate::Error::Provider`] for transport failures and any response the
///   provider did not confirm as successful
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone visible to the configured credentials
    async fn list_zones(&self) -> Result<Vec<Zone>, crate::Error>;

    /// List the records in `zone_id` whose name matches `name` exactly
    ///
    /// Order is the provider's order and must be stable between calls.
    async fn list_records(&self, zone_id: &str, name: &str)
    -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record in `zone_id` and return it with its new identifier
    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewRecord,
    ) -> Result<DnsRecord, crate::Error>;

    /// Update one record
    ///
    /// Returns `Ok(())` only if the provider confirmed the change.
    async fn update_record(&self, update: &RecordUpdate) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
