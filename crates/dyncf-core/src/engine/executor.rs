//! Update executor
//!
//! Pushes a new IP to every record in a registry, one update call per host,
//! in host order. A failing host is logged and recorded; it never stops the
//! remaining updates, and nothing already applied is rolled back.

use crate::registry::Registry;
use crate::traits::{DnsProvider, RecordUpdate};
use std::net::IpAddr;
use tracing::{error, info};

/// A single failed record update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpdate {
    pub host: String,
    pub error: String,
    /// The provider no longer has the record
    pub missing: bool,
}

/// Result of pushing one IP to a registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub updated: Vec<String>,
    pub failed: Vec<FailedUpdate>,
}

impl UpdateReport {
    /// Every record update was confirmed by the provider
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_hosts(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.host.clone()).collect()
    }

    /// Hosts whose record disappeared at the provider
    pub fn missing_records(&self) -> Vec<String> {
        self.failed
            .iter()
            .filter(|f| f.missing)
            .map(|f| f.host.clone())
            .collect()
    }
}

/// Update every record in `registry` to `ip`
pub async fn apply_ip(provider: &dyn DnsProvider, registry: &Registry, ip: IpAddr) -> UpdateReport {
    let mut report = UpdateReport::default();

    for record in registry.iter() {
        let update = RecordUpdate {
            zone_id: record.zone_id().to_string(),
            record_id: record.record_id().to_string(),
            record_type: record.record_type().to_string(),
            name: record.host().to_string(),
            content: ip.to_string(),
            proxied: record.proxied(),
        };

        match provider.update_record(&update).await {
            Ok(()) => {
                info!("Updated {} -> {}", record.host(), ip);
                report.updated.push(record.host().to_string());
            }
            Err(e) => {
                error!("Failed to update {}: {}", record.host(), e);
                report.failed.push(FailedUpdate {
                    host: record.host().to_string(),
                    error: e.to_string(),
                    missing: e.is_not_found(),
                });
            }
        }
    }

    report
}
