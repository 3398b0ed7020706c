//! Host registry
//!
//! The registry maps each monitored host to the provider identifiers needed
//! to update its record. It is built once per resolution pass and never
//! modified afterwards: a rebuild produces a new [`Registry`] that replaces
//! the old one wholesale.
//!
//! ## Invariant
//!
//! Every [`HostRecord`] carries a non-empty zone id and record id. The only
//! way to obtain one is [`HostRecord::new`], which refuses empty identifiers,
//! so hosts that fail resolution can only be left out.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// One monitored hostname and the record that serves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    host: String,
    domain: String,
    zone_id: String,
    record_id: String,
    record_type: String,
    proxied: bool,
}

impl HostRecord {
    /// Create a host record
    ///
    /// Fails with a resolution error if the zone or record id is empty.
    pub fn new(
        host: impl Into<String>,
        domain: impl Into<String>,
        zone_id: impl Into<String>,
        record_id: impl Into<String>,
        record_type: impl Into<String>,
        proxied: bool,
    ) -> Result<Self> {
        let host = host.into();
        let zone_id = zone_id.into();
        let record_id = record_id.into();

        if zone_id.trim().is_empty() {
            return Err(Error::resolution(host, "empty zone id"));
        }
        if record_id.trim().is_empty() {
            return Err(Error::resolution(host, "empty record id"));
        }

        Ok(Self {
            host,
            domain: domain.into(),
            zone_id,
            record_id,
            record_type: record_type.into(),
            proxied,
        })
    }

    /// Fully-qualified host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Registrable domain of the host
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Zone owning the record
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Record identifier
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// Record type ("A" for IPv4)
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Proxy flag, passed through on every update
    pub fn proxied(&self) -> bool {
        self.proxied
    }
}

/// Immutable host → record mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registry {
    records: BTreeMap<String, HostRecord>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hosts
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there is nothing to reconcile
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up one host
    pub fn get(&self, host: &str) -> Option<&HostRecord> {
        self.records.get(host)
    }

    /// Host names in sorted order
    pub fn host_names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Iterate over the records in host order
    pub fn iter(&self) -> impl Iterator<Item = &HostRecord> {
        self.records.values()
    }
}

impl FromIterator<HostRecord> for Registry {
    fn from_iter<I: IntoIterator<Item = HostRecord>>(iter: I) -> Self {
        let records = iter
            .into_iter()
            .map(|record| (record.host.clone(), record))
            .collect();
        Self { records }
    }
}
