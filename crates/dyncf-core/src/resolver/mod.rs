//! Zone/record resolution
//!
//! Turns the configured host list into a [`Registry`]:
//!
//! 1. Derive each host's registrable domain from the public suffix list
//! 2. List the provider's zones once and keep those named after a wanted domain
//! 3. For every host whose domain has a zone, look up the record by exact name
//! 4. Optionally create an "A" record for hosts that have none
//!
//! A host that cannot be resolved is logged and left out. Nothing here
//! aborts resolution of the other hosts, and no existing record content is
//! modified.

use crate::config::{DuplicateRecordPolicy, EngineConfig};
use crate::error::{Error, Result};
use crate::registry::{HostRecord, Registry};
use crate::traits::{DnsProvider, DnsRecord, NewRecord};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use tracing::{Instrument, debug, info, info_span, warn};

/// Registrable domain of a host (public suffix plus one label)
///
/// `"home.example.co.uk"` → `"example.co.uk"`. Returns `None` for names that
/// are themselves a public suffix or otherwise have no registrable part.
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    psl::domain_str(&host).map(str::to_string)
}

/// Knobs that shape resolution
#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    /// Create an "A" record for hosts that have none
    pub allow_create_hosts: bool,
    /// Tie-break for hosts with several records
    pub duplicate_policy: DuplicateRecordPolicy,
    /// TTL for created records
    pub created_record_ttl: u32,
}

impl From<&EngineConfig> for ResolverOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            allow_create_hosts: config.allow_create_hosts,
            duplicate_policy: config.duplicate_policy,
            created_record_ttl: config.created_record_ttl(),
        }
    }
}

/// Resolves hosts against one provider
pub struct Resolver<'a> {
    provider: &'a dyn DnsProvider,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    /// Create a resolver
    pub fn new(provider: &'a dyn DnsProvider, options: ResolverOptions) -> Self {
        Self { provider, options }
    }

    /// Build the registry for `hosts`
    ///
    /// `placeholder_ip` is the content given to records created for hosts
    /// that have none; the first cycle that sees a different public IP
    /// overwrites it.
    pub async fn build_registry(&self, hosts: &[String], placeholder_ip: IpAddr) -> Registry {
        self.build_registry_inner(hosts, placeholder_ip)
            .instrument(info_span!("resolve", hosts = hosts.len()))
            .await
    }

    async fn build_registry_inner(&self, hosts: &[String], placeholder_ip: IpAddr) -> Registry {
        let mut by_domain: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for host in hosts {
            match registrable_domain(host) {
                Some(domain) => by_domain.entry(domain).or_default().push(host.as_str()),
                None => warn!("Cannot derive a registrable domain for host {}, skipping", host),
            }
        }

        let zones = match self.provider.list_zones().await {
            Ok(zones) => zones,
            Err(e) => {
                warn!(
                    "Error fetching zones from {}: {}. Check the API credentials and permissions.",
                    self.provider.provider_name(),
                    e
                );
                return Registry::new();
            }
        };

        if zones.is_empty() {
            warn!("No zones found in the provided account");
        }

        let zone_ids: HashMap<String, String> = zones
            .into_iter()
            .filter(|zone| by_domain.contains_key(&zone.name))
            .map(|zone| (zone.name, zone.id))
            .collect();

        if zone_ids.is_empty() {
            warn!("No matching zones found for the provided host list");
        }

        let mut records = Vec::new();
        for (domain, domain_hosts) in &by_domain {
            let Some(zone_id) = zone_ids.get(domain) else {
                for host in domain_hosts {
                    warn!("Domain {} not found in provider zones for host {}", domain, host);
                }
                continue;
            };

            for host in domain_hosts {
                match self.resolve_host(host, domain, zone_id, placeholder_ip).await {
                    Ok(record) => {
                        debug!(
                            "Resolved {} -> zone {} record {} ({})",
                            host,
                            record.zone_id(),
                            record.record_id(),
                            record.record_type()
                        );
                        records.push(record);
                    }
                    Err(Error::RecordNotFound(_)) => {
                        warn!(
                            "No DNS record found for {} in zone {}. Enable ALLOW_CREATE_HOSTS to create it.",
                            host, zone_id
                        );
                    }
                    Err(e) => {
                        warn!("Excluding host {}: {}", host, e);
                    }
                }
            }
        }

        let registry: Registry = records.into_iter().collect();
        info!("Resolved {} of {} host(s)", registry.len(), hosts.len());
        registry
    }

    /// Resolve one host whose zone is known
    async fn resolve_host(
        &self,
        host: &str,
        domain: &str,
        zone_id: &str,
        placeholder_ip: IpAddr,
    ) -> Result<HostRecord> {
        let candidates: Vec<DnsRecord> = self
            .provider
            .list_records(zone_id, host)
            .await
            .map_err(|e| Error::resolution(host, e.to_string()))?
            .into_iter()
            .filter(DnsRecord::is_address)
            .collect();

        let record = match candidates.len() {
            0 if self.options.allow_create_hosts => {
                self.create_record(host, zone_id, placeholder_ip).await?
            }
            0 => return Err(Error::record_not_found(host)),
            1 => candidates.into_iter().next().ok_or_else(|| Error::record_not_found(host))?,
            n => self.pick_duplicate(host, zone_id, n, candidates)?,
        };

        HostRecord::new(
            host,
            domain,
            zone_id,
            record.id,
            record.record_type,
            record.proxied,
        )
    }

    async fn create_record(
        &self,
        host: &str,
        zone_id: &str,
        placeholder_ip: IpAddr,
    ) -> Result<DnsRecord> {
        let record_type = match placeholder_ip {
            IpAddr::V4(_) => "A",
            IpAddr::V6(_) => "AAAA",
        };
        let new_record = NewRecord {
            name: host.to_string(),
            record_type: record_type.to_string(),
            content: placeholder_ip.to_string(),
            proxied: false,
            ttl: self.options.created_record_ttl,
        };

        let created = self
            .provider
            .create_record(zone_id, &new_record)
            .await
            .map_err(|e| Error::resolution(host, format!("record creation failed: {}", e)))?;

        info!("Created new DNS record for {} in zone {}", host, zone_id);
        Ok(DnsRecord {
            id: created.id,
            name: new_record.name,
            record_type: new_record.record_type,
            content: new_record.content,
            proxied: new_record.proxied,
        })
    }

    fn pick_duplicate(
        &self,
        host: &str,
        zone_id: &str,
        count: usize,
        mut candidates: Vec<DnsRecord>,
    ) -> Result<DnsRecord> {
        match self.options.duplicate_policy {
            DuplicateRecordPolicy::First => {
                warn!(
                    "Multiple DNS records ({}) found for {} in zone {}. Using the first one.",
                    count, host, zone_id
                );
            }
            DuplicateRecordPolicy::LowestId => {
                warn!(
                    "Multiple DNS records ({}) found for {} in zone {}. Using the lowest id.",
                    count, host, zone_id
                );
                candidates.sort_by(|a, b| a.id.cmp(&b.id));
            }
            DuplicateRecordPolicy::Exclude => {
                return Err(Error::resolution(
                    host,
                    format!("{} matching records in zone {}, ambiguous", count, zone_id),
                ));
            }
        }

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::record_not_found(host))
    }
}
