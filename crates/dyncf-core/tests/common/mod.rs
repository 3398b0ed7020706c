//! Test doubles and common utilities for contract tests
//!
//! Every double is cheap to clone and clones share their state, so a test
//! can hand one copy to the reconciler and keep another to inspect calls.

#![allow(dead_code)]

use dyncf_core::config::EngineConfig;
use dyncf_core::error::{Error, Result};
use dyncf_core::traits::{DnsProvider, DnsRecord, IpSource, NewRecord, RecordUpdate, StateStore, Zone};
use dyncf_core::{EngineEvent, MemoryStateStore, Reconciler, SharedState};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// An IP source whose answer the test controls
#[derive(Clone)]
pub struct ScriptedIpSource {
    answer: Arc<Mutex<std::result::Result<IpAddr, String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(initial: IpAddr) -> Self {
        Self {
            answer: Arc::new(Mutex::new(Ok(initial))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_ip(&self, ip: IpAddr) {
        *self.answer.lock().unwrap() = Ok(ip);
    }

    /// Make every lookup fail with `message`
    pub fn fail(&self, message: &str) {
        *self.answer.lock().unwrap() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone().map_err(Error::ip_lookup)
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Call counts seen by the mock provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub list_zones: usize,
    pub list_records: usize,
    pub create: usize,
    pub update: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.list_zones + self.list_records + self.create + self.update
    }
}

#[derive(Default)]
struct ProviderState {
    zones: Vec<Zone>,
    records: Vec<(String, DnsRecord)>,
    failing_hosts: HashSet<String>,
    fail_zone_listing: bool,
    next_id: usize,
    calls: Calls,
    updates: Vec<RecordUpdate>,
    created: Vec<NewRecord>,
}

/// An in-memory DNS provider that records every call
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    inner: Arc<Mutex<ProviderState>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(self, id: &str, name: &str) -> Self {
        self.inner.lock().unwrap().zones.push(Zone {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Add an "A" record with a generated id
    pub fn with_record(self, zone_id: &str, name: &str, content: &str) -> Self {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            format!("rec-{}", inner.next_id)
        };
        self.with_record_id(zone_id, &id, name, "A", content)
    }

    pub fn with_record_id(
        self,
        zone_id: &str,
        record_id: &str,
        name: &str,
        record_type: &str,
        content: &str,
    ) -> Self {
        self.inner.lock().unwrap().records.push((
            zone_id.to_string(),
            DnsRecord {
                id: record_id.to_string(),
                name: name.to_string(),
                record_type: record_type.to_string(),
                content: content.to_string(),
                proxied: false,
            },
        ));
        self
    }

    /// Reject every update for `host` with a server error
    pub fn fail_updates_for(&self, host: &str) {
        self.inner.lock().unwrap().failing_hosts.insert(host.to_string());
    }

    pub fn fail_zone_listing(&self) {
        self.inner.lock().unwrap().fail_zone_listing = true;
    }

    /// Delete a record behind the reconciler's back
    pub fn remove_record(&self, name: &str) {
        self.inner.lock().unwrap().records.retain(|(_, r)| r.name != name);
    }

    pub fn calls(&self) -> Calls {
        self.inner.lock().unwrap().calls
    }

    pub fn reset_calls(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls = Calls::default();
        inner.updates.clear();
    }

    pub fn updates(&self) -> Vec<RecordUpdate> {
        self.inner.lock().unwrap().updates.clone()
    }

    pub fn created(&self) -> Vec<NewRecord> {
        self.inner.lock().unwrap().created.clone()
    }

    /// Current content of the record named `name`
    pub fn content_of(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(_, r)| r.content.clone())
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.list_zones += 1;
        if inner.fail_zone_listing {
            return Err(Error::auth("Invalid API token"));
        }
        Ok(inner.zones.clone())
    }

    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<DnsRecord>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.list_records += 1;
        Ok(inner
            .records
            .iter()
            .filter(|(zone, r)| zone == zone_id && r.name == name)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<DnsRecord> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.create += 1;
        inner.next_id += 1;
        let created = DnsRecord {
            id: format!("created-{}", inner.next_id),
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            content: record.content.clone(),
            proxied: record.proxied,
        };
        inner.records.push((zone_id.to_string(), created.clone()));
        inner.created.push(record.clone());
        Ok(created)
    }

    async fn update_record(&self, update: &RecordUpdate) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.update += 1;
        inner.updates.push(update.clone());

        if inner.failing_hosts.contains(&update.name) {
            return Err(Error::provider("mock", "HTTP 500 Internal Server Error"));
        }

        let record = inner
            .records
            .iter_mut()
            .find(|(zone, r)| *zone == update.zone_id && r.id == update.record_id)
            .map(|(_, r)| r);

        match record {
            Some(record) => {
                record.content = update.content.clone();
                Ok(())
            }
            None => Err(Error::record_not_found(update.name.clone())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A memory store that counts writes and flushes, and can be made to reject writes
#[derive(Clone, Default)]
pub struct CountingStateStore {
    inner: MemoryStateStore,
    sets: Arc<AtomicUsize>,
    flushes: Arc<AtomicUsize>,
    write_failure: Arc<Mutex<Option<String>>>,
}

impl CountingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Make every following `set` fail with `message`
    pub fn fail_writes(&self, message: &str) {
        *self.write_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Accept writes again
    pub fn heal(&self) {
        *self.write_failure.lock().unwrap() = None;
    }
}

#[async_trait::async_trait]
impl StateStore for CountingStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(message) = self.write_failure.lock().unwrap().clone() {
            return Err(Error::state_store(message));
        }
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// Engine settings with a short interval and no heartbeat file
pub fn test_config() -> EngineConfig {
    EngineConfig {
        interval_secs: 1,
        event_channel_capacity: 100,
        ..EngineConfig::default()
    }
}

/// Provider with zone "zone-z" for example.com holding a/b records at `content`
pub fn example_provider(content: &str) -> MockDnsProvider {
    MockDnsProvider::new()
        .with_zone("zone-z", "example.com")
        .with_record("zone-z", "a.example.com", content)
        .with_record("zone-z", "b.example.com", content)
}

pub fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}

/// A reconciler wired to test doubles, plus handles to inspect them
pub struct Harness {
    pub reconciler: Reconciler,
    pub events: mpsc::Receiver<EngineEvent>,
    pub provider: MockDnsProvider,
    pub ip_source: ScriptedIpSource,
    pub store: CountingStateStore,
    pub state: Arc<SharedState>,
}

impl Harness {
    pub async fn new(
        provider: MockDnsProvider,
        ip_source: ScriptedIpSource,
        store: CountingStateStore,
        host_names: &[&str],
        config: EngineConfig,
    ) -> Self {
        let state = Arc::new(SharedState::load(Arc::new(store.clone())).await.unwrap());
        let (reconciler, events) = Reconciler::new(
            Box::new(ip_source.clone()),
            Box::new(provider.clone()),
            Arc::clone(&state),
            hosts(host_names),
            config,
        )
        .expect("reconciler construction succeeds");

        Self {
            reconciler,
            events,
            provider,
            ip_source,
            store,
            state,
        }
    }

    /// Drain every event emitted so far
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
