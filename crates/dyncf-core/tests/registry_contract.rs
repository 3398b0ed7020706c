//! Contract Test: Registry Construction
//!
//! Constraints verified:
//! - Registry entries always carry a non-empty zone id and record id
//! - Hosts that cannot be resolved are excluded, never stored half-filled
//! - Zones are listed once per resolution pass
//! - Auto-creation only happens when enabled, with the placeholder IP
//! - An empty registry after the startup build is fatal

mod common;

use common::*;
use dyncf_core::config::{DEFAULT_PLACEHOLDER_IP, DuplicateRecordPolicy};

#[tokio::test]
async fn registry_never_holds_empty_identifiers() {
    let provider = MockDnsProvider::new()
        .with_zone("zone-z", "example.com")
        .with_zone("", "broken.org")
        .with_record("zone-z", "a.example.com", "1.1.1.1")
        .with_record_id("zone-z", "", "b.example.com", "A", "1.1.1.1")
        .with_record("", "c.broken.org", "1.1.1.1");

    let h = Harness::new(
        provider,
        ScriptedIpSource::new(ip("1.1.1.1")),
        CountingStateStore::new(),
        &["a.example.com", "b.example.com", "c.broken.org", "d.nowhere.net"],
        test_config(),
    )
    .await;

    h.reconciler.bootstrap().await.unwrap();
    let registry = h.state.registry();

    assert_eq!(registry.host_names(), vec!["a.example.com"]);
    for record in registry.iter() {
        assert!(!record.zone_id().is_empty());
        assert!(!record.record_id().is_empty());
    }
}

#[tokio::test]
async fn zones_are_listed_once() {
    let provider = example_provider("1.1.1.1").with_zone("zone-o", "other.org");

    let h = Harness::new(
        provider,
        ScriptedIpSource::new(ip("1.1.1.1")),
        CountingStateStore::new(),
        &["a.example.com", "b.example.com", "home.other.org"],
        test_config(),
    )
    .await;

    h.reconciler.bootstrap().await.unwrap();

    let calls = h.provider.calls();
    assert_eq!(calls.list_zones, 1, "zone list fetched once for all hosts");
    assert_eq!(calls.list_records, 3);
    assert_eq!(calls.update, 0, "resolution never modifies records");
}

#[tokio::test]
async fn host_without_record_is_excluded_when_creation_disabled() {
    let h = Harness::new(
        example_provider("1.1.1.1"),
        ScriptedIpSource::new(ip("1.1.1.1")),
        CountingStateStore::new(),
        &["a.example.com", "b.example.com", "new.example.com"],
        test_config(),
    )
    .await;

    let count = h.reconciler.bootstrap().await.unwrap();

    assert_eq!(count, 2);
    assert!(h.state.registry().get("new.example.com").is_none());
    assert_eq!(h.provider.calls().create, 0);
}

#[tokio::test]
async fn host_without_record_is_created_when_enabled() {
    let mut config = test_config();
    config.allow_create_hosts = true;
    config.interval_secs = 300;

    let h = Harness::new(
        example_provider("1.1.1.1"),
        ScriptedIpSource::new(ip("1.1.1.1")),
        CountingStateStore::new(),
        &["a.example.com", "new.example.com"],
        config,
    )
    .await;

    h.reconciler.bootstrap().await.unwrap();

    let created = h.provider.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "new.example.com");
    assert_eq!(created[0].record_type, "A");
    assert_eq!(created[0].content, DEFAULT_PLACEHOLDER_IP.to_string());
    assert!(!created[0].proxied);
    assert_eq!(created[0].ttl, 300);

    let record = h.state.registry().get("new.example.com").cloned().unwrap();
    assert!(record.record_id().starts_with("created-"));
    assert_eq!(record.zone_id(), "zone-z");
}

#[tokio::test]
async fn non_address_records_are_ignored() {
    let provider = MockDnsProvider::new()
        .with_zone("zone-z", "example.com")
        .with_record("zone-z", "a.example.com", "1.1.1.1")
        .with_record_id("zone-z", "txt-1", "b.example.com", "TXT", "hello");

    let h = Harness::new(
        provider,
        ScriptedIpSource::new(ip("1.1.1.1")),
        CountingStateStore::new(),
        &["a.example.com", "b.example.com"],
        test_config(),
    )
    .await;

    h.reconciler.bootstrap().await.unwrap();
    assert_eq!(h.state.registry().host_names(), vec!["a.example.com"]);
}

async fn resolve_duplicates(policy: DuplicateRecordPolicy) -> Option<String> {
    let provider = MockDnsProvider::new()
        .with_zone("zone-z", "example.com")
        .with_record("zone-z", "a.example.com", "1.1.1.1")
        .with_record_id("zone-z", "rec-zz", "dup.example.com", "A", "1.1.1.1")
        .with_record_id("zone-z", "rec-aa", "dup.example.com", "A", "1.1.1.1");

    let mut config = test_config();
    config.duplicate_policy = policy;

    let h = Harness::new(
        provider,
        ScriptedIpSource::new(ip("1.1.1.1")),
        CountingStateStore::new(),
        &["a.example.com", "dup.example.com"],
        config,
    )
    .await;

    h.reconciler.bootstrap().await.unwrap();
    h.state
        .registry()
        .get("dup.example.com")
        .map(|r| r.record_id().to_string())
}

#[tokio::test]
async fn duplicate_records_follow_policy() {
    assert_eq!(
        resolve_duplicates(DuplicateRecordPolicy::First).await.as_deref(),
        Some("rec-zz")
    );
    assert_eq!(
        resolve_duplicates(DuplicateRecordPolicy::LowestId).await.as_deref(),
        Some("rec-aa")
    );
    assert_eq!(resolve_duplicates(DuplicateRecordPolicy::Exclude).await, None);
}

#[tokio::test]
async fn empty_registry_is_fatal() {
    let provider = example_provider("1.1.1.1");
    provider.fail_zone_listing();

    let h = Harness::new(
        provider,
        ScriptedIpSource::new(ip("1.1.1.1")),
        CountingStateStore::new(),
        &["a.example.com", "b.example.com"],
        test_config(),
    )
    .await;

    let err = h.reconciler.bootstrap().await.unwrap_err();
    assert!(err.is_fatal(), "empty registry must stop startup: {}", err);
    assert!(h.state.registry().is_empty());
}
