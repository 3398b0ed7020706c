//! Contract Test: Failure Handling
//!
//! Constraints verified:
//! - A failed IP lookup still records the check time and makes no provider calls
//! - A partial update failure keeps the old IP and last-update time
//! - Failed hosts are retried on the next cycle
//! - A record deleted at the provider triggers a registry rebuild
//! - An error escaping a cycle fails that cycle only; the next one recovers

mod common;

use common::*;
use dyncf_core::config::PREVIOUS_IP_KEY;
use dyncf_core::traits::StateStore;
use dyncf_core::{CycleOutcome, EngineEvent, HealthStatus, HeartbeatFile};
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn lookup_failure_records_check_only() {
    let store = CountingStateStore::new();
    store.set(PREVIOUS_IP_KEY, "1.1.1.1").await.unwrap();

    let h = Harness::new(
        example_provider("1.1.1.1"),
        ScriptedIpSource::new(ip("1.1.1.1")),
        store,
        &["a.example.com", "b.example.com"],
        test_config(),
    )
    .await;
    h.reconciler.bootstrap().await.unwrap();
    h.provider.reset_calls();
    h.ip_source.fail("request timed out after 15s");

    assert!(h.state.snapshot().last_check.is_none());
    let outcome = h.reconciler.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::LookupFailed { .. }));
    let snapshot = h.state.snapshot();
    assert!(snapshot.last_check.is_some());
    assert!(snapshot.last_update.is_none());
    assert_eq!(snapshot.current_ip, Some(ip("1.1.1.1")));
    assert_eq!(h.provider.calls().total(), 0);

    // The check still counts for liveness
    assert_eq!(
        snapshot.health(chrono::Utc::now(), Duration::from_secs(16)),
        HealthStatus::Active
    );
}

#[tokio::test]
async fn partial_failure_keeps_previous_ip() {
    let store = CountingStateStore::new();
    store.set(PREVIOUS_IP_KEY, "1.1.1.1").await.unwrap();

    let provider = MockDnsProvider::new()
        .with_zone("zone-z", "example.com")
        .with_record("zone-z", "a.example.com", "1.1.1.1")
        .with_record("zone-z", "b.example.com", "1.1.1.1")
        .with_record("zone-z", "c.example.com", "1.1.1.1");
    provider.fail_updates_for("b.example.com");

    let h = Harness::new(
        provider,
        ScriptedIpSource::new(ip("2.2.2.2")),
        store,
        &["a.example.com", "b.example.com", "c.example.com"],
        test_config(),
    )
    .await;
    h.reconciler.bootstrap().await.unwrap();
    h.provider.reset_calls();

    let outcome = h.reconciler.run_cycle().await;

    match outcome {
        CycleOutcome::PartialFailure { failed, missing, .. } => {
            assert_eq!(failed, vec!["b.example.com"]);
            assert!(missing.is_empty());
        }
        other => panic!("expected partial failure, got {:?}", other),
    }

    // Remaining hosts were still attempted and applied
    assert_eq!(h.provider.calls().update, 3);
    assert_eq!(h.provider.content_of("c.example.com").as_deref(), Some("2.2.2.2"));

    let snapshot = h.state.snapshot();
    assert!(snapshot.last_check.is_some());
    assert!(snapshot.last_update.is_none());
    assert_eq!(snapshot.current_ip, Some(ip("1.1.1.1")));
    assert_eq!(
        h.store.get(PREVIOUS_IP_KEY).await.unwrap().as_deref(),
        Some("1.1.1.1")
    );

    // Next cycle retries every host
    h.provider.reset_calls();
    let outcome = h.reconciler.run_cycle().await;
    assert!(!outcome.is_success());
    assert_eq!(h.provider.calls().update, 3);
}

#[tokio::test]
async fn missing_record_triggers_rebuild() {
    let store = CountingStateStore::new();
    store.set(PREVIOUS_IP_KEY, "1.1.1.1").await.unwrap();

    let mut h = Harness::new(
        example_provider("1.1.1.1"),
        ScriptedIpSource::new(ip("2.2.2.2")),
        store,
        &["a.example.com", "b.example.com"],
        test_config(),
    )
    .await;
    h.reconciler.bootstrap().await.unwrap();
    h.provider.remove_record("b.example.com");

    let outcome = h.reconciler.run_cycle().await;
    match &outcome {
        CycleOutcome::PartialFailure { missing, .. } => {
            assert_eq!(missing, &vec!["b.example.com".to_string()]);
        }
        other => panic!("expected partial failure, got {:?}", other),
    }

    assert_eq!(h.state.registry().host_names(), vec!["a.example.com"]);
    assert!(
        h.drain_events()
            .contains(&EngineEvent::RegistryRebuilt { hosts: 1 })
    );

    let outcome = h.reconciler.run_cycle().await;
    assert_eq!(outcome, CycleOutcome::Updated { ip: ip("2.2.2.2"), hosts: 1 });
}

#[tokio::test]
async fn empty_rebuild_keeps_old_registry() {
    let store = CountingStateStore::new();
    store.set(PREVIOUS_IP_KEY, "1.1.1.1").await.unwrap();

    let h = Harness::new(
        example_provider("1.1.1.1"),
        ScriptedIpSource::new(ip("2.2.2.2")),
        store,
        &["a.example.com", "b.example.com"],
        test_config(),
    )
    .await;
    h.reconciler.bootstrap().await.unwrap();
    h.provider.remove_record("a.example.com");
    h.provider.remove_record("b.example.com");

    let outcome = h.reconciler.run_cycle().await;
    assert!(!outcome.is_success());
    assert_eq!(
        h.state.registry().host_names(),
        vec!["a.example.com", "b.example.com"]
    );
}

#[tokio::test]
async fn persist_failure_fails_cycle_and_next_cycle_recovers() {
    let dir = tempdir().unwrap();
    let heartbeat_path = dir.path().join("health.json");
    let mut config = test_config();
    config.heartbeat_path = Some(heartbeat_path.clone());

    let store = CountingStateStore::new();
    store.set(PREVIOUS_IP_KEY, "1.1.1.1").await.unwrap();

    let mut h = Harness::new(
        example_provider("1.1.1.1"),
        ScriptedIpSource::new(ip("2.2.2.2")),
        store,
        &["a.example.com", "b.example.com"],
        config,
    )
    .await;
    h.reconciler.bootstrap().await.unwrap();
    h.drain_events();
    h.store.fail_writes("disk full");

    // Every record update lands, then persisting the IP fails
    let outcome = h.reconciler.run_cycle().await;
    match &outcome {
        CycleOutcome::Failed { error } => assert!(error.contains("disk full"), "got {}", error),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(h.provider.updates().len(), 2);

    let snapshot = h.state.snapshot();
    assert!(snapshot.last_check.is_some());
    assert!(snapshot.last_update.is_none(), "last update must not advance");
    assert_eq!(snapshot.current_ip, Some(ip("1.1.1.1")));
    assert_eq!(h.state.persisted_ip(), Some(ip("1.1.1.1")));

    // Reporting still ran, stamped with the cycle's check time
    let heartbeat = HeartbeatFile::new(&heartbeat_path).read().await.unwrap();
    assert_eq!(Some(heartbeat.last_check), snapshot.last_check);

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::CycleCompleted {
            outcome: CycleOutcome::Failed { .. },
            ..
        }
    )));

    // The store comes back; the IP still differs, so the next cycle redoes the update
    h.store.heal();
    let outcome = h.reconciler.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Updated {
            ip: ip("2.2.2.2"),
            hosts: 2
        }
    );
    assert_eq!(h.provider.updates().len(), 4);

    let snapshot = h.state.snapshot();
    assert!(snapshot.last_update.is_some());
    assert_eq!(snapshot.current_ip, Some(ip("2.2.2.2")));
    assert_eq!(
        h.store.get(PREVIOUS_IP_KEY).await.unwrap(),
        Some("2.2.2.2".to_string())
    );
}
