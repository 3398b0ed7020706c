//! Reconciliation loop
//!
//! The [`Reconciler`] keeps the configured hosts' DNS records pointed at the
//! current public IP by polling on a fixed interval.
//!
//! ## Cycle
//!
//! ```text
//!            ┌──────────┐
//!   ┌───────▶│ Checking │── no IP ─────────────────────┐
//!   │        └──────────┘                              │
//!   │             │ IP == persisted      IP changed    │
//!   │             ▼                          │         │
//!   │        ┌───────────┐            ┌──────────┐     │
//!   │        │ Unchanged │            │ Updating │     │
//!   │        └───────────┘            └──────────┘     │
//!   │             │                          │         │
//!   │             ▼                          ▼         ▼
//!   │        ┌──────────────────────────────────────────┐
//!   │        │ Reporting (heartbeat, events)            │
//!   │        └──────────────────────────────────────────┘
//!   │                            │
//!   │        ┌──────────┐        │
//!   └────────│ Sleeping │◀───────┘
//!            └──────────┘
//! ```
//!
//! Every cycle records its check time, even when the IP lookup fails. Only a
//! cycle in which every record update succeeded persists the new IP and
//! advances the last-update time. Failures are retried after the same fixed
//! interval. A shutdown signal ends the loop from any state.

pub mod executor;

use crate::config::{DEFAULT_PLACEHOLDER_IP, EngineConfig};
use crate::error::{Error, Result};
use crate::heartbeat::HeartbeatFile;
use crate::registry::Registry;
use crate::resolver::{Resolver, ResolverOptions};
use crate::state::SharedState;
use crate::traits::{DnsProvider, IpSource};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info, info_span, warn};

pub use executor::{FailedUpdate, UpdateReport};

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No IP could be obtained
    LookupFailed { error: String },

    /// The IP matches the persisted one; no provider calls were made
    Unchanged { ip: IpAddr },

    /// Every record now points at `ip` and `ip` is persisted
    Updated { ip: IpAddr, hosts: usize },

    /// Some record updates failed; the IP was not persisted
    PartialFailure {
        ip: IpAddr,
        failed: Vec<String>,
        missing: Vec<String>,
    },

    /// Unexpected error caught at the loop boundary
    Failed { error: String },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Unchanged { .. } | Self::Updated { .. })
    }
}

/// Events emitted by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Loop started
    Started { hosts: usize },

    /// The public IP differs from the persisted one
    IpChanged {
        previous: Option<IpAddr>,
        current: IpAddr,
    },

    /// One record now points at the new IP
    HostUpdated { host: String, ip: IpAddr },

    /// One record update failed
    HostUpdateFailed { host: String, error: String },

    /// The registry was rebuilt after records went missing
    RegistryRebuilt { hosts: usize },

    /// A cycle finished
    CycleCompleted { cycle: u64, outcome: CycleOutcome },

    /// Loop stopped
    Stopped { reason: String },
}

/// Polling reconciler
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Resolve hosts with [`Reconciler::bootstrap()`] (fails if nothing resolves)
/// 3. Loop with [`Reconciler::run()`] until SIGINT/SIGTERM
///
/// The shared state handed in at construction is the same one the status
/// server reads; the reconciler is its only writer.
pub struct Reconciler {
    ip_source: Box<dyn IpSource>,
    provider: Box<dyn DnsProvider>,
    state: Arc<SharedState>,
    hosts: Vec<String>,
    config: EngineConfig,
    heartbeat: Option<HeartbeatFile>,
    cycles: AtomicU64,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Reconciler {
    /// Create a reconciler
    ///
    /// Returns the reconciler and the receiving end of its event channel.
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        state: Arc<SharedState>,
        hosts: Vec<String>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;
        if hosts.is_empty() {
            return Err(Error::config("At least one host must be configured"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let heartbeat = config.heartbeat_path.clone().map(HeartbeatFile::new);

        let reconciler = Self {
            ip_source,
            provider,
            state,
            hosts,
            config,
            heartbeat,
            cycles: AtomicU64::new(0),
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Shared state written by this reconciler
    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// Resolve the configured hosts and install the registry
    ///
    /// An empty result is a configuration error: there is nothing to
    /// reconcile.
    pub async fn bootstrap(&self) -> Result<usize> {
        let registry = self.build_registry().await;
        if registry.is_empty() {
            return Err(Error::config(
                "No valid hosts to monitor. Check HOST_LIST and the provider zones.",
            ));
        }

        let count = registry.len();
        info!("Monitoring {} host(s): {}", count, registry.host_names().join(", "));
        self.state.replace_registry(registry);
        Ok(count)
    }

    async fn build_registry(&self) -> Registry {
        let placeholder = self.state.persisted_ip().unwrap_or(DEFAULT_PLACEHOLDER_IP);
        Resolver::new(self.provider.as_ref(), ResolverOptions::from(&self.config))
            .build_registry(&self.hosts, placeholder)
            .await
    }

    /// Run one full cycle: check, maybe update, report
    pub async fn run_cycle(&self) -> CycleOutcome {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

        async {
            let lookup = self.ip_source.current().await;
            let checked_at = Utc::now();
            self.state.record_check(checked_at);

            let outcome = match self.reconcile(lookup).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Cycle failed: {}", e);
                    CycleOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            if let CycleOutcome::PartialFailure { missing, .. } = &outcome
                && !missing.is_empty()
                && self.config.rebuild_on_missing
            {
                self.rebuild_registry(missing).await;
            }

            self.report(cycle, checked_at, &outcome).await;
            outcome
        }
        .instrument(info_span!("cycle", n = cycle))
        .await
    }

    /// Compare the looked-up IP with the persisted one and push it out if it changed
    async fn reconcile(&self, lookup: Result<IpAddr>) -> Result<CycleOutcome> {
        let ip = match lookup {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Could not determine public IP from {}: {}", self.ip_source.source_name(), e);
                return Ok(CycleOutcome::LookupFailed {
                    error: e.to_string(),
                });
            }
        };

        let previous = self.state.persisted_ip();
        if previous == Some(ip) {
            debug!("IP unchanged: {}", ip);
            return Ok(CycleOutcome::Unchanged { ip });
        }

        info!(
            "IP change detected: {} -> {}",
            previous.map(|p| p.to_string()).unwrap_or_else(|| "None".to_string()),
            ip
        );
        self.emit_event(EngineEvent::IpChanged {
            previous,
            current: ip,
        });

        let registry = self.state.registry();
        let report = executor::apply_ip(self.provider.as_ref(), &registry, ip).await;

        for host in &report.updated {
            self.emit_event(EngineEvent::HostUpdated {
                host: host.clone(),
                ip,
            });
        }
        for failure in &report.failed {
            self.emit_event(EngineEvent::HostUpdateFailed {
                host: failure.host.clone(),
                error: failure.error.clone(),
            });
        }

        if !report.all_succeeded() {
            warn!(
                "{} of {} update(s) failed, keeping previous IP for retry",
                report.failed.len(),
                registry.len()
            );
            return Ok(CycleOutcome::PartialFailure {
                ip,
                failed: report.failed_hosts(),
                missing: report.missing_records(),
            });
        }

        self.state.commit_update(ip, Utc::now()).await?;
        Ok(CycleOutcome::Updated {
            ip,
            hosts: report.updated.len(),
        })
    }

    /// Re-resolve after records vanished; keep the old registry if the rebuild is empty
    async fn rebuild_registry(&self, missing: &[String]) {
        warn!("Record(s) missing at provider: {}. Rebuilding registry.", missing.join(", "));

        let registry = self.build_registry().await;
        if registry.is_empty() {
            warn!("Registry rebuild produced no hosts, keeping the previous registry");
            return;
        }

        let hosts = registry.len();
        self.state.replace_registry(registry);
        info!("Registry rebuilt with {} host(s)", hosts);
        self.emit_event(EngineEvent::RegistryRebuilt { hosts });
    }

    async fn report(&self, cycle: u64, checked_at: DateTime<Utc>, outcome: &CycleOutcome) {
        if let Some(heartbeat) = &self.heartbeat
            && let Err(e) = heartbeat.write(checked_at).await
        {
            warn!("Failed to write heartbeat: {}", e);
        }

        self.emit_event(EngineEvent::CycleCompleted {
            cycle,
            outcome: outcome.clone(),
        });
    }

    /// Run until SIGINT or SIGTERM
    pub async fn run(&self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Used by tests and by embedders that manage shutdown themselves.
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let hosts = self.state.registry().len();
        info!(
            "Starting reconciliation loop: {} host(s), every {}s",
            hosts, self.config.interval_secs
        );
        self.emit_event(EngineEvent::Started { hosts });

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.run_cycle() => {}
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        info!("Shutdown signal received");
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        self.state.flush().await?;
        info!("State flushed, reconciler stopped");
        Ok(())
    }

    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!("Event channel full, dropping {:?}", event),
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Resolves on SIGINT (Ctrl-C) or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_success_classification() {
        let ip: IpAddr = "1.1.1.1".parse().unwrap();
        assert!(CycleOutcome::Unchanged { ip }.is_success());
        assert!(CycleOutcome::Updated { ip, hosts: 2 }.is_success());
        assert!(
            !CycleOutcome::LookupFailed {
                error: "timeout".to_string()
            }
            .is_success()
        );
        assert!(
            !CycleOutcome::PartialFailure {
                ip,
                failed: vec!["a.example.com".to_string()],
                missing: Vec::new(),
            }
            .is_success()
        );
    }
}
