// # Shared Reconciliation State
//
// One mutex guards check/update timestamps, the persisted IP and the
// registry. The lock is only held to copy values in or out; durable writes
// happen with the lock released.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_PLACEHOLDER_IP, PREVIOUS_IP_KEY};
use crate::error::Result;
use crate::registry::Registry;
use crate::status::StatusSnapshot;
use crate::traits::StateStore;

#[derive(Debug, Default)]
struct Inner {
    last_check: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
    current_ip: Option<IpAddr>,
    registry: Arc<Registry>,
}

/// Process-wide reconciliation state
///
/// Mutated only by the reconciler; everyone else reads through
/// [`SharedState::snapshot`].
pub struct SharedState {
    inner: Mutex<Inner>,
    store: Arc<dyn StateStore>,
}

impl SharedState {
    /// Load state from the durable store
    ///
    /// A missing or unparseable `previous_ip` is replaced by the placeholder
    /// IP, which is written back so the file always carries the key.
    pub async fn load(store: Arc<dyn StateStore>) -> Result<Self> {
        let stored = store.get(PREVIOUS_IP_KEY).await?;

        let ip = match stored.as_deref().map(str::parse::<IpAddr>) {
            Some(Ok(ip)) => {
                info!("Loaded previous IP {}", ip);
                ip
            }
            Some(Err(_)) => {
                warn!(
                    "Stored previous IP {:?} is invalid, using placeholder {}",
                    stored.as_deref().unwrap_or_default(),
                    DEFAULT_PLACEHOLDER_IP
                );
                store.set(PREVIOUS_IP_KEY, &DEFAULT_PLACEHOLDER_IP.to_string()).await?;
                DEFAULT_PLACEHOLDER_IP
            }
            None => {
                info!("No previous IP stored, using placeholder {}", DEFAULT_PLACEHOLDER_IP);
                store.set(PREVIOUS_IP_KEY, &DEFAULT_PLACEHOLDER_IP.to_string()).await?;
                DEFAULT_PLACEHOLDER_IP
            }
        };

        Ok(Self {
            inner: Mutex::new(Inner {
                current_ip: Some(ip),
                ..Inner::default()
            }),
            store,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Critical sections only copy values, a poisoned guard is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an IP lookup attempt
    pub fn record_check(&self, at: DateTime<Utc>) {
        self.lock().last_check = Some(at);
    }

    /// Persist `ip` if it differs from the stored value
    ///
    /// Returns whether a durable write happened. The in-memory value only
    /// changes after the write succeeded.
    pub async fn record_ip(&self, ip: IpAddr) -> Result<bool> {
        if self.lock().current_ip == Some(ip) {
            debug!("IP {} already persisted", ip);
            return Ok(false);
        }

        self.store.set(PREVIOUS_IP_KEY, &ip.to_string()).await?;
        self.lock().current_ip = Some(ip);
        info!("Persisted IP {}", ip);
        Ok(true)
    }

    /// Record a fully successful update cycle
    pub fn record_update_success(&self, at: DateTime<Utc>) {
        self.lock().last_update = Some(at);
    }

    /// Record a fully successful update: persist `ip`, then publish it with `at`
    ///
    /// Both fields change under one lock acquisition, so a snapshot never
    /// shows the new IP next to the previous update time. Nothing changes in
    /// memory if the durable write fails.
    pub async fn commit_update(&self, ip: IpAddr, at: DateTime<Utc>) -> Result<()> {
        if self.lock().current_ip != Some(ip) {
            self.store.set(PREVIOUS_IP_KEY, &ip.to_string()).await?;
            info!("Persisted IP {}", ip);
        }

        let mut inner = self.lock();
        inner.current_ip = Some(ip);
        inner.last_update = Some(at);
        Ok(())
    }

    /// Swap in a new registry
    pub fn replace_registry(&self, registry: Registry) {
        self.lock().registry = Arc::new(registry);
    }

    /// Current registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.lock().registry)
    }

    /// Last persisted IP
    pub fn persisted_ip(&self) -> Option<IpAddr> {
        self.lock().current_ip
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.lock();
        StatusSnapshot {
            last_check: inner.last_check,
            last_update: inner.last_update,
            current_ip: inner.current_ip,
            host_count: inner.registry.len(),
            host_names: inner.registry.host_names(),
        }
    }

    /// Flush the durable store
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
