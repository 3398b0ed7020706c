// # State Store Trait
//
// Defines the interface for the durable key/value state the daemon keeps
// between restarts. The reconciler stores the last persisted public IP under
// `config::PREVIOUS_IP_KEY`.
//
// ## Implementations
//
// - File-based: flat JSON object (`state::FileStateStore`)
// - In-memory: `state::MemoryStateStore`
//
// ## Usage
//
// ```rust,ignore
// use dyncf_core::StateStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     let previous = store.get("previous_ip").await?;
//     store.set("previous_ip", "203.0.113.7").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for state store implementations
///
/// Values are plain strings keyed by name. `set` must be durable when it
/// returns `Ok`: callers rely on it to decide whether a value counts as
/// persisted.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: The stored value
    /// - `Ok(None)`: Key not present
    /// - `Err(Error)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<String>, crate::Error>;

    /// Write a value and persist it
    async fn set(&self, key: &str, value: &str) -> Result<(), crate::Error>;

    /// List all keys in the store
    async fn keys(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
