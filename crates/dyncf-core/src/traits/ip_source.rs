// # IP Source Trait
//
// Defines the interface for looking up the current public IP address.
//
// ## Implementations
//
// - JSON lookup service over HTTP: `dyncf-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use dyncf_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//     let current_ip = source.current().await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for IP source implementations
///
/// `current()` performs a single lookup with a bounded timeout. It never
/// caches: the engine decides whether the answer differs from what it has
/// persisted.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current IP address
    /// - `Err(Error::IpLookup)`: Network failure, timeout or malformed body
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Short name for logs
    fn source_name(&self) -> &'static str {
        "ip-source"
    }
}
