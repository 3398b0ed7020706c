// # dyncf-core
//
// Core library for the Cloudflare dynamic DNS reconciler.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for looking up the current public IP
// - **DnsProvider**: Trait for listing zones and finding, creating and updating records
// - **StateStore**: Trait for durable key/value state (last persisted IP)
// - **Resolver**: Turns a host list into an immutable host → record Registry
// - **SharedState**: The one lock-guarded state object, read through snapshots
// - **Reconciler**: Fixed-interval loop that pushes IP changes to every record
//
// ## Design Principles
//
// 1. **Library-First**: The daemon is a thin shell over this crate
// 2. **No Fatal Cycles**: Only configuration errors stop the process
// 3. **Idempotency**: An unchanged IP costs one lookup and zero provider calls

pub mod traits;
pub mod engine;
pub mod registry;
pub mod resolver;
pub mod config;
pub mod error;
pub mod state;
pub mod status;
pub mod heartbeat;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider, StateStore};
pub use engine::{CycleOutcome, EngineEvent, Reconciler};
pub use registry::{HostRecord, Registry};
pub use config::{Credentials, EngineConfig, IpLookupConfig, ProviderConfig, ReconcilerConfig};
pub use error::{Error, Result};
pub use state::{FileStateStore, MemoryStateStore, SharedState};
pub use status::{HealthStatus, StatusSnapshot};
pub use heartbeat::HeartbeatFile;
