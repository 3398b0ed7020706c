//! Core traits for the reconciler
//!
//! This module defines the seams between the engine and the outside world.
//!
//! - [`IpSource`]: Look up the current public IP
//! - [`DnsProvider`]: List zones, find, create and update records
//! - [`StateStore`]: Durable key/value state

pub mod ip_source;
pub mod dns_provider;
pub mod state_store;

pub use ip_source::IpSource;
pub use dns_provider::{DnsProvider, DnsRecord, NewRecord, RecordUpdate, Zone};
pub use state_store::StateStore;
