// # State
//
// Durable key/value stores (file, memory) and the in-process shared state
// the reconciler and status readers both go through.

pub mod file;
pub mod memory;
pub mod shared;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use shared::SharedState;
