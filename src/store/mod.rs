//! Store abstraction for equipment, IP addresses, assignments and alerts
//!
//! The core never owns a schema or a query engine; it talks to a
//! `StoreBackend` trait object. Two implementations matter:
//!
//! - **Memory** (shipped here): hash maps behind an `RwLock`, used by the
//!   binary and the test suite
//! - **Relational** (external collaborator): implements the same trait over
//!   the real database

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::StoreBackend;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
