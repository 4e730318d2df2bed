//! Repository implementations module.
//!
//! - `local`: in-memory store for tests and development
//! - `snapshot`: in-memory store loaded from (and optionally written back to) a snapshot directory
pub mod local;
pub mod snapshot;

pub use local::LocalRepository;
pub use snapshot::{SnapshotRepository, SnapshotStats};
