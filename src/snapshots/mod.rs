//! Snapshot graph: node identity, persisted per-node state, the loaded forest
//! and the operations that rewrite it.

pub mod forest;
pub mod manager;
pub mod name;
mod node;

pub use forest::Forest;
pub use manager::{CreateOutcome, DeleteReport, SnapshotInfo, SnapshotManager, Status};
pub use name::{is_snapshot_name, Snapshot};
