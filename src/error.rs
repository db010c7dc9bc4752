//! Typed failures of the snapshot graph operations.
//!
//! Library functions return `anyhow::Result`; these variants travel inside
//! `anyhow::Error` and can be recovered with `err.downcast_ref::<SnapError>()`.
//! Log/parse problems never show up here: they degrade to "no information".

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapError {
    /// Snapshot does not exist or its name does not start with the snapshot prefix.
    #[error("snapshot '{0}' not found (it must exist and its name must start with \"@apt-snapshot-\")")]
    NotFound(String),

    #[error("staging directory {} already exists, remove it first", .0.display())]
    StagingConflict(PathBuf),

    #[error("cannot roll back {requested} step(s): only {available} ancestor(s) of @ are known")]
    RollbackDepthExceeded { requested: usize, available: usize },

    #[error("snapshot '{name}' is not a leaf, it has {children} child(ren)")]
    NotLeaf { name: String, children: usize },

    #[error("snapshot name '{0}' is already taken")]
    NameTaken(String),

    /// Tag would not stay a single path component of the snapshot name.
    #[error("invalid tag '{0}': no '/', NUL, '.' or '..' allowed")]
    InvalidTag(String),

    /// Missing btrfs tool or an fstab without a btrfs `/` on `subvol=@`.
    #[error("system not supported: {0}")]
    Unsupported(String),

    /// External snapshot/delete tool reported failure.
    #[error("{op} failed for '{target}'")]
    Primitive { op: &'static str, target: String },
}
