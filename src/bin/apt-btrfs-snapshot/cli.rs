use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Btrfs snapshots of the root filesystem, tracked with the package changes between them
#[derive(Parser, Debug)]
#[command(
    name = "apt-btrfs-snapshot",
    version,
    about = "Create, inspect and restore btrfs snapshots of /",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Use an already mounted btrfs top level instead of mounting the fstab root device
    #[arg(long, global = true)]
    pub mountpoint: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Snapshot @ and record the package changes since the previous snapshot
    Create {
        /// Tag appended to the snapshot name (also bypasses the throttle)
        #[arg(short = 't', long)]
        tag: Option<String>,
    },
    /// Package changes since the last snapshot
    Status,
    /// Details of one snapshot (or @)
    Show { name: String },
    /// The last N snapshots in @'s ancestry with their changes
    Recent {
        #[arg(short = 'n', long, default_value_t = 5)]
        number: usize,
        /// Start the walk here instead of @
        #[arg(short = 's', long, default_value = "@")]
        snapshot: String,
    },
    /// Set (or with an empty string, remove) the tag of a snapshot
    Tag { name: String, tag: String },
    /// List snapshots
    List,
    /// List snapshots older than AGE (e.g. 5d, 12h, 2w)
    ListOlderThan { age: String },
    /// Make a copy of a snapshot the new default root (takes effect on reboot)
    SetDefault {
        name: String,
        /// Tag for the backup of the current root
        #[arg(short = 't', long)]
        tag: Option<String>,
    },
    /// Set default to the N-th ancestor of @
    Rollback {
        #[arg(short = 'n', long, default_value_t = 1)]
        number: usize,
        #[arg(short = 't', long)]
        tag: Option<String>,
    },
    /// Delete a snapshot, handing its children to its parent
    Delete { name: String },
    /// Delete untagged non-branching snapshots older than AGE
    DeleteOlderThan { age: String },
    /// Delete a leaf snapshot and every ancestor it leaves childless
    Prune { name: String },
    /// Draw the snapshot tree
    Tree,
    /// Remove cached .deb files from every snapshot
    Clean,
    /// Link snapshots created before parent tracking, oldest to newest
    Convert,
}
