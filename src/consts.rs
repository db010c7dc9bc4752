//! Общие константы on-disk раскладки (volume root, snapshot names, dpkg/apt paths).

// -------- Volume root --------
/// Name of the active root subvolume.
pub const ROOT_NAME: &str = "@";
/// Every managed snapshot directory starts with this prefix.
pub const SNAP_PREFIX: &str = "@apt-snapshot-";
/// Reserved directory used while swapping in a new default root.
pub const STAGING_NAME: &str = "@apt-btrfs-staging";
/// Advisory lock file at the top level of the volume.
pub const LOCK_FILE: &str = ".apt-btrfs-snapshot.lock";

// -------- Per-snapshot files (relative to the snapshot directory) --------
// Symlink "../../<parent>"; отсутствие ссылки = orphan.
pub const PARENT_LINK: &str = "etc/apt-btrfs-parent";
pub const PARENT_DOTS: &str = "../..";
// JSON blob with the ChangeSet; отсутствие файла = "unknown", не "empty".
pub const CHANGES_FILE: &str = "etc/apt-btrfs-changes";

// -------- Timestamps --------
/// Timestamp embedded in snapshot names.
pub const NAME_TS_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";
pub const NAME_TS_LEN: usize = 19;
/// Timestamp at the start of every dpkg.log line.
pub const LOG_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// -------- dpkg / apt (relative to var_location) --------
pub const DPKG_LOG: &str = "log/dpkg.log";
/// Rotated logs are probed as dpkg.log.N then dpkg.log.N.gz for N in 1..=MAX_ROTATED_LOGS.
pub const MAX_ROTATED_LOGS: u32 = 9;
pub const EXTENDED_STATES: &str = "lib/apt/extended_states";
pub const APT_ARCHIVES: &str = "cache/apt/archives";

// -------- Defaults --------
pub const DEFAULT_THROTTLE_SECS: u64 = 60;
pub const DEFAULT_HISTORY_DAYS: i64 = 30;
/// Upper bound for the `status` look-back window (about a century).
pub const MAX_HISTORY_DAYS: i64 = 36_500;

// -------- External tools --------
/// btrfs-progs binary; its absence makes the system unsupported.
pub const BTRFS_BIN: &str = "/sbin/btrfs";
