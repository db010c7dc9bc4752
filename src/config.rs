//! Centralized configuration for apt-btrfs-snapshot.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - `SnapConfig::from_env()` reads the `APT_SNAP_*` variables; fluent `with_*`
//!   setters override single fields (tests and the CLI use them).
//!
//! Env:
//! - APT_SNAP_MOUNTPOINT    — already mounted volume root (skips mounting the fstab device)
//! - APT_SNAP_FSTAB         — fstab path (default /etc/fstab)
//! - APT_SNAP_VAR           — where dpkg logs and apt extended_states live (default /var)
//! - APT_SNAP_THROTTLE_SECS — untagged `create` is skipped if the newest snapshot is younger
//! - APT_SNAP_HISTORY_DAYS  — how far back `status` looks when @ has no parent
//! - APT_SNAP_ARCH          — native dpkg architecture (default derived from the build target)
//! - APT_SNAP_PLAIN_DIRS    — 1|true: plain directory copies instead of btrfs subvolumes
//! - APT_SNAP_BTRFS         — btrfs-progs binary (default /sbin/btrfs)
//! - APT_SNAP_NO_LOCK       — 1|true: do not take the advisory volume lock

use std::fmt;
use std::path::PathBuf;

use crate::consts::{BTRFS_BIN, DEFAULT_HISTORY_DAYS, DEFAULT_THROTTLE_SECS, MAX_HISTORY_DAYS};

#[derive(Clone, Debug)]
pub struct SnapConfig {
    /// Env: APT_SNAP_MOUNTPOINT (default None: mount the root device from fstab)
    pub mountpoint: Option<PathBuf>,

    /// Env: APT_SNAP_FSTAB (default /etc/fstab)
    pub fstab: PathBuf,

    /// Env: APT_SNAP_VAR (default /var)
    pub var_location: PathBuf,

    /// Env: APT_SNAP_THROTTLE_SECS (default 60). 0 disables throttling.
    pub throttle_secs: u64,

    /// Env: APT_SNAP_HISTORY_DAYS (default 30, clamped to 0..=36500)
    pub history_days: i64,

    /// Env: APT_SNAP_ARCH (default: amd64/arm64/i386/armhf from the build target)
    pub native_arch: String,

    /// Env: APT_SNAP_PLAIN_DIRS (default false)
    pub plain_dirs: bool,

    /// Env: APT_SNAP_BTRFS (default /sbin/btrfs). Unused with plain_dirs.
    pub btrfs_bin: PathBuf,

    /// Env: APT_SNAP_NO_LOCK inverts this (default true)
    pub lock: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            mountpoint: None,
            fstab: PathBuf::from("/etc/fstab"),
            var_location: PathBuf::from("/var"),
            throttle_secs: DEFAULT_THROTTLE_SECS,
            history_days: DEFAULT_HISTORY_DAYS,
            native_arch: native_dpkg_arch().to_string(),
            plain_dirs: false,
            btrfs_bin: PathBuf::from(BTRFS_BIN),
            lock: true,
        }
    }
}

/// dpkg architecture name of the running build target.
pub fn native_dpkg_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "i386",
        "arm" => "armhf",
        "powerpc64" => "ppc64el",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        other => other,
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        let s = v.trim().to_ascii_lowercase();
        s == "1" || s == "true" || s == "yes" || s == "on"
    })
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

impl SnapConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(p) = env_path("APT_SNAP_MOUNTPOINT") {
            cfg.mountpoint = Some(p);
        }
        if let Some(p) = env_path("APT_SNAP_FSTAB") {
            cfg.fstab = p;
        }
        if let Some(p) = env_path("APT_SNAP_VAR") {
            cfg.var_location = p;
        }

        if let Ok(v) = std::env::var("APT_SNAP_THROTTLE_SECS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.throttle_secs = n;
            }
        }
        if let Ok(v) = std::env::var("APT_SNAP_HISTORY_DAYS") {
            if let Ok(n) = v.trim().parse::<i64>() {
                cfg.history_days = n.clamp(0, MAX_HISTORY_DAYS);
            }
        }

        if let Ok(v) = std::env::var("APT_SNAP_ARCH") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.native_arch = s.to_string();
            }
        }

        if let Some(on) = env_flag("APT_SNAP_PLAIN_DIRS") {
            cfg.plain_dirs = on;
        }
        if let Some(p) = env_path("APT_SNAP_BTRFS") {
            cfg.btrfs_bin = p;
        }
        if let Some(off) = env_flag("APT_SNAP_NO_LOCK") {
            cfg.lock = !off;
        }

        cfg
    }

    pub fn with_mountpoint<P: Into<PathBuf>>(mut self, mp: Option<P>) -> Self {
        self.mountpoint = mp.map(Into::into);
        self
    }

    pub fn with_fstab<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.fstab = path.into();
        self
    }

    pub fn with_var_location<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.var_location = path.into();
        self
    }

    pub fn with_throttle_secs(mut self, secs: u64) -> Self {
        self.throttle_secs = secs;
        self
    }

    pub fn with_history_days(mut self, days: i64) -> Self {
        self.history_days = days.clamp(0, MAX_HISTORY_DAYS);
        self
    }

    pub fn with_native_arch<S: Into<String>>(mut self, arch: S) -> Self {
        self.native_arch = arch.into();
        self
    }

    pub fn with_plain_dirs(mut self, on: bool) -> Self {
        self.plain_dirs = on;
        self
    }

    pub fn with_btrfs_bin<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.btrfs_bin = path.into();
        self
    }

    pub fn with_lock(mut self, on: bool) -> Self {
        self.lock = on;
        self
    }

    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for SnapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SnapConfig {{ \
             mountpoint: {}, \
             fstab: {}, \
             var_location: {}, \
             throttle_secs: {}, \
             history_days: {}, \
             native_arch: {}, \
             plain_dirs: {}, \
             btrfs_bin: {}, \
             lock: {} \
             }}",
            self.mountpoint
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default(mount from fstab)".to_string()),
            self.fstab.display(),
            self.var_location.display(),
            self.throttle_secs,
            self.history_days,
            self.native_arch,
            self.plain_dirs,
            self.btrfs_bin.display(),
            self.lock,
        )
    }
}
