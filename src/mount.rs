//! Working volume root for one process.
//!
//! Either an already mounted top level (config `mountpoint`) or the fstab root
//! device mounted on a private temp dir. The temp mount is undone on Drop.
//! Unsupported systems (no btrfs tool, no `subvol=@` root in fstab) are refused
//! here, before anything is mounted or touched.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::SnapConfig;
use crate::fstab::{check_supported, require_btrfs_tool};

#[derive(Debug)]
pub struct VolumeRoot {
    path: PathBuf,
    mounted_here: bool,
}

impl VolumeRoot {
    pub fn open(cfg: &SnapConfig) -> Result<Self> {
        if !cfg.plain_dirs {
            require_btrfs_tool(&cfg.btrfs_bin)?;
        }
        if let Some(mp) = &cfg.mountpoint {
            if !mp.is_dir() {
                return Err(anyhow!("mountpoint {} is not a directory", mp.display()));
            }
            return Ok(Self {
                path: mp.clone(),
                mounted_here: false,
            });
        }

        let entry = check_supported(&cfg.fstab)?;
        let path = std::env::temp_dir().join(format!("apt-btrfs-snapshot-mp-{}", std::process::id()));
        fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))?;

        let status = Command::new("mount")
            .arg(&entry.fs_spec)
            .arg(&path)
            .status()
            .context("spawn mount")?;
        if !status.success() {
            let _ = fs::remove_dir(&path);
            return Err(anyhow!("mount {} on {} failed", entry.fs_spec, path.display()));
        }
        debug!("mounted {} on {}", entry.fs_spec, path.display());
        Ok(Self {
            path,
            mounted_here: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VolumeRoot {
    fn drop(&mut self) {
        if !self.mounted_here {
            return;
        }
        match Command::new("umount").arg(&self.path).status() {
            Ok(s) if s.success() => {
                let _ = fs::remove_dir(&self.path);
            }
            // leave the directory alone while something may still be mounted on it
            Ok(_) | Err(_) => warn!("umount {} failed", self.path.display()),
        }
    }
}
