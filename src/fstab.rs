//! /etc/fstab reading: finds the btrfs root entry the snapshot layout needs.
//!
//! Supported layout: the `/` entry is btrfs and mounted with `subvol=@`, so the
//! top level of that filesystem holds `@` next to the snapshots.

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

use crate::error::SnapError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    /// UUID=..., LABEL=... or a device path.
    pub fs_spec: String,
    pub mountpoint: String,
    pub fstype: String,
    pub options: String,
    pub dump: u32,
    pub passno: u32,
}

impl FstabEntry {
    /// Parse one line. Comments are stripped, fields past the sixth are ignored
    /// (mount does the same); fewer than four fields is not an entry.
    pub fn from_line(line: &str) -> Option<Self> {
        let data = line.split('#').next().unwrap_or("");
        let f: Vec<&str> = data.split_whitespace().collect();
        if f.len() < 4 {
            return None;
        }
        let num = |i: usize| f.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
        Some(Self {
            fs_spec: f[0].to_string(),
            mountpoint: f[1].to_string(),
            fstype: f[2].to_string(),
            options: f[3].to_string(),
            dump: num(4),
            passno: num(5),
        })
    }

    pub fn has_option(&self, opt: &str) -> bool {
        self.options.split(',').any(|o| o.trim() == opt)
    }

    fn is_supported_root(&self) -> bool {
        self.mountpoint == "/"
            && self.fstype == "btrfs"
            && (self.has_option("subvol=@") || self.has_option("subvol=/@"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Fstab {
    pub entries: Vec<FstabEntry>,
}

impl Fstab {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(FstabEntry::from_line)
            .collect();
        Self { entries }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read fstab {}", path.display()))?;
        let fstab = Self::parse(&text);
        debug!("fstab {}: {} entries", path.display(), fstab.entries.len());
        Ok(fstab)
    }

    pub fn supported_root_entry(&self) -> Option<&FstabEntry> {
        self.entries.iter().find(|e| e.is_supported_root())
    }
}

/// The btrfs tool must be installed before any subvolume operation runs.
pub fn require_btrfs_tool(btrfs_bin: &Path) -> Result<()> {
    if !btrfs_bin.exists() {
        return Err(SnapError::Unsupported(format!(
            "{} not found (btrfs-progs is required)",
            btrfs_bin.display()
        ))
        .into());
    }
    Ok(())
}

/// Root entry of `fstab` when the system uses the supported layout.
pub fn check_supported(fstab: &Path) -> Result<FstabEntry> {
    let f = Fstab::read(fstab).map_err(|e| SnapError::Unsupported(format!("{:#}", e)))?;
    match f.supported_root_entry() {
        Some(e) => Ok(e.clone()),
        None => Err(SnapError::Unsupported(format!(
            "{} has no btrfs '/' entry mounted with subvol=@",
            fstab.display()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FSTAB: &str = "\
# /etc/fstab: static file system information.
#
# <file system> <mount point>   <type>  <options>       <dump>  <pass>
proc            /proc           proc    nodev,noexec,nosuid 0       0
# / was on /dev/sda1 during installation
UUID=fe63f598-1906-478e-acc7-f74740e78d1f /               btrfs   defaults,subvol=@ 0       1
# /home was on /dev/sda1 during installation
UUID=fe63f598-1906-478e-acc7-f74740e78d1f /home           btrfs   defaults,subvol=@home 0       2
/dev/sda5       none            swap    sw              0       0 extra fields here
broken-line
";

    #[test]
    fn finds_btrfs_root() {
        let f = Fstab::parse(FSTAB);
        assert_eq!(f.entries.len(), 4);
        let root = f.supported_root_entry().unwrap();
        assert_eq!(root.passno, 1);
        assert_eq!(root.fs_spec, "UUID=fe63f598-1906-478e-acc7-f74740e78d1f");
    }

    #[test]
    fn rejects_root_without_subvolume() {
        let f = Fstab::parse("/dev/sda1 / btrfs defaults 0 1\n/dev/sda2 /home btrfs subvol=@ 0 2\n");
        assert!(f.supported_root_entry().is_none());
        let f = Fstab::parse("/dev/sda1 / ext4 errors=remount-ro,subvol=@ 0 1\n");
        assert!(f.supported_root_entry().is_none());
    }

    #[test]
    fn trailing_comment_is_ignored() {
        let e = FstabEntry::from_line("/dev/sda1 / btrfs subvol=@ # root").unwrap();
        assert_eq!(e.options, "subvol=@");
        assert_eq!(e.dump, 0);
        assert!(e.is_supported_root());
    }

    fn unsupported(e: &anyhow::Error) -> bool {
        matches!(e.downcast_ref::<SnapError>(), Some(SnapError::Unsupported(_)))
    }

    #[test]
    fn missing_tool_is_unsupported() {
        let err = require_btrfs_tool(Path::new("/nonexistent/btrfs")).unwrap_err();
        assert!(unsupported(&err));
        assert!(err.to_string().contains("/nonexistent/btrfs"));
    }

    #[test]
    fn check_supported_reads_the_file() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("aptsnap-fstab-{}", std::process::id()));
        fs::create_dir_all(&dir)?;
        let good = dir.join("fstab");
        fs::write(&good, FSTAB)?;
        assert_eq!(check_supported(&good)?.mountpoint, "/");

        let ext4 = dir.join("fstab.ext4");
        fs::write(&ext4, "/dev/sda1 / ext4 errors=remount-ro 0 1\n")?;
        assert!(unsupported(&check_supported(&ext4).unwrap_err()));
        assert!(unsupported(&check_supported(&dir.join("missing")).unwrap_err()));

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
