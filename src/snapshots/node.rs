//! Persisted per-snapshot state, stored inside the snapshot's own tree.
//!
//! - `etc/apt-btrfs-parent`: relative symlink `../../<parent>`; absent = orphan.
//! - `etc/apt-btrfs-changes`: ChangeSet as JSON; absent = unknown.
//!
//! Every accessor here is a real filesystem read or write. The Forest keeps the
//! in-memory parent/children cache consistent with what these write.

use anyhow::{Context, Result};
use log::warn;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::name::Snapshot;
use crate::changes::ChangeSet;
use crate::consts::{CHANGES_FILE, PARENT_DOTS, PARENT_LINK};

impl Snapshot {
    /// `<volume root>/<name>`
    pub fn dir(&self, volume_root: &Path) -> PathBuf {
        volume_root.join(self.name())
    }

    fn parent_link_path(&self, volume_root: &Path) -> PathBuf {
        self.dir(volume_root).join(PARENT_LINK)
    }

    fn changes_path(&self, volume_root: &Path) -> PathBuf {
        self.dir(volume_root).join(CHANGES_FILE)
    }

    /// Name the parent link points to, if the link exists.
    /// Whether that name resolves to a snapshot is for the Forest to decide.
    pub fn read_parent_link(&self, volume_root: &Path) -> Option<String> {
        let target = fs::read_link(self.parent_link_path(volume_root)).ok()?;
        target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
    }

    /// Point the parent link at `parent`, or remove it for None.
    pub fn write_parent_link(&self, volume_root: &Path, parent: Option<&str>) -> Result<()> {
        let link = self.parent_link_path(volume_root);
        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link).with_context(|| format!("remove {}", link.display()))?;
        }
        if let Some(p) = parent {
            if let Some(etc) = link.parent() {
                fs::create_dir_all(etc).with_context(|| format!("create {}", etc.display()))?;
            }
            let target = Path::new(PARENT_DOTS).join(p);
            std::os::unix::fs::symlink(&target, &link).with_context(|| {
                format!("symlink {} -> {}", link.display(), target.display())
            })?;
        }
        Ok(())
    }

    /// Stored ChangeSet. Missing or unreadable blobs are "unknown".
    pub fn load_changes(&self, volume_root: &Path) -> Option<ChangeSet> {
        let path = self.changes_path(volume_root);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("ignoring unreadable changes file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Replace the stored ChangeSet (tmp + rename); None removes it.
    pub fn store_changes(&self, volume_root: &Path, changes: Option<&ChangeSet>) -> Result<()> {
        let path = self.changes_path(volume_root);
        let Some(changes) = changes else {
            if fs::symlink_metadata(&path).is_ok() {
                fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            }
            return Ok(());
        };

        if let Some(etc) = path.parent() {
            fs::create_dir_all(etc).with_context(|| format!("create {}", etc.display()))?;
        }
        let tmp = path.with_extension("tmp");
        let data = serde_json::to_vec_pretty(changes).context("serialize changes")?;
        {
            let mut f = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&tmp)
                .with_context(|| format!("open {}", tmp.display()))?;
            f.write_all(&data)
                .with_context(|| format!("write {}", tmp.display()))?;
            f.sync_all()
                .with_context(|| format!("fsync {}", tmp.display()))?;
        }
        fs::rename(&tmp, &path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scratch(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("aptsnap-node-{}-{}", prefix, std::process::id()))
    }

    fn node() -> Snapshot {
        Snapshot::parse("@apt-snapshot-2013-08-01_10:00:00").unwrap()
    }

    #[test]
    fn changes_blob_is_replaced_whole() -> Result<()> {
        let root = scratch("store");
        let s = node();
        fs::create_dir_all(s.dir(&root))?;
        let since = NaiveDate::from_ymd_opt(2013, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let mut c = ChangeSet::empty(since);
        c.install.push(("vim".to_string(), "7.4".to_string()));

        assert!(s.load_changes(&root).is_none());
        s.store_changes(&root, Some(&c))?;
        assert_eq!(s.load_changes(&root), Some(c));
        assert!(!s.changes_path(&root).with_extension("tmp").exists());

        s.store_changes(&root, None)?;
        assert!(s.load_changes(&root).is_none());
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn failed_store_is_reported_with_the_path() -> Result<()> {
        let root = scratch("store-fail");
        let s = node();
        // a directory squatting on the temp name makes the write impossible
        fs::create_dir_all(s.changes_path(&root).with_extension("tmp"))?;
        let since = NaiveDate::from_ymd_opt(2013, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let err = s.store_changes(&root, Some(&ChangeSet::empty(since))).unwrap_err();
        assert!(format!("{:#}", err).contains("apt-btrfs-changes.tmp"));
        assert!(s.load_changes(&root).is_none());
        fs::remove_dir_all(&root)?;
        Ok(())
    }
}
