//! Volume primitives: clone a subtree, remove a subtree.
//!
//! - `BtrfsOps`: `btrfs subvolume snapshot|delete` (production).
//! - `PlainDirOps`: recursive copy / remove_dir_all on ordinary directories,
//!   used on test grounds and on filesystems without subvolumes.
//!
//! A primitive failing surfaces as `SnapError::Primitive`; callers must not
//! touch any parent link after a failed `snapshot`.

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::SnapConfig;
use crate::error::SnapError;

pub trait VolumeOps {
    /// Clone `source` into the (not yet existing) `dest`.
    fn snapshot(&self, source: &Path, dest: &Path) -> Result<()>;
    /// Remove the subtree at `path`.
    fn delete(&self, path: &Path) -> Result<()>;
}

/// Pick the primitive set for a configuration.
pub fn ops_for(cfg: &SnapConfig) -> Box<dyn VolumeOps> {
    if cfg.plain_dirs {
        Box::new(PlainDirOps)
    } else {
        Box::new(BtrfsOps::new(&cfg.btrfs_bin))
    }
}

// ---------------- btrfs ----------------

#[derive(Debug, Clone)]
pub struct BtrfsOps {
    program: PathBuf,
}

impl BtrfsOps {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, op: &'static str, args: &[&Path], target: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("subvolume").arg(op);
        for a in args {
            cmd.arg(a);
        }
        debug!("exec: {:?}", cmd);
        let status = cmd
            .status()
            .with_context(|| format!("spawn {} subvolume {}", self.program.display(), op))?;
        if !status.success() {
            return Err(SnapError::Primitive {
                op,
                target: target.display().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl VolumeOps for BtrfsOps {
    fn snapshot(&self, source: &Path, dest: &Path) -> Result<()> {
        self.run("snapshot", &[source, dest], dest)?;
        info!("btrfs: snapshot {} -> {}", source.display(), dest.display());
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.run("delete", &[path], path)?;
        info!("btrfs: deleted {}", path.display());
        Ok(())
    }
}

// ---------------- plain directories ----------------

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainDirOps;

impl VolumeOps for PlainDirOps {
    fn snapshot(&self, source: &Path, dest: &Path) -> Result<()> {
        if !source.is_dir() || fs::symlink_metadata(dest).is_ok() {
            return Err(SnapError::Primitive {
                op: "snapshot",
                target: dest.display().to_string(),
            }
            .into());
        }
        copy_tree(source, dest)
            .with_context(|| format!("copy {} -> {}", source.display(), dest.display()))?;
        debug!("plain: copied {} -> {}", source.display(), dest.display());
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(SnapError::Primitive {
                op: "delete",
                target: path.display().to_string(),
            }
            .into());
        }
        fs::remove_dir_all(path).with_context(|| format!("remove {}", path.display()))?;
        debug!("plain: removed {}", path.display());
        Ok(())
    }
}

/// Recursive copy; symlinks are recreated as symlinks, never followed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir(dst).with_context(|| format!("mkdir {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("read_dir {}", src.display()))? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let ft = entry.file_type()?;
        if ft.is_symlink() {
            let target = fs::read_link(&from)?;
            std::os::unix::fs::symlink(&target, &to)
                .with_context(|| format!("symlink {}", to.display()))?;
        } else if ft.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)
                .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch(prefix: &str) -> PathBuf {
        let t = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let p = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), t));
        fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn plain_copy_keeps_symlinks() -> Result<()> {
        let root = scratch("aptsnap-ops");
        let src = root.join("src");
        fs::create_dir_all(src.join("etc"))?;
        fs::write(src.join("etc/hostname"), "box\n")?;
        std::os::unix::fs::symlink("../../elsewhere", src.join("etc/link"))?;

        PlainDirOps.snapshot(&src, &root.join("dst"))?;
        assert_eq!(fs::read_to_string(root.join("dst/etc/hostname"))?, "box\n");
        assert_eq!(
            fs::read_link(root.join("dst/etc/link"))?,
            PathBuf::from("../../elsewhere")
        );

        PlainDirOps.delete(&root.join("dst"))?;
        assert!(!root.join("dst").exists());
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn btrfs_spawn_failure_names_the_tool() -> Result<()> {
        let root = scratch("aptsnap-ops-btrfs");
        let ops = BtrfsOps::new(root.join("no-such-btrfs"));
        let err = ops.delete(&root.join("x")).unwrap_err();
        assert!(format!("{:#}", err).contains("no-such-btrfs subvolume delete"));
        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn plain_refuses_existing_destination() -> Result<()> {
        let root = scratch("aptsnap-ops-dst");
        fs::create_dir_all(root.join("a"))?;
        fs::create_dir_all(root.join("b"))?;
        let err = PlainDirOps.snapshot(&root.join("a"), &root.join("b")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapError>(),
            Some(SnapError::Primitive { op: "snapshot", .. })
        ));
        fs::remove_dir_all(&root)?;
        Ok(())
    }
}
