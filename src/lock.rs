//! Advisory locking of the snapshot volume.
//!
//! Cross-platform (fs2) advisory locks on `<volume root>/.apt-btrfs-snapshot.lock`:
//! - Exclusive: any command that rewrites parent links, changes blobs or subvolumes.
//! - Shared: read-only commands (list, show, tree, status).
//!
//! Two tool instances on the same volume therefore serialize instead of racing on
//! the link files or the staging directory. Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::consts::LOCK_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
    mode: LockMode,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // unlock errors on drop are ignored, the fd is closed right after anyway.
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn lock_file_path(volume_root: &Path) -> PathBuf {
    volume_root.join(LOCK_FILE)
}

fn open_lock_file(volume_root: &Path) -> Result<std::fs::File> {
    let path = lock_file_path(volume_root);
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))
}

/// Acquire a lock in the requested mode. Blocks until acquired.
pub fn acquire_lock(volume_root: &Path, mode: LockMode) -> Result<LockGuard> {
    let file = open_lock_file(volume_root)?;
    let path = lock_file_path(volume_root);
    match mode {
        LockMode::Shared => FileExt::lock_shared(&file)
            .with_context(|| format!("lock_shared {}", path.display()))?,
        LockMode::Exclusive => FileExt::lock_exclusive(&file)
            .with_context(|| format!("lock_exclusive {}", path.display()))?,
    }
    log::debug!("lock: {:?} lock taken on {}", mode, path.display());
    Ok(LockGuard { file, path, mode })
}

/// Non-blocking variant: Ok(None) while another process holds a conflicting lock.
pub fn try_acquire_lock(volume_root: &Path, mode: LockMode) -> Result<Option<LockGuard>> {
    let file = open_lock_file(volume_root)?;
    let path = lock_file_path(volume_root);
    // fs2 трейт явно: у std::fs::File есть одноимённые inherent-методы
    let res = match mode {
        LockMode::Shared => FileExt::try_lock_shared(&file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
    };
    match res {
        Ok(()) => Ok(Some(LockGuard { file, path, mode })),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            log::debug!("lock: {} is held elsewhere", path.display());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("try_lock {}", path.display())),
    }
}
