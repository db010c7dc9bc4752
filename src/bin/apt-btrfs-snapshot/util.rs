use anyhow::{Context, Result};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use aptsnap::config::SnapConfig;
use aptsnap::lock::{acquire_lock, try_acquire_lock, LockGuard, LockMode};
use aptsnap::mount::VolumeRoot;
use aptsnap::snapshots::SnapshotManager;

/// Env config with the `--mountpoint` flag applied on top.
pub fn config(mountpoint: Option<PathBuf>) -> SnapConfig {
    let cfg = SnapConfig::from_env();
    match mountpoint {
        Some(mp) => cfg.with_mountpoint(Some(mp)).build(),
        None => cfg.build(),
    }
}

/// Mounted volume + lock + loaded forest for one command.
/// Fields drop top to bottom: the manager first, the mount last.
pub struct Session {
    pub manager: SnapshotManager,
    _lock: Option<LockGuard>,
    _volume: VolumeRoot,
}

pub fn open(cfg: SnapConfig, mode: LockMode) -> Result<Session> {
    log::debug!("{}", cfg);
    let volume = VolumeRoot::open(&cfg)?;
    let lock = if cfg.lock {
        Some(lock_volume(&volume, mode)?)
    } else {
        None
    };
    let manager = SnapshotManager::open(cfg, volume.path())
        .with_context(|| format!("load snapshots under {}", volume.path().display()))?;
    Ok(Session {
        manager,
        _lock: lock,
        _volume: volume,
    })
}

/// Take the volume lock, telling the user when another instance makes us wait.
fn lock_volume(volume: &VolumeRoot, mode: LockMode) -> Result<LockGuard> {
    if let Some(g) = try_acquire_lock(volume.path(), mode)? {
        return Ok(g);
    }
    eprintln!(
        "Another apt-btrfs-snapshot is working on {}, waiting for it to finish...",
        volume.path().display()
    );
    acquire_lock(volume.path(), mode)
}

/// Ask for a tag when none was given and a person is at the terminal.
pub fn tag_or_prompt(tag: Option<String>, what: &str) -> Result<Option<String>> {
    if tag.is_some() || !std::io::stdin().is_terminal() {
        return Ok(tag);
    }
    print!("Tag for {} (empty for none): ", what);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let t = line.trim();
    Ok(if t.is_empty() { None } else { Some(t.to_string()) })
}
