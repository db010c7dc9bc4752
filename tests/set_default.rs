// set-default / rollback: staging copy, backup of the old root, link rewiring.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};

use aptsnap::config::SnapConfig;
use aptsnap::error::SnapError;
use aptsnap::snapshots::SnapshotManager;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("aptsnap-default-{prefix}-{pid}-{t}-{id}"))
}

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, 8, d)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn snap(d: u32) -> String {
    format!("@apt-snapshot-{}", day(d).format("%Y-%m-%d_%H:%M:%S"))
}

fn mk_node(root: &Path, name: &str, parent: Option<&str>) -> Result<()> {
    let etc = root.join(name).join("etc");
    fs::create_dir_all(&etc)?;
    fs::write(etc.join("hostname"), format!("{}\n", name))?;
    if let Some(p) = parent {
        std::os::unix::fs::symlink(format!("../../{}", p), etc.join("apt-btrfs-parent"))?;
    }
    Ok(())
}

fn open(root: &Path) -> Result<SnapshotManager> {
    let cfg = SnapConfig::default()
        .with_mountpoint(Some(root))
        .with_var_location(root.join("no-var"))
        .with_plain_dirs(true)
        .build();
    SnapshotManager::open(cfg, root)
}

/// @ -> S1 -> S2 -> S3 -> S4 (S4 oldest)
fn linear_chain(root: &Path) -> Result<()> {
    mk_node(root, &snap(1), None)?;
    mk_node(root, &snap(2), Some(&snap(1)))?;
    mk_node(root, &snap(3), Some(&snap(2)))?;
    mk_node(root, &snap(4), Some(&snap(3)))?;
    mk_node(root, "@", Some(&snap(4)))?;
    Ok(())
}

fn parent(m: &SnapshotManager, name: &str) -> Option<String> {
    m.forest().parent_of(name).map(|p| p.name().to_string())
}

#[test]
fn rollback_past_the_oldest_ancestor_fails() -> Result<()> {
    let root = unique_root("rollback-deep");
    linear_chain(&root)?;

    let mut m = open(&root)?;
    let err = m.rollback(5, None).unwrap_err();
    assert_eq!(
        err.downcast_ref::<SnapError>(),
        Some(&SnapError::RollbackDepthExceeded {
            requested: 5,
            available: 4
        })
    );
    assert!(m.rollback(0, None).is_err());
    // nothing moved
    assert_eq!(parent(&m, "@"), Some(snap(4)));
    assert_eq!(m.list().len(), 4);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn rollback_swaps_in_a_copy_of_the_ancestor() -> Result<()> {
    let root = unique_root("rollback");
    linear_chain(&root)?;

    let mut m = open(&root)?;
    let (target, backup) = m.rollback(4, Some("broken"))?;
    assert_eq!(target, snap(1));
    assert!(backup.ends_with("-broken"));

    assert_eq!(parent(&m, "@"), Some(snap(1)));
    assert_eq!(parent(&m, &backup), Some(snap(4)));
    assert_eq!(fs::read_to_string(root.join("@/etc/hostname"))?, format!("{}\n", snap(1)));
    assert_eq!(fs::read_to_string(root.join(&backup).join("etc/hostname"))?, "@\n");
    assert!(!root.join("@apt-btrfs-staging").exists());
    // the target itself is untouched
    assert!(root.join(snap(1)).is_dir());

    // the displaced root keeps what it had changed; the new root starts fresh
    assert!(m.forest().changes_of(&backup).is_some());
    assert!(m.forest().changes_of("@").is_none());

    let m2 = open(&root)?;
    assert_eq!(parent(&m2, "@"), Some(snap(1)));
    assert_eq!(parent(&m2, &backup), Some(snap(4)));
    assert_eq!(m2.list().len(), 5);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn set_default_refuses_occupied_staging() -> Result<()> {
    let root = unique_root("staging");
    linear_chain(&root)?;
    fs::create_dir_all(root.join("@apt-btrfs-staging"))?;

    let mut m = open(&root)?;
    let err = m.set_default(&snap(2), None).unwrap_err();
    assert_eq!(
        err.downcast_ref::<SnapError>(),
        Some(&SnapError::StagingConflict(root.join("@apt-btrfs-staging")))
    );
    assert_eq!(parent(&m, "@"), Some(snap(4)));
    assert_eq!(fs::read_to_string(root.join("@/etc/hostname"))?, "@\n");

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn set_default_requires_an_existing_snapshot() -> Result<()> {
    let root = unique_root("notfound");
    linear_chain(&root)?;
    fs::create_dir_all(root.join("@home"))?;

    let mut m = open(&root)?;
    for bad in ["@home", "@", "@apt-snapshot-2001-01-01_00:00:00"] {
        let err = m.set_default(bad, None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SnapError>(),
            Some(&SnapError::NotFound(bad.to_string()))
        );
    }

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn set_default_to_a_side_branch() -> Result<()> {
    let root = unique_root("branch");
    linear_chain(&root)?;

    let mut m = open(&root)?;
    let first = m.set_default(&snap(2), None)?;
    // same second: the second backup gets the next free timestamp
    let second = m.set_default(&snap(3), None)?;
    assert_ne!(first, second);

    assert_eq!(parent(&m, "@"), Some(snap(3)));
    assert_eq!(parent(&m, &second), Some(snap(2)));
    assert_eq!(parent(&m, &first), Some(snap(4)));
    let kids: Vec<String> = m
        .forest()
        .children_of(&snap(2))
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(kids, vec![snap(3), second]);

    fs::remove_dir_all(&root)?;
    Ok(())
}
