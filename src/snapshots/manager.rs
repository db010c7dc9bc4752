//! Snapshot manager: the operations exposed to the CLI.
//!
//! Owns one loaded `Forest`, the configuration and the volume primitives.
//! Every mutation keeps two things in step:
//! - parent links (persisted + cached, via the Forest),
//! - per-node ChangeSets (what happened between a node and its parent).
//!
//! Ordering rules:
//! - create/set_default: the primitive runs before any link is touched.
//! - delete: children are re-linked and their histories merged before the
//!   primitive removes the directory; a failing delete leaves the corrected
//!   topology and a stale directory, reported as an error.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDateTime};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use super::forest::Forest;
use super::name::{is_snapshot_name, normalize_tag, Snapshot};
use crate::changes::ChangeSet;
use crate::config::SnapConfig;
use crate::consts::{APT_ARCHIVES, ROOT_NAME, STAGING_NAME};
use crate::error::SnapError;
use crate::history::DpkgHistory;
use crate::ops::{ops_for, VolumeOps};
use crate::tree;
use crate::util::now_local;

/// Result of `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    /// Untagged request while the newest snapshot is younger than the throttle window.
    Throttled { newest: String, age_secs: i64 },
}

/// `@`'s live package changes since its parent (or the history window).
#[derive(Debug, Clone)]
pub struct Status {
    pub parent: Option<Snapshot>,
    pub since: NaiveDateTime,
    pub changes: ChangeSet,
}

#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub snapshot: Snapshot,
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// Stored set for snapshots, the live status for `@`. None = unknown.
    pub changes: Option<ChangeSet>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    /// Branch points and tagged snapshots are kept.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DeleteReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

fn checked_tag(tag: Option<&str>) -> Result<Option<&str>> {
    match tag {
        Some(t) => Ok(normalize_tag(t)?),
        None => Ok(None),
    }
}

/// `now` minus `days`, saturating at the earliest representable time.
fn history_start(now: NaiveDateTime, days: i64) -> NaiveDateTime {
    Duration::try_days(days.max(0))
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(NaiveDateTime::MIN)
}

pub struct SnapshotManager {
    cfg: SnapConfig,
    forest: Forest,
    ops: Box<dyn VolumeOps>,
}

impl SnapshotManager {
    /// Load the forest under `volume_root` with the primitives chosen by `cfg`.
    pub fn open(cfg: SnapConfig, volume_root: &Path) -> Result<Self> {
        let ops = ops_for(&cfg);
        Self::with_ops(cfg, volume_root, ops)
    }

    pub fn with_ops(cfg: SnapConfig, volume_root: &Path, ops: Box<dyn VolumeOps>) -> Result<Self> {
        let forest = Forest::load(volume_root)?;
        Ok(Self { cfg, forest, ops })
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn config(&self) -> &SnapConfig {
        &self.cfg
    }

    /// Drop the cached forest and scan the volume again.
    pub fn reload(&mut self) -> Result<()> {
        self.forest = Forest::load(self.forest.volume_root())?;
        Ok(())
    }

    fn root_path(&self) -> PathBuf {
        self.forest.volume_root().to_path_buf()
    }

    fn require_root(&self) -> Result<()> {
        if self.forest.root_node().is_none() {
            return Err(anyhow!(
                "no '{}' subvolume under {}",
                ROOT_NAME,
                self.forest.volume_root().display()
            ));
        }
        Ok(())
    }

    fn require_snapshot(&self, name: &str) -> Result<Snapshot> {
        if !is_snapshot_name(name) {
            return Err(SnapError::NotFound(name.to_string()).into());
        }
        self.forest
            .get(name)
            .cloned()
            .ok_or_else(|| SnapError::NotFound(name.to_string()).into())
    }

    /// First free snapshot name at or after `date`, one second at a time.
    fn unique_name(&self, date: NaiveDateTime, tag: Option<&str>) -> String {
        let root = self.forest.volume_root();
        let mut d = date;
        loop {
            let name = Snapshot::make_name(d, tag);
            if !self.forest.contains(&name) && fs::symlink_metadata(root.join(&name)).is_err() {
                return name;
            }
            d += Duration::seconds(1);
        }
    }

    // ---------------- queries ----------------

    pub fn status(&self) -> Status {
        let parent = self.forest.parent_of(ROOT_NAME).cloned();
        let since = match &parent {
            Some(p) => p.date(),
            None => history_start(now_local(), self.cfg.history_days),
        };
        let changes = DpkgHistory::new(&self.cfg.var_location, since, &self.cfg.native_arch).changes();
        Status {
            parent,
            since,
            changes,
        }
    }

    /// Prefixed snapshots, oldest first.
    pub fn list(&self) -> Vec<Snapshot> {
        self.forest.snapshots().into_iter().cloned().collect()
    }

    pub fn list_older_than(&self, cutoff: NaiveDateTime) -> Vec<Snapshot> {
        self.forest.older_than(cutoff).into_iter().cloned().collect()
    }

    pub fn show(&self, name: &str) -> Result<SnapshotInfo> {
        let snapshot = if name == ROOT_NAME {
            self.require_root()?;
            self.forest.root_node().cloned().ok_or_else(|| anyhow!("no '@'"))?
        } else {
            self.require_snapshot(name)?
        };
        let changes = if snapshot.is_root() {
            Some(self.status().changes)
        } else {
            self.forest.changes_of(name)
        };
        Ok(SnapshotInfo {
            parent: self.forest.parent_of(name).map(|p| p.name().to_string()),
            children: self
                .forest
                .children_of(name)
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            snapshot,
            changes,
        })
    }

    /// Up to `n` nodes walking parents from `from` (inclusive).
    pub fn recent(&self, n: usize, from: &str) -> Result<Vec<(Snapshot, Option<ChangeSet>)>> {
        if !self.forest.contains(from) {
            return Err(SnapError::NotFound(from.to_string()).into());
        }
        let mut out = Vec::new();
        for s in self.forest.lineage(from).into_iter().take(n) {
            let changes = if s.is_root() {
                Some(self.status().changes)
            } else {
                self.forest.changes_of(s.name())
            };
            out.push((s.clone(), changes));
        }
        Ok(out)
    }

    pub fn tree(&self) -> String {
        let live = self.forest.root_node().map(|_| self.status().changes);
        tree::render(&self.forest, live.as_ref())
    }

    // ---------------- mutations ----------------

    /// Snapshot `@` into a new timestamped node and make it `@`'s parent.
    pub fn create(&mut self, tag: Option<&str>) -> Result<CreateOutcome> {
        let tag = checked_tag(tag)?;
        self.require_root()?;
        let now = now_local();

        if tag.is_none() && self.cfg.throttle_secs > 0 {
            if let Some(newest) = self.forest.snapshots().last() {
                let age = (now - newest.date()).num_seconds();
                if age < self.cfg.throttle_secs as i64 {
                    debug!("create: '{}' is {}s old, throttled", newest.name(), age);
                    return Ok(CreateOutcome::Throttled {
                        newest: newest.name().to_string(),
                        age_secs: age,
                    });
                }
            }
        }

        let status = self.status();
        let old_parent = status.parent.as_ref().map(|p| p.name().to_string());
        let name = self.unique_name(now, tag);
        let root = self.root_path();
        self.ops
            .snapshot(&root.join(ROOT_NAME), &root.join(&name))
            .with_context(|| format!("create snapshot '{}'", name))?;

        let snap = Snapshot::parse(&name).ok_or_else(|| anyhow!("bad generated name '{}'", name))?;
        self.forest.insert(snap, old_parent.as_deref())?;
        self.forest.set_changes(&name, Some(&status.changes))?;
        self.forest.set_parent(ROOT_NAME, Some(&name))?;
        // the live status of @ is always recomputed; a copied blob would be stale
        self.forest.set_changes(ROOT_NAME, None)?;
        info!("created snapshot '{}' (parent {:?})", name, old_parent);
        Ok(CreateOutcome::Created(name))
    }

    /// Make a copy of `target` the new `@`; the old `@` is kept as a backup.
    /// Returns the backup's name.
    pub fn set_default(&mut self, target: &str, tag: Option<&str>) -> Result<String> {
        let tag = checked_tag(tag)?;
        self.require_snapshot(target)?;
        self.require_root()?;
        let root = self.root_path();
        let staging = root.join(STAGING_NAME);
        if fs::symlink_metadata(&staging).is_ok() {
            return Err(SnapError::StagingConflict(staging).into());
        }

        let status = self.status();
        self.forest.set_changes(ROOT_NAME, Some(&status.changes))?;
        let old_parent = status.parent.as_ref().map(|p| p.name().to_string());

        self.ops
            .snapshot(&root.join(target), &staging)
            .with_context(|| format!("stage '{}'", target))?;

        let backup = self.unique_name(now_local(), tag);
        self.forest.rename_node(ROOT_NAME, &backup)?;
        fs::rename(&staging, root.join(ROOT_NAME)).with_context(|| {
            format!("rename {} -> {}", staging.display(), root.join(ROOT_NAME).display())
        })?;

        let new_root = Snapshot::root(self.forest.loaded_at());
        self.forest.insert(new_root, Some(target))?;
        self.forest.set_changes(ROOT_NAME, None)?;
        self.forest.set_parent(&backup, old_parent.as_deref())?;
        info!("default is now a copy of '{}', previous root kept as '{}'", target, backup);
        Ok(backup)
    }

    /// Go back `count` parents from `@` and set that snapshot as default.
    /// Returns (target, backup).
    pub fn rollback(&mut self, count: usize, tag: Option<&str>) -> Result<(String, String)> {
        if count == 0 {
            return Err(anyhow!("rollback needs at least one step"));
        }
        self.require_root()?;
        let mut cur = ROOT_NAME.to_string();
        for step in 0..count {
            match self.forest.parent_of(&cur) {
                Some(p) => cur = p.name().to_string(),
                None => {
                    return Err(SnapError::RollbackDepthExceeded {
                        requested: count,
                        available: step,
                    }
                    .into())
                }
            }
        }
        let backup = self.set_default(&cur, tag)?;
        Ok((cur, backup))
    }

    /// Remove one snapshot, splicing its children onto its parent.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.require_snapshot(name)?;
        let parent = self.forest.parent_of(name).map(|p| p.name().to_string());
        let children: Vec<String> = self
            .forest
            .children_of(name)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let h_old = self.forest.changes_of(name);

        for child in &children {
            self.forest.set_parent(child, parent.as_deref())?;
            if let Some(old) = &h_old {
                // unknown stays unknown: a gap is never papered over
                let merged = self.forest.changes_of(child).map(|new| old.merge(&new));
                self.forest.set_changes(child, merged.as_ref())?;
            }
        }

        self.forest.forget(name);
        let dir = self.forest.volume_root().join(name);
        self.ops
            .delete(&dir)
            .with_context(|| format!("delete snapshot '{}'", name))?;
        info!(
            "deleted '{}' ({} child(ren) moved to {:?})",
            name,
            children.len(),
            parent
        );
        Ok(())
    }

    /// Delete a leaf and then each ancestor left without children.
    pub fn prune(&mut self, name: &str) -> Result<Vec<String>> {
        self.require_snapshot(name)?;
        let kids = self.forest.child_count(name);
        if kids > 0 {
            return Err(SnapError::NotLeaf {
                name: name.to_string(),
                children: kids,
            }
            .into());
        }

        let mut gone = Vec::new();
        let mut cur = name.to_string();
        loop {
            let parent = self.forest.parent_of(&cur).map(|p| p.name().to_string());
            self.delete(&cur)?;
            gone.push(cur);
            match parent {
                Some(p) if is_snapshot_name(&p) && self.forest.child_count(&p) == 0 => cur = p,
                _ => break,
            }
        }
        Ok(gone)
    }

    /// Delete snapshots older than `cutoff`, newest first. Branch points and
    /// tagged snapshots are skipped; one failure does not stop the sweep.
    pub fn delete_older_than(&mut self, cutoff: NaiveDateTime) -> DeleteReport {
        let names: Vec<String> = self
            .forest
            .older_than(cutoff)
            .iter()
            .rev()
            .map(|s| s.name().to_string())
            .collect();

        let mut report = DeleteReport::default();
        for name in names {
            let Some(snap) = self.forest.get(&name) else {
                continue;
            };
            if self.forest.child_count(&name) >= 2 || !snap.tag().is_empty() {
                report.skipped.push(name);
                continue;
            }
            match self.delete(&name) {
                Ok(()) => report.deleted.push(name),
                Err(e) => {
                    warn!("delete-older-than: '{}': {:#}", name, e);
                    report.failed.push((name, format!("{:#}", e)));
                }
            }
        }
        report
    }

    /// Replace the tag of `name`; an empty suffix removes it. Returns the new name.
    pub fn tag(&mut self, name: &str, suffix: &str) -> Result<String> {
        let snap = self.require_snapshot(name)?;
        let suffix = normalize_tag(suffix)?;
        let new_name = Snapshot::make_name(snap.date(), suffix);
        if new_name == name {
            return Ok(new_name);
        }
        if self.forest.contains(&new_name)
            || fs::symlink_metadata(self.forest.volume_root().join(&new_name)).is_ok()
        {
            return Err(SnapError::NameTaken(new_name).into());
        }
        self.forest.rename_node(name, &new_name)?;
        info!("renamed '{}' -> '{}'", name, new_name);
        Ok(new_name)
    }

    /// Remove cached .deb files from every node's apt archive. Returns the count.
    pub fn clean(&self) -> Result<usize> {
        let root = self.forest.volume_root();
        let mut removed = 0usize;
        for node in self.forest.nodes() {
            let archives = node.dir(root).join("var").join(APT_ARCHIVES);
            let Ok(rd) = fs::read_dir(&archives) else {
                continue;
            };
            for entry in rd {
                let path = entry?.path();
                let is_deb = path.extension().map(|e| e == "deb").unwrap_or(false);
                if is_deb && path.is_file() {
                    fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
                    removed += 1;
                }
            }
            debug!("clean: {} done", archives.display());
        }
        Ok(removed)
    }

    /// Link snapshots made before parent tracking existed, oldest to newest,
    /// and hang `@` under the newest. Returns the number of links written.
    pub fn convert(&mut self) -> Result<usize> {
        let root = self.root_path();
        if let Some(linked) = self
            .forest
            .nodes()
            .into_iter()
            .find(|s| s.read_parent_link(&root).is_some())
        {
            return Err(anyhow!(
                "'{}' already has a parent link, the volume is already converted",
                linked.name()
            ));
        }

        let chain: Vec<Snapshot> = self.list();
        let mut links = 0usize;
        let mut previous: Option<Snapshot> = None;
        for snap in &chain {
            if let Some(prev) = &previous {
                self.forest.set_parent(snap.name(), Some(prev.name()))?;
                let var = snap.dir(&root).join("var");
                let changes = DpkgHistory::new(&var, prev.date(), &self.cfg.native_arch).changes();
                self.forest.set_changes(snap.name(), Some(&changes))?;
                links += 1;
            }
            previous = Some(snap.clone());
        }
        if let Some(newest) = &previous {
            if self.forest.root_node().is_some() {
                self.forest.set_parent(ROOT_NAME, Some(newest.name()))?;
                links += 1;
            }
        }
        info!("convert: {} link(s) written", links);
        Ok(links)
    }
}
