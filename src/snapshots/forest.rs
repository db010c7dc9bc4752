//! Forest: every snapshot of one volume plus the parent/children cache.
//!
//! The parent links inside the snapshots are the only source of truth. `load()`
//! scans the volume root once and resolves every link; the maps built from that
//! live for the process and are updated in lock-step with each link write.
//! A link that is missing or points at an unknown name makes the node an orphan.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::name::Snapshot;
use crate::changes::ChangeSet;
use crate::consts::{ROOT_NAME, SNAP_PREFIX};
use crate::util::now_local;

pub struct Forest {
    root: PathBuf,
    loaded_at: NaiveDateTime,
    nodes: HashMap<String, Snapshot>,
    parents: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
    orphans: Vec<String>,
    // unordered pair -> common ancestor; dropped on every mutation
    ancestor_memo: RefCell<HashMap<(String, String), Option<String>>>,
}

impl Forest {
    /// Full scan of `volume_root` and link resolution.
    pub fn load(volume_root: &Path) -> Result<Self> {
        let now = now_local();
        let mut nodes = HashMap::new();

        let rd = fs::read_dir(volume_root)
            .with_context(|| format!("read volume root {}", volume_root.display()))?;
        for entry in rd {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.path().is_dir() {
                continue;
            }
            if name == ROOT_NAME {
                nodes.insert(name, Snapshot::root(now));
            } else if name.starts_with(SNAP_PREFIX) {
                match Snapshot::parse(&name) {
                    Some(s) => {
                        nodes.insert(name, s);
                    }
                    None => warn!("skipping badly named snapshot directory '{}'", name),
                }
            }
        }

        let mut forest = Self {
            root: volume_root.to_path_buf(),
            loaded_at: now,
            nodes,
            parents: HashMap::new(),
            children: HashMap::new(),
            orphans: Vec::new(),
            ancestor_memo: RefCell::new(HashMap::new()),
        };
        forest.resolve_links();
        debug!(
            "forest: {} node(s), {} orphan(s) under {}",
            forest.nodes.len(),
            forest.orphans.len(),
            volume_root.display()
        );
        Ok(forest)
    }

    fn resolve_links(&mut self) {
        let mut names: Vec<String> = self.nodes.keys().cloned().collect();
        names.sort();
        for name in names {
            let target = self.nodes[&name].read_parent_link(&self.root);
            match target {
                Some(p) if p != name && self.nodes.contains_key(&p) => {
                    self.children.entry(p.clone()).or_default().push(name.clone());
                    self.parents.insert(name, p);
                }
                Some(p) => {
                    debug!("forest: '{}' links to unknown '{}', treated as orphan", name, p);
                    self.orphans.push(name);
                }
                None => self.orphans.push(name),
            }
        }
        let keys: Vec<String> = self.children.keys().cloned().collect();
        for k in keys {
            self.sort_children(&k);
        }
    }

    fn sort_children(&mut self, name: &str) {
        let nodes = &self.nodes;
        if let Some(list) = self.children.get_mut(name) {
            list.sort_by(|a, b| {
                let da = nodes.get(a).map(|s| s.date());
                let db = nodes.get(b).map(|s| s.date());
                da.cmp(&db).then_with(|| a.cmp(b))
            });
        }
    }

    pub fn volume_root(&self) -> &Path {
        &self.root
    }

    /// Wall-clock time of the scan; also the date of `@`.
    pub fn loaded_at(&self) -> NaiveDateTime {
        self.loaded_at
    }

    pub fn get(&self, name: &str) -> Option<&Snapshot> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn root_node(&self) -> Option<&Snapshot> {
        self.nodes.get(ROOT_NAME)
    }

    /// All nodes including `@`, oldest first.
    pub fn nodes(&self) -> Vec<&Snapshot> {
        let mut v: Vec<&Snapshot> = self.nodes.values().collect();
        v.sort_by(|a, b| a.date().cmp(&b.date()).then_with(|| a.name().cmp(b.name())));
        v
    }

    /// Prefixed snapshots (no `@`), oldest first.
    pub fn snapshots(&self) -> Vec<&Snapshot> {
        self.nodes().into_iter().filter(|s| !s.is_root()).collect()
    }

    /// Prefixed snapshots created before `cutoff`, oldest first.
    pub fn older_than(&self, cutoff: NaiveDateTime) -> Vec<&Snapshot> {
        self.snapshots().into_iter().filter(|s| s.date() < cutoff).collect()
    }

    pub fn parent_of(&self, name: &str) -> Option<&Snapshot> {
        self.parents.get(name).and_then(|p| self.nodes.get(p))
    }

    /// Children oldest first.
    pub fn children_of(&self, name: &str) -> Vec<&Snapshot> {
        self.children
            .get(name)
            .map(|l| l.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn child_count(&self, name: &str) -> usize {
        self.children.get(name).map(|l| l.len()).unwrap_or(0)
    }

    pub fn orphans(&self) -> &[String] {
        &self.orphans
    }

    /// `name` followed by its ancestors, stopping at an orphan or a repeated node.
    pub fn lineage(&self, name: &str) -> Vec<&Snapshot> {
        let mut out: Vec<&Snapshot> = Vec::new();
        let mut cur = self.nodes.get(name);
        while let Some(s) = cur {
            if out.iter().any(|o| o.name() == s.name()) {
                warn!("forest: parent links of '{}' loop back to '{}'", name, s.name());
                break;
            }
            out.push(s);
            cur = self.parent_of(s.name());
        }
        out
    }

    /// Stored ChangeSet of `name` (None = unknown).
    pub fn changes_of(&self, name: &str) -> Option<ChangeSet> {
        self.nodes.get(name)?.load_changes(&self.root)
    }

    /// Nearest node reachable from both `x` and `y` by following parents.
    ///
    /// The chronologically younger candidate climbs first; names break ties so
    /// the walk is the same whichever order the arguments come in.
    pub fn first_common_ancestor(&self, x: &str, y: &str) -> Option<String> {
        let key = if x <= y {
            (x.to_string(), y.to_string())
        } else {
            (y.to_string(), x.to_string())
        };
        if let Some(hit) = self.ancestor_memo.borrow().get(&key) {
            return hit.clone();
        }
        let found = self.climb_to_common(x, y);
        self.ancestor_memo.borrow_mut().insert(key, found.clone());
        found
    }

    fn climb_to_common(&self, x: &str, y: &str) -> Option<String> {
        let mut a = self.nodes.get(x)?;
        let mut b = self.nodes.get(y)?;
        // each step moves one candidate up; more than 2*n steps means a link loop
        let mut budget = 2 * self.nodes.len() + 2;
        while a.name() != b.name() {
            if budget == 0 {
                warn!("forest: parent links loop while looking for '{}' and '{}'", x, y);
                return None;
            }
            budget -= 1;
            let a_younger = (a.date(), a.name()) > (b.date(), b.name());
            if a_younger {
                a = self.parent_of(a.name())?;
            } else {
                b = self.parent_of(b.name())?;
            }
        }
        Some(a.name().to_string())
    }

    // ---------------- mutations (link file + cache together) ----------------

    /// Re-point (or clear) the parent link of `child`.
    pub fn set_parent(&mut self, child: &str, parent: Option<&str>) -> Result<()> {
        let node = self
            .nodes
            .get(child)
            .ok_or_else(|| anyhow!("set_parent: unknown snapshot '{}'", child))?;
        if let Some(p) = parent {
            if !self.nodes.contains_key(p) {
                return Err(anyhow!("set_parent: unknown parent '{}' for '{}'", p, child));
            }
        }
        node.write_parent_link(&self.root, parent)
            .with_context(|| format!("link '{}' to {:?}", child, parent))?;

        self.detach_from_parent(child);
        self.orphans.retain(|o| o != child);
        match parent {
            Some(p) => {
                self.parents.insert(child.to_string(), p.to_string());
                self.children.entry(p.to_string()).or_default().push(child.to_string());
                self.sort_children(p);
            }
            None => self.orphans.push(child.to_string()),
        }
        self.ancestor_memo.borrow_mut().clear();
        debug!("forest: '{}' -> parent {:?}", child, parent);
        Ok(())
    }

    fn detach_from_parent(&mut self, child: &str) {
        if let Some(old) = self.parents.remove(child) {
            if let Some(list) = self.children.get_mut(&old) {
                list.retain(|c| c != child);
                if list.is_empty() {
                    self.children.remove(&old);
                }
            }
        }
    }

    pub fn set_changes(&self, name: &str, changes: Option<&ChangeSet>) -> Result<()> {
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| anyhow!("set_changes: unknown snapshot '{}'", name))?;
        node.store_changes(&self.root, changes)
            .with_context(|| format!("store changes of '{}'", name))
    }

    /// Register a directory that already exists under the volume root.
    pub fn insert(&mut self, snap: Snapshot, parent: Option<&str>) -> Result<()> {
        let name = snap.name().to_string();
        if !snap.dir(&self.root).is_dir() {
            return Err(anyhow!("insert: {} is not a directory", snap.dir(&self.root).display()));
        }
        self.nodes.insert(name.clone(), snap);
        self.orphans.push(name.clone());
        self.set_parent(&name, parent)
    }

    /// Drop `name` from the cache. Its children must already be re-linked.
    pub fn forget(&mut self, name: &str) {
        self.detach_from_parent(name);
        if let Some(rest) = self.children.remove(name) {
            // should not happen: callers move children first
            for c in rest {
                warn!("forest: '{}' lost its parent '{}', now an orphan", c, name);
                self.parents.remove(&c);
                self.orphans.push(c);
            }
        }
        self.orphans.retain(|o| o != name);
        self.nodes.remove(name);
        self.ancestor_memo.borrow_mut().clear();
    }

    /// Rename the directory of `old` to `new_name` and rewrite every child's link.
    pub fn rename_node(&mut self, old: &str, new_name: &str) -> Result<Snapshot> {
        let now = self.loaded_at;
        let renamed = Snapshot::from_name(new_name, now)
            .ok_or_else(|| anyhow!("rename: '{}' is not a valid snapshot name", new_name))?;
        if !self.nodes.contains_key(old) {
            return Err(anyhow!("rename: unknown snapshot '{}'", old));
        }
        let from = self.root.join(old);
        let to = self.root.join(new_name);
        fs::rename(&from, &to)
            .with_context(|| format!("rename {} -> {}", from.display(), to.display()))?;

        let parent = self.parents.get(old).cloned();
        let kids = self.children.get(old).cloned().unwrap_or_default();
        self.detach_from_parent(old);
        self.children.remove(old);
        self.nodes.remove(old);
        let was_orphan = self.orphans.iter().any(|o| o == old);
        self.orphans.retain(|o| o != old);

        self.nodes.insert(new_name.to_string(), renamed.clone());
        if was_orphan {
            self.orphans.push(new_name.to_string());
        }
        if let Some(p) = parent {
            self.parents.insert(new_name.to_string(), p.clone());
            self.children.entry(p.clone()).or_default().push(new_name.to_string());
            self.sort_children(&p);
        }
        self.ancestor_memo.borrow_mut().clear();

        for kid in kids {
            self.set_parent(&kid, Some(new_name))?;
        }
        debug!("forest: renamed '{}' -> '{}'", old, new_name);
        Ok(renamed)
    }
}
