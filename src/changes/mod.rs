//! ChangeSet — net package changes between two points of the snapshot history.
//!
//! Five lists of `(package, version)` pairs. `version` is a single version for
//! install/auto-install/remove/purge and `"<old>, <new>"` for upgrade. Lists are
//! kept sorted by package name once final.
//!
//! Persisted per snapshot as JSON (see snapshots::node). A missing ChangeSet
//! means "unknown", which is different from an empty one.

pub mod net;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::util::wrap_list;
use net::{EventKind, NetChange, PackageEvent, PackageTrail};

pub type PackageVersion = (String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkgOp {
    Install,
    AutoInstall,
    Upgrade,
    Remove,
    Purge,
}

impl PkgOp {
    pub const ALL: [PkgOp; 5] = [
        PkgOp::Install,
        PkgOp::AutoInstall,
        PkgOp::Upgrade,
        PkgOp::Remove,
        PkgOp::Purge,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PkgOp::Install => "install",
            PkgOp::AutoInstall => "auto-install",
            PkgOp::Upgrade => "upgrade",
            PkgOp::Remove => "remove",
            PkgOp::Purge => "purge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Start of the span this set covers; only needed to order merges.
    pub since: NaiveDateTime,
    #[serde(default)]
    pub install: Vec<PackageVersion>,
    #[serde(default, rename = "auto-install")]
    pub auto_install: Vec<PackageVersion>,
    #[serde(default)]
    pub upgrade: Vec<PackageVersion>,
    #[serde(default)]
    pub remove: Vec<PackageVersion>,
    #[serde(default)]
    pub purge: Vec<PackageVersion>,
}

impl ChangeSet {
    pub fn empty(since: NaiveDateTime) -> Self {
        Self {
            since,
            install: Vec::new(),
            auto_install: Vec::new(),
            upgrade: Vec::new(),
            remove: Vec::new(),
            purge: Vec::new(),
        }
    }

    pub fn get(&self, op: PkgOp) -> &[PackageVersion] {
        match op {
            PkgOp::Install => &self.install,
            PkgOp::AutoInstall => &self.auto_install,
            PkgOp::Upgrade => &self.upgrade,
            PkgOp::Remove => &self.remove,
            PkgOp::Purge => &self.purge,
        }
    }

    pub fn get_mut(&mut self, op: PkgOp) -> &mut Vec<PackageVersion> {
        match op {
            PkgOp::Install => &mut self.install,
            PkgOp::AutoInstall => &mut self.auto_install,
            PkgOp::Upgrade => &mut self.upgrade,
            PkgOp::Remove => &mut self.remove,
            PkgOp::Purge => &mut self.purge,
        }
    }

    pub fn is_empty(&self) -> bool {
        PkgOp::ALL.iter().all(|op| self.get(*op).is_empty())
    }

    /// Sort every list by package name (then version, for stable output).
    pub fn sort(&mut self) {
        for op in PkgOp::ALL {
            self.get_mut(op).sort();
        }
    }

    /// Record a consolidated outcome under the matching list.
    pub fn push_net(&mut self, package: &str, net: NetChange, auto: bool) {
        let package = package.to_string();
        match net {
            NetChange::Install(v) if auto => self.auto_install.push((package, v)),
            NetChange::Install(v) => self.install.push((package, v)),
            NetChange::Upgrade(old, new) => self.upgrade.push((package, format!("{}, {}", old, new))),
            NetChange::Remove(v) => self.remove.push((package, v)),
            NetChange::Purge(v) => self.purge.push((package, v)),
        }
    }

    /// `self + other`: the earlier set (by `since`) is replayed first and every
    /// package is re-resolved with the same precedence table as the log parser.
    pub fn merge(&self, other: &ChangeSet) -> ChangeSet {
        let (earlier, later) = if self.since < other.since {
            (self, other)
        } else {
            (other, self)
        };

        let mut order: Vec<String> = Vec::new();
        let mut trails: HashMap<String, PackageTrail> = HashMap::new();
        for set in [earlier, later] {
            for (package, ev) in set.events() {
                let trail = trails.entry(package.clone()).or_insert_with(|| {
                    order.push(package.clone());
                    PackageTrail::default()
                });
                trail.push(&ev);
            }
        }

        let mut out = ChangeSet::empty(earlier.since);
        for package in order {
            let trail = &trails[&package];
            if let Some(net) = trail.resolve() {
                out.push_net(&package, net, trail.started_auto());
            }
        }
        out.sort();
        out
    }

    /// Entries turned back into one event per package, in list order.
    fn events(&self) -> Vec<(String, PackageEvent)> {
        let mut out = Vec::new();
        for op in PkgOp::ALL {
            for (package, version) in self.get(op) {
                out.push((package.clone(), entry_event(op, version)));
            }
        }
        out
    }

    /// Short summary used in the tree: `none` or e.g. `+3 ^1 -2`.
    pub fn brief(&self) -> String {
        let plus = self.install.len() + self.auto_install.len();
        let up = self.upgrade.len();
        let minus = self.remove.len() + self.purge.len();
        let mut parts = Vec::new();
        if plus > 0 {
            parts.push(format!("+{}", plus));
        }
        if up > 0 {
            parts.push(format!("^{}", up));
        }
        if minus > 0 {
            parts.push(format!("-{}", minus));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Long form: one block per non-empty list, package names wrapped to `width`.
    pub fn describe(&self, width: usize) -> String {
        let mut out = String::new();
        for op in PkgOp::ALL {
            let list = self.get(op);
            if list.is_empty() {
                continue;
            }
            let names: Vec<&str> = list.iter().map(|(p, _)| p.as_str()).collect();
            out.push_str(&format!("{} {}s:\n", list.len(), op.label()));
            out.push_str(&wrap_list(&names, width));
            out.push('\n');
        }
        if out.is_empty() {
            out.push_str("no package changes\n");
        }
        out
    }
}

/// Brief for a possibly unknown ChangeSet.
pub fn brief_of(changes: Option<&ChangeSet>) -> String {
    match changes {
        Some(c) => c.brief(),
        None => "unknown".to_string(),
    }
}

fn entry_event(op: PkgOp, version: &str) -> PackageEvent {
    let v = Some(version.to_string());
    let mut ev = match op {
        PkgOp::Install | PkgOp::AutoInstall => PackageEvent::new(EventKind::Install, None, v),
        PkgOp::Upgrade => match version.split_once(", ") {
            Some((old, new)) => {
                PackageEvent::new(EventKind::Upgrade, Some(old.to_string()), Some(new.to_string()))
            }
            None => PackageEvent::new(EventKind::Upgrade, None, v),
        },
        PkgOp::Remove => PackageEvent::new(EventKind::Remove, v, None),
        PkgOp::Purge => PackageEvent::new(EventKind::Purge, v, None),
    };
    ev.auto = op == PkgOp::AutoInstall;
    ev
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 8, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn pv(p: &str, v: &str) -> PackageVersion {
        (p.to_string(), v.to_string())
    }

    #[test]
    fn merge_install_then_remove_nets_to_remove() {
        let mut a = ChangeSet::empty(at(1));
        a.install.push(pv("curl", "7.0"));
        let mut b = ChangeSet::empty(at(2));
        b.remove.push(pv("curl", "7.0"));

        let m = b.merge(&a);
        assert_eq!(m.remove, vec![pv("curl", "7.0")]);
        assert!(m.install.is_empty());
        assert_eq!(m.since, at(1));
    }

    #[test]
    fn merge_orders_by_since_not_by_operand() {
        let mut a = ChangeSet::empty(at(1));
        a.upgrade.push(pv("foo", "1, 2"));
        let mut b = ChangeSet::empty(at(5));
        b.upgrade.push(pv("foo", "2, 3"));

        assert_eq!(a.merge(&b).upgrade, vec![pv("foo", "1, 3")]);
        assert_eq!(b.merge(&a).upgrade, vec![pv("foo", "1, 3")]);
    }

    #[test]
    fn merge_keeps_auto_flag_and_sorts() {
        let mut a = ChangeSet::empty(at(1));
        a.auto_install.push(pv("zlib", "1"));
        a.install.push(pv("bash", "5"));
        let mut b = ChangeSet::empty(at(2));
        b.upgrade.push(pv("zlib", "1, 2"));
        b.install.push(pv("apt", "2"));

        let m = a.merge(&b);
        assert_eq!(m.auto_install, vec![pv("zlib", "2")]);
        assert_eq!(m.install, vec![pv("apt", "2"), pv("bash", "5")]);
    }

    #[test]
    fn merge_drops_reinstall_of_same_version() {
        let mut a = ChangeSet::empty(at(1));
        a.purge.push(pv("vim", "8"));
        let mut b = ChangeSet::empty(at(2));
        b.install.push(pv("vim", "8"));
        assert!(a.merge(&b).is_empty());
    }

    #[test]
    fn merge_is_associative_over_three_spans() {
        let mut a = ChangeSet::empty(at(1));
        a.upgrade.push(pv("x", "1, 2"));
        a.remove.push(pv("y", "4"));
        a.install.push(pv("z", "1"));
        let mut b = ChangeSet::empty(at(2));
        b.upgrade.push(pv("x", "2, 3"));
        b.install.push(pv("y", "5"));
        b.upgrade.push(pv("z", "1, 2"));
        let mut c = ChangeSet::empty(at(3));
        c.remove.push(pv("x", "3"));
        c.upgrade.push(pv("y", "5, 6"));
        c.upgrade.push(pv("z", "2, 3"));

        let left = a.merge(&b).merge(&c);
        let right = a.merge(&b.merge(&c));
        assert_eq!(left, right);
        assert_eq!(left.remove, vec![pv("x", "1")]);
        assert_eq!(left.upgrade, vec![pv("y", "4, 6")]);
        assert_eq!(left.install, vec![pv("z", "3")]);
    }

    #[test]
    fn brief_counts() {
        let mut c = ChangeSet::empty(at(1));
        assert_eq!(c.brief(), "none");
        assert_eq!(brief_of(None), "unknown");
        c.install.push(pv("a", "1"));
        c.install.push(pv("b", "1"));
        c.auto_install.push(pv("c", "1"));
        c.upgrade.push(pv("d", "1, 2"));
        c.remove.push(pv("e", "1"));
        c.purge.push(pv("f", "1"));
        assert_eq!(c.brief(), "+3 ^1 -2");
    }

    #[test]
    fn describe_lists_blocks() {
        let mut c = ChangeSet::empty(at(1));
        c.auto_install.push(pv("libfoo", "1"));
        c.upgrade.push(pv("bar", "1, 2"));
        let s = c.describe(80);
        assert_eq!(s, "1 auto-installs:\n  libfoo\n1 upgrades:\n  bar\n");
        assert_eq!(ChangeSet::empty(at(1)).describe(80), "no package changes\n");
    }

    #[test]
    fn json_uses_dashed_auto_install_key() {
        let mut c = ChangeSet::empty(at(1));
        c.auto_install.push(pv("a", "1"));
        let s = serde_json::to_string(&c).unwrap();
        assert!(s.contains("\"auto-install\""));
        let back: ChangeSet = serde_json::from_str(&s).unwrap();
        assert_eq!(back, c);
    }
}
