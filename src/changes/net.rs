//! Net effect of an ordered run of package events.
//!
//! Used twice: by the dpkg.log consolidation (many raw events per package) and by
//! `ChangeSet::merge` (at most two already-consolidated entries per package).
//! Only the first and last event kinds and versions decide the outcome:
//!
//! | first        | last             | net          | version                 |
//! |--------------|------------------|--------------|-------------------------|
//! | install      | install/upgrade  | install      | last                    |
//! | install      | remove/purge     | last kind    | first                   |
//! | upgrade      | install/upgrade  | upgrade      | "first, last"           |
//! | upgrade      | remove/purge     | last kind    | first                   |
//! | remove/purge | install/upgrade  | upgrade      | "first, last" (dropped if equal) |
//! | remove/purge | remove/purge     | last kind    | first                   |

use serde::{Deserialize, Serialize};

/// The four dpkg.log actions that change what is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Install,
    Upgrade,
    Remove,
    Purge,
}

impl EventKind {
    pub fn from_log_word(word: &str) -> Option<Self> {
        match word {
            "install" => Some(Self::Install),
            "upgrade" => Some(Self::Upgrade),
            "remove" => Some(Self::Remove),
            "purge" => Some(Self::Purge),
            _ => None,
        }
    }

    #[inline]
    pub fn is_removal(self) -> bool {
        matches!(self, Self::Remove | Self::Purge)
    }
}

/// One package event. `old`/`new` are the versions before and after the event;
/// dpkg writes `<none>` for the missing side, which is stored as None.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEvent {
    pub kind: EventKind,
    pub old: Option<String>,
    pub new: Option<String>,
    /// Install came in as a dependency (only meaningful for merges).
    pub auto: bool,
}

impl PackageEvent {
    pub fn new(kind: EventKind, old: Option<String>, new: Option<String>) -> Self {
        Self { kind, old, new, auto: false }
    }

    /// Version this event starts from (falls back to the new side for installs).
    pub fn first_version(&self) -> &str {
        self.old.as_deref().or(self.new.as_deref()).unwrap_or("")
    }

    /// Version this event leaves behind (falls back to the old side for removals).
    pub fn last_version(&self) -> &str {
        self.new.as_deref().or(self.old.as_deref()).unwrap_or("")
    }
}

/// Consolidated outcome for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetChange {
    Install(String),
    Upgrade(String, String),
    Remove(String),
    Purge(String),
}

/// Every event seen for one package, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct PackageTrail {
    kinds: Vec<EventKind>,
    first_version: String,
    last_version: String,
    first_auto: bool,
}

impl PackageTrail {
    pub fn push(&mut self, ev: &PackageEvent) {
        if self.kinds.is_empty() {
            self.first_version = ev.first_version().to_string();
            self.first_auto = ev.auto;
        }
        self.last_version = ev.last_version().to_string();
        self.kinds.push(ev.kind);
    }

    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    /// True if the run started with an install that was marked automatic.
    pub fn started_auto(&self) -> bool {
        self.first_auto && self.kinds.first() == Some(&EventKind::Install)
    }

    /// Apply the precedence table. None means "no net effect".
    pub fn resolve(&self) -> Option<NetChange> {
        let (first, last) = match (self.kinds.first(), self.kinds.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return None,
        };
        let fv = self.first_version.clone();
        let lv = self.last_version.clone();

        if last.is_removal() {
            return Some(match last {
                EventKind::Purge => NetChange::Purge(fv),
                _ => NetChange::Remove(fv),
            });
        }
        match first {
            EventKind::Install => Some(NetChange::Install(lv)),
            EventKind::Upgrade => Some(NetChange::Upgrade(fv, lv)),
            // removed and later reinstalled: only a version change is visible
            EventKind::Remove | EventKind::Purge => {
                if fv != lv {
                    Some(NetChange::Upgrade(fv, lv))
                } else {
                    None
                }
            }
        }
    }
}

/// Resolve a complete event run in one go.
pub fn resolve_events<'a, I>(events: I) -> Option<NetChange>
where
    I: IntoIterator<Item = &'a PackageEvent>,
{
    let mut trail = PackageTrail::default();
    for ev in events {
        trail.push(ev);
    }
    trail.resolve()
}
