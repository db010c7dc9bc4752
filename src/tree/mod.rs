//! Text rendering of the snapshot forest.
//!
//! Branches are drawn newest first, one column per branch, each climbing its
//! parent chain until it either runs out of parents (end of branch) or reaches a
//! node with several children (a junction). A junction waits until every one of
//! its branches has arrived, then a join line collapses those columns and the
//! junction continues as a single branch in the leftmost of them.
//!
//! ```text
//! ┌──@ (+2)
//! ├──@apt-snapshot-2013-08-02_10:00:00 (^1)
//! │
//! │  ┌──@apt-snapshot-2013-08-03_10:00:00 (none)
//! ├──┘
//! ├──@apt-snapshot-2013-08-01_10:00:00 (unknown)
//! └── (end of branch)
//! ```
//!
//! Rendering only reads the forest; repeated calls give identical output.

use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;

use crate::changes::{brief_of, ChangeSet};
use crate::consts::ROOT_NAME;
use crate::snapshots::Forest;

const PAD_OPEN: &str = "│  ";
const PAD_ORPHAN: &str = "   ";
const FIRST: &str = "┌──";
const NEXT: &str = "├──";
const OPEN_MARK: &str = "│";
const END_MARK: &str = "└── (end of branch)";

#[derive(Debug)]
struct Junction {
    remaining: usize,
    columns: Vec<usize>,
    date: NaiveDateTime,
}

#[derive(Debug, Clone)]
struct WorkItem {
    name: String,
    /// Joined junction: drawn with `├──` since the join line opened it.
    continued: bool,
}

struct RenderState<'a> {
    forest: &'a Forest,
    root_changes: Option<&'a ChangeSet>,
    column: usize,
    orphan_columns: BTreeSet<usize>,
    open: HashMap<String, Junction>,
    printed: HashSet<String>,
    out: String,
}

/// Render the whole forest. `root_changes` is the live status of `@`.
pub fn render(forest: &Forest, root_changes: Option<&ChangeSet>) -> String {
    let mut st = RenderState {
        forest,
        root_changes,
        column: 1,
        orphan_columns: BTreeSet::new(),
        open: HashMap::new(),
        printed: HashSet::new(),
        out: String::new(),
    };

    let mut work: Vec<WorkItem> = forest
        .nodes()
        .into_iter()
        .filter(|s| s.is_root() || forest.child_count(s.name()) == 0)
        .map(|s| WorkItem {
            name: s.name().to_string(),
            continued: false,
        })
        .collect();

    loop {
        st.sort_work(&mut work);
        let Some(mut item) = work.pop() else {
            break;
        };
        // a joined junction is drawn right away, in the column it collapsed into
        while let Some(next) = st.draw_branch(&item) {
            st.column += 1;
            item = next;
        }
        st.column += 1;
    }

    // only reachable with looping links: close whatever is still waiting
    let mut left: Vec<String> = st.open.keys().cloned().collect();
    left.sort();
    for name in left {
        if let Some(j) = st.open.remove(&name) {
            st.join_line(&j.columns);
            st.column = j.columns.iter().copied().min().unwrap_or(1);
            let item = WorkItem {
                name,
                continued: true,
            };
            let mut cur = Some(item);
            while let Some(it) = cur.take() {
                cur = st.draw_branch(&it);
            }
        }
    }
    st.out
}

impl<'a> RenderState<'a> {
    fn node_date(&self, name: &str) -> Option<NaiveDateTime> {
        self.forest.get(name).map(|s| s.date())
    }

    /// Ordering key: the node's own date, or the date of its meeting point with
    /// the oldest open junction's ancestry when that lies before the newest
    /// open junction, so branches rejoining older material wait for siblings.
    fn sort_key(&self, name: &str) -> Option<NaiveDateTime> {
        let own = self.node_date(name);
        if name == ROOT_NAME || self.open.is_empty() {
            return own;
        }
        let oldest = self
            .open
            .iter()
            .min_by(|a, b| a.1.date.cmp(&b.1.date).then_with(|| a.0.cmp(b.0)))
            .map(|(n, _)| n.clone());
        let newest = self.open.values().map(|j| j.date).max();
        let (Some(oldest), Some(newest)) = (oldest, newest) else {
            return own;
        };
        match self
            .forest
            .first_common_ancestor(name, &oldest)
            .and_then(|a| self.node_date(&a))
        {
            Some(meet) if meet < newest => Some(meet),
            _ => own,
        }
    }

    fn sort_work(&self, work: &mut [WorkItem]) {
        let mut keyed: Vec<(Option<NaiveDateTime>, WorkItem)> = work
            .iter()
            .map(|w| (self.sort_key(&w.name), w.clone()))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        for (slot, (_, w)) in work.iter_mut().zip(keyed) {
            *slot = w;
        }
    }

    fn padding(&self, upto: usize) -> String {
        let mut pad = String::new();
        for c in 1..upto {
            pad.push_str(if self.orphan_columns.contains(&c) {
                PAD_ORPHAN
            } else {
                PAD_OPEN
            });
        }
        pad
    }

    fn label(&self, name: &str) -> String {
        let brief = if name == ROOT_NAME {
            brief_of(self.root_changes)
        } else {
            brief_of(self.forest.changes_of(name).as_ref())
        };
        format!("{} ({})", name, brief)
    }

    fn line(&mut self, pointer: &str, text: &str) {
        let pad = self.padding(self.column);
        let _ = writeln!(self.out, "{}{}{}", pad, pointer, text);
    }

    /// Draw `item` and its ancestors up to the next junction or the forest edge.
    /// Returns the junction to continue with when this branch completed it.
    fn draw_branch(&mut self, item: &WorkItem) -> Option<WorkItem> {
        if !self.printed.insert(item.name.clone()) {
            return None;
        }
        let pointer = if item.continued { NEXT } else { FIRST };
        let text = self.label(&item.name);
        self.line(pointer, &text);

        let mut cur = item.name.clone();
        loop {
            let parent = self.forest.parent_of(&cur).map(|p| p.name().to_string());
            match parent {
                None => {
                    self.line("", END_MARK);
                    self.orphan_columns.insert(self.column);
                    return None;
                }
                Some(p) if self.forest.child_count(&p) >= 2 => return self.arrive(&p),
                Some(p) if self.printed.contains(&p) => {
                    self.line("", END_MARK);
                    self.orphan_columns.insert(self.column);
                    return None;
                }
                Some(p) => {
                    let text = self.label(&p);
                    self.line(NEXT, &text);
                    self.printed.insert(p.clone());
                    cur = p;
                }
            }
        }
    }

    /// A branch reached junction `name` in the current column.
    fn arrive(&mut self, name: &str) -> Option<WorkItem> {
        let column = self.column;
        let complete = match self.open.get_mut(name) {
            Some(j) => {
                j.columns.push(column);
                j.remaining = j.remaining.saturating_sub(1);
                j.remaining == 0
            }
            None => {
                let date = self.node_date(name)?;
                let remaining = self.forest.child_count(name).saturating_sub(1);
                self.open.insert(
                    name.to_string(),
                    Junction {
                        remaining,
                        columns: vec![column],
                        date,
                    },
                );
                remaining == 0
            }
        };

        if !complete {
            self.line("", OPEN_MARK);
            return None;
        }
        let j = self.open.remove(name)?;
        self.join_line(&j.columns);
        let first = j.columns.iter().copied().min().unwrap_or(1);
        self.orphan_columns.retain(|c| *c < first);
        // the caller advances one column before drawing the continuation
        self.column = first.saturating_sub(1);
        Some(WorkItem {
            name: name.to_string(),
            continued: true,
        })
    }

    fn join_line(&mut self, columns: &[usize]) {
        let mut cols = columns.to_vec();
        cols.sort_unstable();
        let (Some(&first), Some(&last)) = (cols.first(), cols.last()) else {
            return;
        };
        let mut s = self.padding(first);
        s.push_str(NEXT);
        for c in first + 1..last {
            s.push_str(if cols.contains(&c) { "┴──" } else { "───" });
        }
        if last > first {
            s.push('┘');
        }
        let _ = writeln!(self.out, "{}", s);
    }
}
