//! dpkg history consolidation: dpkg.log (+ rotated/gzipped) -> one ChangeSet.
//!
//! Steps:
//! - logfiles::logfiles_to_check(): current + rotated logs back to `since`.
//! - stream lines oldest first, keep install/upgrade/remove/purge at or after `since`.
//! - group by package (arrival order) and resolve the net change (changes::net).
//! - installs marked in apt's extended_states move to `auto-install`.
//! - sort every list.
//!
//! Nothing here fails: unreadable logs, bad lines and a missing extended_states
//! simply contribute no information.

pub mod auto;
pub mod logfiles;

use chrono::NaiveDateTime;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::changes::net::{EventKind, NetChange, PackageEvent, PackageTrail};
use crate::changes::ChangeSet;
use crate::consts::EXTENDED_STATES;
use auto::{read_auto_installed, strip_native_arch};
use logfiles::{line_timestamp, logfiles_to_check};

/// One recognized dpkg.log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub at: NaiveDateTime,
    pub package: String,
    pub event: PackageEvent,
}

/// Parse `2013-08-06 12:20:38 upgrade curl:amd64 7.0 7.1`.
/// Returns None for status/configure lines and anything malformed.
pub fn parse_log_line(line: &str, native_arch: &str) -> Option<LogLine> {
    let line = line.trim();
    let mut bits = line.split_whitespace();
    let _date = bits.next()?;
    let _time = bits.next()?;
    let kind = EventKind::from_log_word(bits.next()?)?;
    let package = bits.next()?;
    let at = line_timestamp(line)?;
    let version = |v: Option<&str>| v.filter(|s| *s != "<none>").map(|s| s.to_string());
    let old = version(bits.next());
    let new = version(bits.next());
    Some(LogLine {
        at,
        package: strip_native_arch(package, native_arch).to_string(),
        event: PackageEvent::new(kind, old, new),
    })
}

pub struct DpkgHistory {
    var_location: PathBuf,
    since: NaiveDateTime,
    native_arch: String,
}

impl DpkgHistory {
    pub fn new(var_location: &Path, since: NaiveDateTime, native_arch: &str) -> Self {
        Self {
            var_location: var_location.to_path_buf(),
            since,
            native_arch: native_arch.to_string(),
        }
    }

    pub fn since(&self) -> NaiveDateTime {
        self.since
    }

    /// Net package changes from `since` until now.
    pub fn changes(&self) -> ChangeSet {
        let files = logfiles_to_check(&self.var_location, self.since);

        let mut order: Vec<String> = Vec::new();
        let mut trails: HashMap<String, PackageTrail> = HashMap::new();
        let mut seen = 0usize;
        for file in &files {
            for line in &file.lines {
                let Some(parsed) = parse_log_line(line, &self.native_arch) else {
                    continue;
                };
                if parsed.at < self.since {
                    continue;
                }
                seen += 1;
                let trail = trails.entry(parsed.package.clone()).or_insert_with(|| {
                    order.push(parsed.package.clone());
                    PackageTrail::default()
                });
                trail.push(&parsed.event);
            }
        }
        debug!(
            "dpkg history: {} event(s) for {} package(s) since {} in {} file(s)",
            seen,
            order.len(),
            self.since,
            files.len()
        );

        let auto = read_auto_installed(&self.var_location.join(EXTENDED_STATES), &self.native_arch);

        let mut out = ChangeSet::empty(self.since);
        for package in &order {
            if let Some(net) = trails[package].resolve() {
                let is_auto = matches!(net, NetChange::Install(_)) && auto.contains(package);
                out.push_net(package, net, is_auto);
            }
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upgrade_line() {
        let l = parse_log_line("2013-08-06 12:20:38 upgrade curl:amd64 7.0 7.1", "amd64").unwrap();
        assert_eq!(l.package, "curl");
        assert_eq!(l.event.kind, EventKind::Upgrade);
        assert_eq!(l.event.old.as_deref(), Some("7.0"));
        assert_eq!(l.event.new.as_deref(), Some("7.1"));
    }

    #[test]
    fn none_versions_become_absent() {
        let l = parse_log_line("2013-08-06 12:20:38 install vim <none> 2:7.3", "amd64").unwrap();
        assert_eq!(l.event.old, None);
        assert_eq!(l.event.first_version(), "2:7.3");
    }

    #[test]
    fn ignores_status_and_garbage() {
        assert!(parse_log_line("2013-08-06 12:20:38 status installed vim 7.3", "amd64").is_none());
        assert!(parse_log_line("2013-08-06 12:20:38 configure vim 7.3 <none>", "amd64").is_none());
        assert!(parse_log_line("garbage", "amd64").is_none());
        assert!(parse_log_line("", "amd64").is_none());
        assert!(parse_log_line("2013-13-45 99:00:00 install vim <none> 1", "amd64").is_none());
    }
}
