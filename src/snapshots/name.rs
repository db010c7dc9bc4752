//! Snapshot identity: `@` or `@apt-snapshot-<YYYY-MM-DD_HH:MM:SS>[-<tag>]`.

use chrono::NaiveDateTime;
use std::fmt;

use crate::consts::{NAME_TS_FORMAT, NAME_TS_LEN, ROOT_NAME, SNAP_PREFIX};
use crate::error::SnapError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snapshot {
    name: String,
    date: NaiveDateTime,
    tag: String,
}

impl Snapshot {
    /// Parse a prefixed snapshot name. Returns None for `@` and anything malformed.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(SNAP_PREFIX)?;
        let ts = rest.get(..NAME_TS_LEN)?;
        let date = NaiveDateTime::parse_from_str(ts, NAME_TS_FORMAT).ok()?;
        let suffix = &rest[NAME_TS_LEN..];
        let tag = suffix.strip_prefix('-').unwrap_or(suffix).to_string();
        Some(Self {
            name: name.to_string(),
            date,
            tag,
        })
    }

    /// The active root; its real creation time is unknown, so `now` stands in.
    pub fn root(now: NaiveDateTime) -> Self {
        Self {
            name: ROOT_NAME.to_string(),
            date: now,
            tag: String::new(),
        }
    }

    /// `@` or a prefixed name.
    pub fn from_name(name: &str, now: NaiveDateTime) -> Option<Self> {
        if name == ROOT_NAME {
            Some(Self::root(now))
        } else {
            Self::parse(name)
        }
    }

    /// Build a snapshot name for `date`, optionally tagged.
    /// A leading '-' on the tag is accepted and not doubled.
    pub fn make_name(date: NaiveDateTime, tag: Option<&str>) -> String {
        let mut name = format!("{}{}", SNAP_PREFIX, date.format(NAME_TS_FORMAT));
        if let Some(t) = tag {
            let t = t.trim().trim_start_matches('-');
            if !t.is_empty() {
                name.push('-');
                name.push_str(t);
            }
        }
        name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    /// Tag without the separating '-'; empty if untagged.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_NAME
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Tag as it goes into a name: trimmed, leading '-' dropped, None if nothing is left.
/// The tag becomes part of one directory name, so path separators, NUL and
/// the `.`/`..` components are refused.
pub fn normalize_tag(tag: &str) -> Result<Option<&str>, SnapError> {
    let t = tag.trim().trim_start_matches('-');
    if t.contains('/') || t.contains('\0') || t == "." || t == ".." {
        return Err(SnapError::InvalidTag(tag.to_string()));
    }
    Ok(if t.is_empty() { None } else { Some(t) })
}

/// True for names managed by this tool (never `@`, never staging).
pub fn is_snapshot_name(name: &str) -> bool {
    Snapshot::parse(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_plain_and_tagged_names() {
        let s = Snapshot::parse("@apt-snapshot-2013-07-26_14:50:53").unwrap();
        assert_eq!(
            s.date(),
            NaiveDate::from_ymd_opt(2013, 7, 26).unwrap().and_hms_opt(14, 50, 53).unwrap()
        );
        assert_eq!(s.tag(), "");

        let t = Snapshot::parse("@apt-snapshot-2013-07-31_12:53:16-raring-to-go").unwrap();
        assert_eq!(t.tag(), "raring-to-go");
        assert!(!t.is_root());
    }

    #[test]
    fn rejects_foreign_names() {
        assert!(Snapshot::parse("@").is_none());
        assert!(Snapshot::parse("@home").is_none());
        assert!(Snapshot::parse("@apt-snapshot-2013-07-26").is_none());
        assert!(Snapshot::parse("@apt-snapshot-2013-13-26_14:50:53").is_none());
        assert!(!is_snapshot_name("@apt-btrfs-staging"));
    }

    #[test]
    fn make_name_round_trips_tag() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(Snapshot::make_name(d, None), "@apt-snapshot-2020-01-02_03:04:05");
        assert_eq!(Snapshot::make_name(d, Some("")), "@apt-snapshot-2020-01-02_03:04:05");
        let n = Snapshot::make_name(d, Some("-foo"));
        assert_eq!(n, "@apt-snapshot-2020-01-02_03:04:05-foo");
        assert_eq!(Snapshot::parse(&n).unwrap().tag(), "foo");
        assert_eq!(Snapshot::make_name(d, Some("foo")), n);
    }

    #[test]
    fn tags_stay_inside_one_name() {
        assert_eq!(normalize_tag("  -foo "), Ok(Some("foo")));
        assert_eq!(normalize_tag(""), Ok(None));
        assert_eq!(normalize_tag("-"), Ok(None));
        assert_eq!(normalize_tag("v1.2..3"), Ok(Some("v1.2..3")));
        for bad in ["x/../escaped", "/", "a\0b", ".", "..", "-.."] {
            assert_eq!(normalize_tag(bad), Err(SnapError::InvalidTag(bad.to_string())));
        }
    }

    #[test]
    fn root_uses_given_time() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        let r = Snapshot::from_name("@", d).unwrap();
        assert!(r.is_root());
        assert_eq!(r.date(), d);
        assert_eq!(r.to_string(), "@");
    }
}
