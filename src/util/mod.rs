//! util — общие утилиты.
//!
//! Содержит:
//! - now_local(): текущее локальное время с точностью до секунды (как в именах снапшотов).
//! - parse_age(): "5d" / "12h" / "2w" / "30m" -> chrono::Duration.
//! - older_than(): now - age.
//! - wrap_list(): перенос списка пакетов по ширине терминала.

use anyhow::{anyhow, Result};
use chrono::{Duration, Local, NaiveDateTime, Timelike};

/// Current local wall-clock time truncated to whole seconds.
#[inline]
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parse an age like `5d`, `12h`, `2w` or `30m`. A bare number means days.
pub fn parse_age(spec: &str) -> Result<Duration> {
    let s = spec.trim();
    if s.is_empty() {
        return Err(anyhow!("empty age, expected e.g. 5d"));
    }
    let (num, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 'd'),
    };
    let n: i64 = num
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid age '{}', expected e.g. 5d, 12h, 2w", spec))?;
    if n < 0 {
        return Err(anyhow!("invalid age '{}': must not be negative", spec));
    }
    match unit {
        'm' => Ok(Duration::minutes(n)),
        'h' => Ok(Duration::hours(n)),
        'd' => Ok(Duration::days(n)),
        'w' => Ok(Duration::weeks(n)),
        other => Err(anyhow!("invalid age unit '{}' in '{}' (use m, h, d or w)", other, spec)),
    }
}

/// Cutoff timestamp for "older than <age>" selections.
pub fn older_than(spec: &str) -> Result<NaiveDateTime> {
    Ok(now_local() - parse_age(spec)?)
}

/// Join `items` with ", " and wrap to `width` columns with a two-space indent.
pub fn wrap_list<S: AsRef<str>>(items: &[S], width: usize) -> String {
    let indent = "  ";
    let mut out = String::new();
    let mut line = String::from(indent);
    for (i, item) in items.iter().enumerate() {
        let mut word = item.as_ref().to_string();
        if i + 1 < items.len() {
            word.push(',');
        }
        let sep = if line.len() > indent.len() { 1 } else { 0 };
        if line.len() > indent.len() && line.len() + sep + word.len() > width {
            out.push_str(&line);
            out.push('\n');
            line = String::from(indent);
        } else if sep == 1 {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if line.len() > indent.len() {
        out.push_str(&line);
    }
    out
}
