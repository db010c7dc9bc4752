//! apt's extended_states: which packages were pulled in automatically.
//!
//! RFC822-like stanzas:
//!
//! ```text
//! Package: lib32z1
//! Architecture: amd64
//! Auto-Installed: 1
//! ```
//!
//! Names are returned bare for the native architecture and as `name:arch`
//! otherwise, matching how dpkg.log names are normalized.

use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Read the auto-installed set. An unreadable file yields an empty set.
pub fn read_auto_installed(path: &Path, native_arch: &str) -> HashSet<String> {
    match fs::read(path) {
        Ok(buf) => parse_extended_states(&String::from_utf8_lossy(&buf), native_arch),
        Err(e) => {
            debug!("extended_states {} not readable ({}), no auto marks", path.display(), e);
            HashSet::new()
        }
    }
}

pub fn parse_extended_states(text: &str, native_arch: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut package: Option<String> = None;
    let mut arch: Option<String> = None;
    let mut auto = false;

    let mut flush = |package: &mut Option<String>, arch: &mut Option<String>, auto: &mut bool| {
        if let Some(p) = package.take() {
            if *auto {
                match arch.as_deref() {
                    Some(a) if !a.is_empty() && a != native_arch && a != "all" => {
                        out.insert(format!("{}:{}", p, a));
                    }
                    _ => {
                        out.insert(p);
                    }
                }
            }
        }
        *arch = None;
        *auto = false;
    };

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            flush(&mut package, &mut arch, &mut auto);
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Package" => {
                // a new stanza without a blank separator still starts fresh
                if package.is_some() {
                    flush(&mut package, &mut arch, &mut auto);
                }
                package = Some(value.to_string());
            }
            "Architecture" => arch = Some(value.to_string()),
            "Auto-Installed" => auto = value == "1",
            _ => {}
        }
    }
    flush(&mut package, &mut arch, &mut auto);
    out
}

/// Drop a `:<native_arch>` suffix from a dpkg.log package name.
pub fn strip_native_arch<'a>(package: &'a str, native_arch: &str) -> &'a str {
    match package.rsplit_once(':') {
        Some((name, arch)) if arch == native_arch || arch == "all" => name,
        _ => package,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_arch_keeps_suffix() {
        let text = "Package: gcc-4.6-base\nArchitecture: i386\nAuto-Installed: 1\n\n\
                    Package: lib32z1\nArchitecture: amd64\nAuto-Installed: 1\n\n\
                    Package: vim\nArchitecture: amd64\nAuto-Installed: 0\n";
        let set = parse_extended_states(text, "amd64");
        assert!(set.contains("gcc-4.6-base:i386"));
        assert!(!set.contains("gcc-4.6-base"));
        assert!(set.contains("lib32z1"));
        assert!(!set.contains("vim"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn stanza_without_architecture() {
        let set = parse_extended_states("Package: foo\nAuto-Installed: 1", "amd64");
        assert!(set.contains("foo"));
    }

    #[test]
    fn strip_only_native() {
        assert_eq!(strip_native_arch("curl:amd64", "amd64"), "curl");
        assert_eq!(strip_native_arch("libc6:i386", "amd64"), "libc6:i386");
        assert_eq!(strip_native_arch("tzdata:all", "amd64"), "tzdata");
        assert_eq!(strip_native_arch("bash", "amd64"), "bash");
    }

    #[test]
    fn missing_file_is_empty() {
        let set = read_auto_installed(Path::new("/nonexistent/extended_states"), "amd64");
        assert!(set.is_empty());
    }
}
