//! dpkg.log discovery: current file plus rotated `dpkg.log.N` / `dpkg.log.N.gz`.
//!
//! Files are probed newest name first and returned oldest first, so that their
//! lines can be streamed in chronological order. Probing stops once the oldest
//! loaded file already starts before `since`. Missing or unreadable files end
//! the probe; they are never an error (logs rotate away).

use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use log::debug;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::consts::{DPKG_LOG, LOG_TS_FORMAT, MAX_ROTATED_LOGS};

#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

impl LogFile {
    /// Timestamp of the first line, if it parses.
    pub fn earliest(&self) -> Option<NaiveDateTime> {
        self.lines.iter().find(|l| !l.trim().is_empty()).and_then(|l| line_timestamp(l))
    }
}

/// Parse the `YYYY-MM-DD HH:MM:SS` prefix of a dpkg.log line.
pub fn line_timestamp(line: &str) -> Option<NaiveDateTime> {
    let ts = line.get(0..19)?;
    NaiveDateTime::parse_from_str(ts, LOG_TS_FORMAT).ok()
}

fn bytes_to_lines(buf: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(buf).lines().map(|l| l.to_string()).collect()
}

fn read_plain(path: &Path) -> io::Result<Vec<String>> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    Ok(bytes_to_lines(&buf))
}

fn read_gz(path: &Path) -> io::Result<Vec<String>> {
    let mut buf = Vec::new();
    GzDecoder::new(File::open(path)?).read_to_end(&mut buf)?;
    Ok(bytes_to_lines(&buf))
}

/// Load the logs young enough to matter for `since`, oldest file first.
pub fn logfiles_to_check(var_location: &Path, since: NaiveDateTime) -> Vec<LogFile> {
    let primary = var_location.join(DPKG_LOG);
    let lines = match read_plain(&primary) {
        Ok(l) => l,
        Err(e) => {
            debug!("dpkg history: {} not readable ({}), no history", primary.display(), e);
            return Vec::new();
        }
    };
    let mut files = vec![LogFile { path: primary.clone(), lines }];

    for i in 1..=MAX_ROTATED_LOGS {
        let oldest = &files[files.len() - 1];
        if matches!(oldest.earliest(), Some(t) if t < since) {
            break;
        }
        let plain = PathBuf::from(format!("{}.{}", primary.display(), i));
        let gz = PathBuf::from(format!("{}.{}.gz", primary.display(), i));
        let next = match read_plain(&plain) {
            Ok(lines) => LogFile { path: plain, lines },
            Err(_) => match read_gz(&gz) {
                Ok(lines) => LogFile { path: gz, lines },
                Err(_) => break,
            },
        };
        debug!("dpkg history: also reading {}", next.path.display());
        files.push(next);
    }

    files.reverse();
    files
}
