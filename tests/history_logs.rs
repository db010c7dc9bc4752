// dpkg.log consolidation over current + rotated (plain and gzipped) logs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use flate2::write::GzEncoder;
use flate2::Compression;

use aptsnap::history::logfiles::logfiles_to_check;
use aptsnap::history::DpkgHistory;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("aptsnap-history-{prefix}-{pid}-{t}-{id}"))
}

fn at(month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, month, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn write_log(var: &Path, name: &str, lines: &[&str]) -> Result<()> {
    let dir = var.join("log");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(name), lines.join("\n") + "\n")?;
    Ok(())
}

fn write_log_gz(var: &Path, name: &str, lines: &[&str]) -> Result<()> {
    let dir = var.join("log");
    fs::create_dir_all(&dir)?;
    let mut enc = GzEncoder::new(fs::File::create(dir.join(name))?, Compression::default());
    enc.write_all((lines.join("\n") + "\n").as_bytes())?;
    enc.finish()?;
    Ok(())
}

fn write_extended_states(var: &Path, text: &str) -> Result<()> {
    let dir = var.join("lib/apt");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("extended_states"), text)?;
    Ok(())
}

fn pv(p: &str, v: &str) -> (String, String) {
    (p.to_string(), v.to_string())
}

#[test]
fn install_upgrade_remove_is_a_remove_of_the_first_version() -> Result<()> {
    let var = unique_root("curl");
    write_log(
        &var,
        "dpkg.log",
        &[
            "2013-08-06 12:00:00 startup archives unpack",
            "2013-08-06 12:00:01 install curl:amd64 <none> 7.0",
            "2013-08-06 12:00:02 status half-installed curl:amd64 7.0",
            "2013-08-06 12:01:00 upgrade curl:amd64 7.0 7.1",
            "2013-08-06 12:02:00 remove curl:amd64 7.1 <none>",
        ],
    )?;

    let c = DpkgHistory::new(&var, at(8, 1), "amd64").changes();
    assert_eq!(c.remove, vec![pv("curl", "7.0")]);
    assert!(c.install.is_empty());
    assert!(c.upgrade.is_empty());

    fs::remove_dir_all(&var)?;
    Ok(())
}

#[test]
fn remove_then_install_is_an_upgrade() -> Result<()> {
    let var = unique_root("foo");
    write_log(
        &var,
        "dpkg.log",
        &[
            "2013-08-06 12:00:00 remove foo 1.0 <none>",
            "2013-08-06 12:05:00 install foo <none> 2.0",
        ],
    )?;

    let c = DpkgHistory::new(&var, at(8, 1), "amd64").changes();
    assert_eq!(c.upgrade, vec![pv("foo", "1.0, 2.0")]);
    assert_eq!(c.brief(), "^1");

    fs::remove_dir_all(&var)?;
    Ok(())
}

#[test]
fn rotated_and_gzipped_logs_are_read_in_order() -> Result<()> {
    let var = unique_root("rotated");
    write_log_gz(
        &var,
        "dpkg.log.2.gz",
        &["2013-07-01 09:00:00 install vim:amd64 <none> 1"],
    )?;
    write_log(
        &var,
        "dpkg.log.1",
        &[
            "2013-07-15 09:00:00 upgrade vim:amd64 1 2",
            "2013-07-15 09:00:01 install libfoo:amd64 <none> 0.9",
            "2013-07-15 09:00:02 install libc6:i386 <none> 2.17",
        ],
    )?;
    write_log(
        &var,
        "dpkg.log",
        &[
            "2013-08-01 09:00:00 install bar:amd64 <none> 3",
            "2013-08-01 09:00:01 configure bar:amd64 3 <none>",
            "not a log line at all",
        ],
    )?;
    write_extended_states(
        &var,
        "Package: libfoo\nArchitecture: amd64\nAuto-Installed: 1\n\n\
         Package: libc6\nArchitecture: i386\nAuto-Installed: 1\n\n\
         Package: bar\nArchitecture: amd64\nAuto-Installed: 0\n",
    )?;

    let files = logfiles_to_check(&var, at(6, 30));
    assert_eq!(files.len(), 3);
    assert!(files[0].path.to_string_lossy().ends_with("dpkg.log.2.gz"));
    assert!(files[2].path.to_string_lossy().ends_with("dpkg.log"));

    let c = DpkgHistory::new(&var, at(6, 30), "amd64").changes();
    assert_eq!(c.install, vec![pv("bar", "3"), pv("vim", "2")]);
    assert_eq!(
        c.auto_install,
        vec![pv("libc6:i386", "2.17"), pv("libfoo", "0.9")]
    );
    assert!(c.upgrade.is_empty());

    // a later `since` stops the probe at dpkg.log.1 and filters its old lines
    let files = logfiles_to_check(&var, at(7, 20));
    assert_eq!(files.len(), 2);
    let c = DpkgHistory::new(&var, at(7, 20), "amd64").changes();
    assert_eq!(c.install, vec![pv("bar", "3")]);
    assert!(c.auto_install.is_empty());

    fs::remove_dir_all(&var)?;
    Ok(())
}

#[test]
fn missing_logs_give_an_empty_set() -> Result<()> {
    let var = unique_root("empty");
    fs::create_dir_all(&var)?;
    assert!(logfiles_to_check(&var, at(1, 1)).is_empty());
    let c = DpkgHistory::new(&var, at(1, 1), "amd64").changes();
    assert!(c.is_empty());
    assert_eq!(c.since, at(1, 1));
    fs::remove_dir_all(&var)?;
    Ok(())
}
