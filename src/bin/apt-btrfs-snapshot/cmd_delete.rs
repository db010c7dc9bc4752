use anyhow::{anyhow, Result};

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;
use aptsnap::util::older_than;

use crate::util::open;

pub fn exec(cfg: SnapConfig, name: String) -> Result<()> {
    let mut s = open(cfg, LockMode::Exclusive)?;
    s.manager.delete(&name)?;
    println!("Deleted {}", name);
    Ok(())
}

pub fn exec_prune(cfg: SnapConfig, name: String) -> Result<()> {
    let mut s = open(cfg, LockMode::Exclusive)?;
    for gone in s.manager.prune(&name)? {
        println!("Deleted {}", gone);
    }
    Ok(())
}

pub fn exec_older_than(cfg: SnapConfig, age: String) -> Result<()> {
    let cutoff = older_than(&age)?;
    let mut s = open(cfg, LockMode::Exclusive)?;
    let report = s.manager.delete_older_than(cutoff);
    for name in &report.deleted {
        println!("Deleted {}", name);
    }
    for name in &report.skipped {
        println!("Kept {} (tagged or a branch point)", name);
    }
    for (name, err) in &report.failed {
        eprintln!("Failed to delete {}: {}", name, err);
    }
    if !report.is_ok() {
        return Err(anyhow!(
            "{} of {} deletion(s) failed",
            report.failed.len(),
            report.failed.len() + report.deleted.len()
        ));
    }
    Ok(())
}
