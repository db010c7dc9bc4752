use anyhow::Result;

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;
use aptsnap::util::older_than;

use crate::util::open;

pub fn exec(cfg: SnapConfig, age: Option<String>) -> Result<()> {
    let s = open(cfg, LockMode::Shared)?;
    let list = match &age {
        Some(a) => {
            let cutoff = older_than(a)?;
            println!("Available snapshots older than '{}':", a);
            s.manager.list_older_than(cutoff)
        }
        None => {
            println!("Available snapshots:");
            s.manager.list()
        }
    };
    for snap in list {
        println!("  {}", snap.name());
    }
    Ok(())
}
