use anyhow::Result;

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;
use aptsnap::snapshots::CreateOutcome;

use crate::util::open;

pub fn exec(cfg: SnapConfig, tag: Option<String>) -> Result<()> {
    let mut s = open(cfg, LockMode::Exclusive)?;
    match s.manager.create(tag.as_deref())? {
        CreateOutcome::Created(name) => println!("Created snapshot {}", name),
        CreateOutcome::Throttled { newest, age_secs } => println!(
            "Skipped: {} was taken {}s ago (pass --tag to force a new snapshot)",
            newest, age_secs
        ),
    }
    Ok(())
}
