use anyhow::Result;

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;

use crate::util::{open, tag_or_prompt};

pub fn exec_set_default(cfg: SnapConfig, name: String, tag: Option<String>) -> Result<()> {
    let tag = tag_or_prompt(tag, "the backup of the current root")?;
    let mut s = open(cfg, LockMode::Exclusive)?;
    let backup = s.manager.set_default(&name, tag.as_deref())?;
    println!("Previous root kept as {}", backup);
    println!(
        "Default changed to {}, please reboot for changes to take effect.",
        name
    );
    Ok(())
}

pub fn exec_rollback(cfg: SnapConfig, number: usize, tag: Option<String>) -> Result<()> {
    let tag = tag_or_prompt(tag, "the backup of the current root")?;
    let mut s = open(cfg, LockMode::Exclusive)?;
    let (target, backup) = s.manager.rollback(number, tag.as_deref())?;
    println!("Previous root kept as {}", backup);
    println!(
        "Default changed to {}, please reboot for changes to take effect.",
        target
    );
    Ok(())
}
