use anyhow::Result;

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;

use crate::util::open;

pub fn exec(cfg: SnapConfig) -> Result<()> {
    let mut s = open(cfg, LockMode::Exclusive)?;
    let links = s.manager.convert()?;
    println!("Converted: {} parent link(s) written", links);
    Ok(())
}
