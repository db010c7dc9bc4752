use anyhow::Result;

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;

use crate::util::open;

pub fn exec(cfg: SnapConfig) -> Result<()> {
    let s = open(cfg, LockMode::Exclusive)?;
    let n = s.manager.clean()?;
    println!("Removed {} cached package file(s)", n);
    Ok(())
}
