use anyhow::Result;

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;

use crate::util::open;

pub fn exec(cfg: SnapConfig) -> Result<()> {
    let s = open(cfg, LockMode::Shared)?;
    print!("{}", s.manager.tree());
    Ok(())
}
