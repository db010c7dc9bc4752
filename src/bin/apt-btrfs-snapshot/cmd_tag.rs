use anyhow::Result;

use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;

use crate::util::open;

pub fn exec(cfg: SnapConfig, name: String, tag: String) -> Result<()> {
    let mut s = open(cfg, LockMode::Exclusive)?;
    let new_name = s.manager.tag(&name, &tag)?;
    if new_name == name {
        println!("{} unchanged", name);
    } else {
        println!("Renamed {} -> {}", name, new_name);
    }
    Ok(())
}
