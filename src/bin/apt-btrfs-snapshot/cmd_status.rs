use anyhow::Result;

use aptsnap::changes::brief_of;
use aptsnap::config::SnapConfig;
use aptsnap::lock::LockMode;

use crate::util::open;

const WIDTH: usize = 78;

pub fn exec(cfg: SnapConfig) -> Result<()> {
    let s = open(cfg, LockMode::Shared)?;
    let st = s.manager.status();
    match &st.parent {
        Some(p) => println!(
            "Since the previous snapshot taken on {}, there have been:",
            p.date().format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!(
            "Cannot find a previous snapshot. Since {} the dpkg logs mention:",
            st.since.format("%Y-%m-%d %H:%M:%S")
        ),
    }
    print!("{}", st.changes.describe(WIDTH));
    Ok(())
}

pub fn exec_show(cfg: SnapConfig, name: String) -> Result<()> {
    let s = open(cfg, LockMode::Shared)?;
    let info = s.manager.show(&name)?;
    println!("Snapshot: {}", info.snapshot.name());
    if !info.snapshot.is_root() {
        println!("Date:     {}", info.snapshot.date().format("%Y-%m-%d %H:%M:%S"));
    }
    if !info.snapshot.tag().is_empty() {
        println!("Tag:      {}", info.snapshot.tag());
    }
    println!("Parent:   {}", info.parent.as_deref().unwrap_or("(none)"));
    if info.children.is_empty() {
        println!("Children: (none)");
    } else {
        println!("Children: {}", info.children.join(", "));
    }
    match &info.changes {
        Some(c) => {
            println!("Changes since parent:");
            print!("{}", c.describe(WIDTH));
        }
        None => println!("Changes since parent: unknown"),
    }
    Ok(())
}

pub fn exec_recent(cfg: SnapConfig, number: usize, from: String) -> Result<()> {
    let s = open(cfg, LockMode::Shared)?;
    for (snap, changes) in s.manager.recent(number, &from)? {
        println!("{} ({})", snap.name(), brief_of(changes.as_ref()));
        if let Some(c) = changes.filter(|c| !c.is_empty()) {
            print!("{}", c.describe(WIDTH));
        }
    }
    Ok(())
}
