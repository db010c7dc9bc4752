use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod util;
mod cmd_clean;
mod cmd_convert;
mod cmd_create;
mod cmd_default;
mod cmd_delete;
mod cmd_list;
mod cmd_status;
mod cmd_tag;
mod cmd_tree;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт warn (stdout остаётся для вывода команд).
    // Пример: RUST_LOG=debug apt-btrfs-snapshot tree
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let cfg = util::config(cli.mountpoint);
    match cli.cmd {
        cli::Cmd::Create { tag } => cmd_create::exec(cfg, tag),

        cli::Cmd::Status => cmd_status::exec(cfg),

        cli::Cmd::Show { name } => cmd_status::exec_show(cfg, name),

        cli::Cmd::Recent { number, snapshot } => cmd_status::exec_recent(cfg, number, snapshot),

        cli::Cmd::Tag { name, tag } => cmd_tag::exec(cfg, name, tag),

        cli::Cmd::List => cmd_list::exec(cfg, None),

        cli::Cmd::ListOlderThan { age } => cmd_list::exec(cfg, Some(age)),

        cli::Cmd::SetDefault { name, tag } => cmd_default::exec_set_default(cfg, name, tag),

        cli::Cmd::Rollback { number, tag } => cmd_default::exec_rollback(cfg, number, tag),

        cli::Cmd::Delete { name } => cmd_delete::exec(cfg, name),

        cli::Cmd::DeleteOlderThan { age } => cmd_delete::exec_older_than(cfg, age),

        cli::Cmd::Prune { name } => cmd_delete::exec_prune(cfg, name),

        cli::Cmd::Tree => cmd_tree::exec(cfg),

        cli::Cmd::Clean => cmd_clean::exec(cfg),

        // legacy volumes: link snapshots made before parent tracking
        cli::Cmd::Convert => cmd_convert::exec(cfg),
    }
}
