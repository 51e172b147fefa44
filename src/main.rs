mod calendar;
mod cli;
mod commands;
mod filter;
mod logging;
mod model;
mod session;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui);
    let data_dir = args.data_dir;
    if !matches!(command, cli::Command::Tui) {
        logging::init_stderr();
    }
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::List { category } => commands::list(data_dir, category),
        cli::Command::Add { text, category } => commands::add(data_dir, text, category),
        cli::Command::Edit { task_id, text } => commands::edit(data_dir, task_id, text),
        cli::Command::Toggle { task_id } => commands::toggle(data_dir, task_id),
        cli::Command::Delete { task_id } => commands::delete(data_dir, task_id),
        cli::Command::Category(cmd) => commands::category(data_dir, cmd),
        cli::Command::Calendar { month } => commands::calendar(data_dir, month),
        cli::Command::Theme { theme } => commands::theme(data_dir, theme),
        cli::Command::Tui => commands::tui(data_dir),
    }
}
