use crate::calendar::{self, Cell, MonthCursor, MonthGrid, WEEKDAYS};
use crate::cli::CategoryCommand;
use crate::filter::Filter;
use crate::model::{parse_hex_color, Task, Theme};
use crate::session::{self, today, Session};
use crate::storage::{init_project_store, locate_store, DirStore, StoreLocation};
use crate::{logging, ui};
use anyhow::{anyhow, bail, Context, Result};
use dialoguer::theme::ColorfulTheme;
use std::env;
use std::path::PathBuf;

pub fn init() -> Result<()> {
    let location = init_project_store()?;
    println!("Initialized store at {}", location.dir.display());
    Ok(())
}

pub fn list(data_dir: Option<PathBuf>, category: Option<String>) -> Result<()> {
    let (session, location) = open_session(data_dir)?;
    let tracker = session.tracker();
    let filter = category
        .as_deref()
        .map(Filter::from_label)
        .unwrap_or_default();
    println!(
        "Tasks [{}] ({})",
        filter.label(),
        location.scope.label()
    );
    let mut shown = 0;
    for task in filter.visible(&tracker.tasks) {
        print_task(task);
        shown += 1;
    }
    if shown == 0 {
        println!("  (empty)");
    }
    Ok(())
}

pub fn add(data_dir: Option<PathBuf>, text: String, category: Option<String>) -> Result<()> {
    let (mut session, _) = open_session(data_dir)?;
    let category = match category {
        Some(name) => {
            if session.tracker().category(&name).is_none() {
                bail!("unknown category: {}", name);
            }
            name
        }
        None => session
            .tracker()
            .categories
            .first()
            .map(|c| c.name.clone())
            .ok_or_else(|| anyhow!("no categories defined"))?,
    };
    match session.add_task(&text, &category)? {
        Some(id) => println!("Added task {} to {}", id, category),
        None => println!("Nothing to add: task text is empty"),
    }
    Ok(())
}

pub fn edit(data_dir: Option<PathBuf>, task_id: String, text: String) -> Result<()> {
    let (mut session, _) = open_session(data_dir)?;
    let changed = session
        .edit_task(&task_id, &text)
        .with_context(|| format!("editing task {}", task_id))?;
    report(changed, format!("Updated task {}", task_id));
    Ok(())
}

pub fn toggle(data_dir: Option<PathBuf>, task_id: String) -> Result<()> {
    let (mut session, _) = open_session(data_dir)?;
    let completed = session
        .toggle_task(&task_id, today())
        .with_context(|| format!("toggling task {}", task_id))?;
    if completed {
        println!("Completed task {}", task_id);
    } else {
        println!("Reopened task {}", task_id);
    }
    Ok(())
}

pub fn delete(data_dir: Option<PathBuf>, task_id: String) -> Result<()> {
    let (mut session, _) = open_session(data_dir)?;
    session
        .delete_task(&task_id, today())
        .with_context(|| format!("deleting task {}", task_id))?;
    println!("Deleted task {}", task_id);
    Ok(())
}

pub fn category(data_dir: Option<PathBuf>, command: CategoryCommand) -> Result<()> {
    let (mut session, _) = open_session(data_dir)?;
    match command {
        CategoryCommand::List => {
            let tracker = session.tracker();
            for category in &tracker.categories {
                let count = tracker
                    .tasks
                    .iter()
                    .filter(|t| t.category == category.name)
                    .count();
                println!("{} {} ({})", category.color, category.name, count);
            }
        }
        CategoryCommand::Add { name, color } => {
            let color = check_color(&color)?;
            let changed = session.add_category(&name, &color)?;
            report(changed, format!("Added category {}", name.trim()));
        }
        CategoryCommand::Rename { old, new, color } => {
            let color = match color {
                Some(c) => check_color(&c)?,
                None => session
                    .tracker()
                    .category(&old)
                    .map(|c| c.color.clone())
                    .ok_or_else(|| anyhow!("category not found: {}", old))?,
            };
            let changed = session
                .rename_category(&old, &new, &color)
                .with_context(|| format!("renaming category {}", old))?;
            report(changed, format!("Renamed {} to {}", old, new.trim()));
        }
        CategoryCommand::Recolor { name, color } => {
            let color = check_color(&color)?;
            let changed = session
                .recolor_category(&name, &color)
                .with_context(|| format!("recoloring category {}", name))?;
            report(changed, format!("Recolored {} to {}", name, color));
        }
        CategoryCommand::Delete { name, yes } => {
            let mut prompt = TerminalConfirm { assume_yes: yes };
            let deleted = session
                .delete_category(&name, &mut prompt)
                .with_context(|| format!("deleting category {}", name))?;
            if deleted {
                println!("Deleted category {}", name);
            } else {
                println!("Kept category {}", name);
            }
        }
    }
    Ok(())
}

pub fn calendar(data_dir: Option<PathBuf>, month: Option<String>) -> Result<()> {
    let (session, _) = open_session(data_dir)?;
    let cursor = match month {
        Some(raw) => MonthCursor::parse(&raw)
            .ok_or_else(|| anyhow!("invalid month (use YYYY-MM): {}", raw))?,
        None => MonthCursor::containing(today()),
    };
    let tracker = session.tracker();
    let grid = calendar::render_for(tracker, cursor);
    print!("{}", format_grid(&grid));
    println!();
    for entry in calendar::legend(&tracker.categories) {
        println!("  {} {}", entry.color, entry.name);
    }
    Ok(())
}

pub fn theme(data_dir: Option<PathBuf>, theme: Option<Theme>) -> Result<()> {
    let (mut session, _) = open_session(data_dir)?;
    match theme {
        Some(theme) => {
            session.set_theme(theme)?;
            println!("Theme set to {}", theme);
        }
        None => println!("{}", session.tracker().theme),
    }
    Ok(())
}

pub fn tui(data_dir: Option<PathBuf>) -> Result<()> {
    let location = current_location(data_dir)?;
    logging::init_file(&location.dir)?;
    let session = Session::open(DirStore::new(location.clone()))?;
    ui::run(session, location)
}

fn current_location(data_dir: Option<PathBuf>) -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    locate_store(&cwd, data_dir)
}

fn open_session(data_dir: Option<PathBuf>) -> Result<(Session<DirStore>, StoreLocation)> {
    let location = current_location(data_dir)?;
    let session = Session::open(DirStore::new(location.clone()))
        .with_context(|| format!("opening store at {}", location.dir.display()))?;
    Ok((session, location))
}

fn check_color(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if parse_hex_color(trimmed).is_none() {
        bail!("invalid color (use #rrggbb): {}", trimmed);
    }
    Ok(trimmed.to_lowercase())
}

/// Interactive y/N prompt; `--yes` skips it. Fails when stdin is not a terminal.
struct TerminalConfirm {
    assume_yes: bool,
}

impl session::Confirm for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let answer = dialoguer::Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("confirmation needs a terminal (pass --yes to skip it)")?;
        Ok(answer)
    }
}

fn report(changed: bool, message: String) {
    if changed {
        println!("{}", message);
    } else {
        println!("Nothing changed");
    }
}

fn print_task(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    println!("  [{}] {}: {} ({})", mark, task.id, task.text, task.category);
    if let Some(done) = task.completed_on {
        println!("      completed {}", done.format("%Y-%m-%d"));
    }
}

fn format_grid(grid: &MonthGrid) -> String {
    let mut out = format!("{}\n", grid.title);
    out.push_str(
        &WEEKDAYS
            .iter()
            .map(|d| format!("{:>5}", d))
            .collect::<Vec<_>>()
            .join(""),
    );
    out.push('\n');
    let mut details = Vec::new();
    for week in grid.weeks() {
        for cell in week {
            match cell {
                Cell::Blank => out.push_str("     "),
                Cell::Day { date, markers } => {
                    let total: u32 = markers.iter().map(|m| m.count).sum();
                    let flag = if total > 0 { "*" } else { " " };
                    out.push_str(&format!("{:>4}{}", date.format("%-d"), flag));
                    for marker in markers {
                        details.push(format!("  {} {}", date.format("%Y-%m-%d"), marker.label));
                    }
                }
            }
        }
        out.push('\n');
    }
    for line in details {
        out.push_str(&line);
        out.push('\n');
    }
    out
}
