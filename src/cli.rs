use crate::model::Theme;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Terminal task list with a completion calendar")]
pub struct Cli {
    /// Use this data directory instead of the discovered one
    #[arg(long, global = true, env = "TALLY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a project store in the current directory
    Init,
    /// List tasks
    List {
        /// Only show tasks in this category
        #[arg(long, short = 'c')]
        category: Option<String>,
    },
    /// Add a new task
    Add {
        /// Task text
        text: String,
        /// Category name (defaults to the first category)
        #[arg(long, short = 'c')]
        category: Option<String>,
    },
    /// Replace the text of a task
    Edit {
        /// Task id
        task_id: String,
        /// New text
        text: String,
    },
    /// Mark a task complete, or undo a completion
    Toggle {
        /// Task id
        task_id: String,
    },
    /// Delete a task
    Delete {
        /// Task id
        task_id: String,
    },
    /// Manage categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Show a month of completions
    Calendar {
        /// Month in YYYY-MM format (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Show or set the color theme
    Theme {
        /// light or dark
        theme: Option<Theme>,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// List categories
    List,
    /// Add a category
    Add {
        /// Category name
        name: String,
        /// Color as #rrggbb
        #[arg(long, default_value = "#10b981")]
        color: String,
    },
    /// Rename a category, carrying its tasks and completions along
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
        /// New color as #rrggbb (keeps the current color if omitted)
        #[arg(long)]
        color: Option<String>,
    },
    /// Change a category's color
    Recolor {
        /// Category name
        name: String,
        /// Color as #rrggbb
        color: String,
    },
    /// Delete a category; tasks keep the old name
    Delete {
        /// Category name
        name: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}
