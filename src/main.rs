//! # Stellar — to-do list CLI
//!
//! A file-backed to-do list with search, filters, sorting, JSON
//! export/import, an interactive TUI and an AI assistant that breaks a
//! prompt into subtasks.
//!
//! ## Key Features
//!
//! - **Task CRUD**: titles, descriptions, due dates, priorities, tags and
//!   subtasks, persisted to a single JSON file on every change
//! - **View Pipeline**: case-insensitive search plus priority filter and
//!   three sort keys, all non-destructive
//! - **Manual Ordering**: an explicit reorder rewrites dense display
//!   indices that survive restarts
//! - **Assistant**: sends a prompt to a completion service (via the
//!   bundled proxy or a direct key) and appends the reply as subtasks
//! - **Proxy Server**: `stellar serve` exposes the completion API behind a
//!   server-held credential
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a task
//! stellar add "Buy milk" --priority low --tag errands
//!
//! # List high-priority tasks, sorted by due date
//! stellar list --priority high --sort due
//!
//! # Launch the interactive UI
//! stellar ui
//!
//! # Break a prompt into subtasks (proxy must be running: stellar serve)
//! stellar assist "plan a small dinner party"
//! ```
//!
//! Data is stored locally in `~/.stellar/tasks.json`; `--db` points the
//! CLI at any other file.

use std::path::PathBuf;

use clap::Parser;

pub mod assist;
pub mod cli;
pub mod cmd;
pub mod fields;
pub mod server;
pub mod store;
pub mod task;
pub mod view;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod run;
}

use cli::Cli;
use cmd::*;
use store::{FileStorage, Store};

fn main() {
    let cli = Cli::parse();

    // Commands that never touch the store.
    match &cli.command {
        Commands::Serve { port } => {
            cmd_serve(*port);
            return;
        }
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            return;
        }
        _ => {}
    }

    let db_path = cli.db.unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let dir = PathBuf::from(home).join(".stellar");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("Failed to create {}: {}", dir.display(), e);
            std::process::exit(1);
        }
        dir.join("tasks.json")
    });

    if let Commands::Ui = cli.command {
        cmd_ui(&db_path);
        return;
    }

    let mut store = Store::open(Box::new(FileStorage::new(&db_path)));

    match cli.command {
        Commands::Ui => unreachable!("UI command handled above"),
        Commands::Serve { .. } => unreachable!("serve handled above"),
        Commands::Completions { .. } => unreachable!("completions handled above"),

        Commands::Add { title, desc, due, priority, tags } =>
            cmd_add(&mut store, title, desc, due, priority, tags),

        Commands::List { search, priority, sort } =>
            cmd_list(&store, search, priority, sort),

        Commands::View { id } => cmd_view(&store, id),

        Commands::Update { id, title, desc, due, priority, add_tags, rm_tags, clear_due, clear_desc } =>
            cmd_update(&mut store, id, title, desc, due, priority, add_tags, rm_tags, clear_due, clear_desc),

        Commands::Toggle { id } => cmd_toggle(&mut store, id),

        Commands::Subtask { action } => cmd_subtask(&mut store, action),

        Commands::Delete { id, yes } => cmd_delete(&mut store, id, yes),

        Commands::Reorder { ids } => cmd_reorder(&mut store, ids),

        Commands::Export { output } => cmd_export(&store, output),

        Commands::Import { input, no_backup } =>
            cmd_import(&mut store, &db_path, input, no_backup),

        Commands::Assist { prompt, key, proxy_url } =>
            cmd_assist(&mut store, prompt, key, proxy_url),
    }
}
