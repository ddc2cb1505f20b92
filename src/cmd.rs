//! Command implementations for the CLI interface.
//!
//! Every subcommand the binary understands lives here, from the store CRUD
//! operations through JSON export/import to the assist bridge and the proxy
//! server. Handlers report failures to the operator and exit; nothing is
//! retried.

use clap::Subcommand;
use clap_complete::{generate, Shell};

use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::assist::{AssistClient, Transport};
use crate::fields::{format_priority, Priority, PriorityFilter, SortKey};
use crate::server;
use crate::store::{Store, TaskPatch};
use crate::task::{Subtask, Task};
use crate::tui::run::run_tui;
use crate::view::{self, ViewQuery};

/// Default proxy endpoint the assist command talks to.
const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8080/api/assist";

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive UI.
    Ui,

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Due date, YYYY-MM-DD.
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Priority: low | medium | high.
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List tasks with search, filter and sort.
    List {
        /// Case-insensitive substring matched against title, description
        /// and tags.
        #[arg(long)]
        search: Option<String>,
        /// Priority filter.
        #[arg(long, value_enum, default_value_t)]
        priority: PriorityFilter,
        /// Sort key: created | due | priority.
        #[arg(long, value_enum, default_value_t)]
        sort: SortKey,
    },

    /// View a single task by id, id prefix or title.
    View {
        id: String,
    },

    /// Update fields on a task.
    Update {
        /// Task id, id prefix or title.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Due date, YYYY-MM-DD.
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Add tags. May be repeated and comma-separated.
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        /// Remove tags. May be repeated and comma-separated.
        #[arg(long = "rm-tag")]
        rm_tags: Vec<String>,
        /// Clear the due date.
        #[arg(long)]
        clear_due: bool,
        /// Clear the description.
        #[arg(long)]
        clear_desc: bool,
    },

    /// Flip a task's completion flag.
    Toggle {
        id: String,
    },

    /// Manage subtasks of a task.
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },

    /// Delete a task (asks for confirmation).
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Rewrite display order to match the given id sequence.
    Reorder {
        /// Task ids, id prefixes or titles, in the desired order.
        ids: Vec<String>,
    },

    /// Export all tasks to a JSON array file.
    Export {
        /// Output file path (default: stellar-tasks.json).
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Import tasks from a JSON array file, replacing the store wholesale.
    Import {
        /// Input JSON file path.
        input: String,
        /// Skip creating a backup before import.
        #[arg(long)]
        no_backup: bool,
    },

    /// Generate subtasks from a prompt via the assistant.
    Assist {
        /// Free-text prompt describing what to break down.
        prompt: String,
        /// Call the completion API directly with this key instead of the
        /// proxy. Unsafe: the key is sent from this machine.
        #[arg(long)]
        key: Option<String>,
        /// Proxy endpoint to POST the prompt to.
        #[arg(long, default_value = DEFAULT_PROXY_URL)]
        proxy_url: String,
    },

    /// Run the assist proxy server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    /// Append a subtask to a task.
    Add {
        /// Task id, id prefix or title.
        id: String,
        /// Subtask text.
        text: String,
    },
    /// Flip a subtask's done flag.
    Toggle {
        /// Task id, id prefix or title.
        id: String,
        /// Subtask number as shown by `view` (1-based).
        number: usize,
    },
}

/// Launch the terminal user interface.
pub fn cmd_ui(db_path: &Path) {
    if let Err(e) = run_tui(db_path) {
        eprintln!("UI error: {e}");
        std::process::exit(1);
    }
}

/// Add a new task to the store.
pub fn cmd_add(
    store: &mut Store,
    title: String,
    desc: Option<String>,
    due: Option<NaiveDate>,
    priority: Priority,
    tags: Vec<String>,
) {
    let title = title.trim().to_string();
    if title.is_empty() {
        eprintln!("Title must not be empty.");
        std::process::exit(1);
    }

    let order = store.next_order();
    let mut task = Task::new(title, priority, order);
    task.description = desc;
    task.due_date = due;
    task.tags = split_tags(&tags);

    let id = task.id.clone();
    if let Err(e) = store.add(task) {
        eprintln!("Failed to save store: {e}");
        std::process::exit(1);
    }
    println!("Added task {id}");
}

/// List tasks through the view pipeline.
pub fn cmd_list(store: &Store, search: Option<String>, priority: PriorityFilter, sort: SortKey) {
    let query = ViewQuery {
        search: search.unwrap_or_default(),
        priority,
        sort,
    };
    let shown = view::visible(&store.tasks, &query);
    print_table(&shown);
}

/// View detailed information about a single task.
pub fn cmd_view(store: &Store, id: String) {
    let task_id = resolve_or_exit(store, &id);
    let Some(task) = store.get(&task_id) else {
        eprintln!("Task {task_id} not found.");
        std::process::exit(1);
    };
    println!("Id:        {}", task.id);
    println!("Title:     {}", task.title);
    println!("Done:      {}", if task.completed { "yes" } else { "no" });
    println!("Priority:  {}", format_priority(task.priority));
    println!(
        "Due:       {}",
        task.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
    );
    println!(
        "Tags:      {}",
        if task.tags.is_empty() { "-".into() } else { task.tags.join(",") }
    );
    println!("Created:   {}", task.created_at.to_rfc3339());
    println!(
        "Description:\n{}",
        task.description.clone().unwrap_or_else(|| "-".into())
    );
    if !task.subtasks.is_empty() {
        println!("Subtasks:");
        for (i, s) in task.subtasks.iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, if s.done { "x" } else { " " }, s.text);
        }
    }
}

/// Update an existing task's fields.
#[allow(clippy::too_many_arguments)]
pub fn cmd_update(
    store: &mut Store,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    due: Option<NaiveDate>,
    priority: Option<Priority>,
    add_tags: Vec<String>,
    rm_tags: Vec<String>,
    clear_due: bool,
    clear_desc: bool,
) {
    if let Some(t) = &title {
        if t.trim().is_empty() {
            eprintln!("Title must not be empty.");
            std::process::exit(1);
        }
    }
    let task_id = resolve_or_exit(store, &id);
    let patch = TaskPatch {
        title,
        description: desc,
        due_date: due,
        priority,
        completed: None,
        add_tags: split_tags(&add_tags),
        rm_tags: split_tags(&rm_tags),
        clear_due,
        clear_description: clear_desc,
    };
    match store.update(&task_id, patch) {
        Ok(true) => println!("Updated {task_id}"),
        Ok(false) => {
            eprintln!("Task {task_id} not found.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to save store: {e}");
            std::process::exit(1);
        }
    }
}

/// Flip a task's completion flag.
pub fn cmd_toggle(store: &mut Store, id: String) {
    let task_id = resolve_or_exit(store, &id);
    match store.toggle(&task_id) {
        Ok(true) => {
            let done = store.get(&task_id).map(|t| t.completed).unwrap_or(false);
            println!("{} {}", if done { "Completed" } else { "Reopened" }, task_id);
        }
        Ok(false) => {
            eprintln!("Task {task_id} not found.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to save store: {e}");
            std::process::exit(1);
        }
    }
}

/// Add or toggle a subtask.
pub fn cmd_subtask(store: &mut Store, action: SubtaskAction) {
    match action {
        SubtaskAction::Add { id, text } => {
            let task_id = resolve_or_exit(store, &id);
            match store.append_subtasks(&task_id, vec![Subtask::new(text)]) {
                Ok(true) => println!("Added subtask to {task_id}"),
                Ok(false) => {
                    eprintln!("Task {task_id} not found.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Failed to save store: {e}");
                    std::process::exit(1);
                }
            }
        }
        SubtaskAction::Toggle { id, number } => {
            let task_id = resolve_or_exit(store, &id);
            let sub_id = store
                .get(&task_id)
                .and_then(|t| t.subtasks.get(number.wrapping_sub(1)))
                .map(|s| s.id.clone());
            let Some(sub_id) = sub_id else {
                eprintln!("Task {task_id} has no subtask {number}.");
                std::process::exit(1);
            };
            match store.toggle_subtask(&task_id, &sub_id) {
                Ok(true) => println!("Toggled subtask {number} of {task_id}"),
                Ok(false) => {
                    eprintln!("Task {task_id} has no subtask {number}.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Failed to save store: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Delete a task after a blocking confirmation.
pub fn cmd_delete(store: &mut Store, id: String, yes: bool) {
    let task_id = resolve_or_exit(store, &id);
    let title = store.get(&task_id).map(|t| t.title.clone()).unwrap_or_default();
    if !yes && !confirm(&format!("Delete task '{title}'?")) {
        println!("Aborted.");
        return;
    }
    match store.remove(&task_id) {
        Ok(true) => println!("Deleted {task_id}"),
        Ok(false) => {
            eprintln!("Task {task_id} not found.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to save store: {e}");
            std::process::exit(1);
        }
    }
}

/// Rewrite display order to match the given identifier sequence.
pub fn cmd_reorder(store: &mut Store, ids: Vec<String>) {
    if ids.is_empty() {
        eprintln!("Give at least one task id.");
        std::process::exit(1);
    }
    let resolved: Vec<String> = ids.iter().map(|i| resolve_or_exit(store, i)).collect();
    if let Err(e) = store.reorder(&resolved) {
        eprintln!("Failed to save store: {e}");
        std::process::exit(1);
    }
    println!("Reordered {} task(s).", store.tasks.len());
}

/// Export the full task sequence as a JSON array file.
pub fn cmd_export(store: &Store, output: Option<String>) {
    let output = output.unwrap_or_else(|| "stellar-tasks.json".to_string());
    let json = match serde_json::to_string_pretty(&store.tasks) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize tasks: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(&output, json) {
        eprintln!("Failed to write {output}: {e}");
        std::process::exit(1);
    }
    println!("Exported {} task(s) to {output}", store.tasks.len());
}

/// Import a JSON array file, replacing the store wholesale.
///
/// Anything that is not a JSON array of task records is rejected and the
/// store is left unchanged.
pub fn cmd_import(store: &mut Store, db_path: &Path, input: String, no_backup: bool) {
    let raw = match std::fs::read_to_string(&input) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Failed to read {input}: {e}");
            std::process::exit(1);
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Invalid JSON: {e}");
            std::process::exit(1);
        }
    };
    if !value.is_array() {
        eprintln!("Imported file must be a JSON array of tasks.");
        std::process::exit(1);
    }
    let tasks: Vec<Task> = match serde_json::from_value(value) {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("Invalid JSON: {e}");
            std::process::exit(1);
        }
    };

    if !no_backup && db_path.exists() {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let backup = db_path.with_file_name(format!("tasks-backup-{stamp}.json"));
        match std::fs::copy(db_path, &backup) {
            Ok(_) => println!("Backed up current store to {}", backup.display()),
            Err(e) => {
                eprintln!("Failed to create backup: {e}");
                std::process::exit(1);
            }
        }
    }

    let count = tasks.len();
    if let Err(e) = store.replace_all(tasks) {
        eprintln!("Failed to save store: {e}");
        std::process::exit(1);
    }
    println!("Imported {count} task(s).");
}

/// Ask the assistant for subtasks and attach them to the last task,
/// synthesizing a placeholder task when the store is empty.
pub fn cmd_assist(store: &mut Store, prompt: String, key: Option<String>, proxy_url: String) {
    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        eprintln!("Give the assistant a prompt.");
        std::process::exit(1);
    }
    let transport = match key {
        Some(api_key) => {
            eprintln!("Warning: direct mode sends your API key from this machine.");
            Transport::Direct { api_key }
        }
        None => Transport::Proxy { url: proxy_url },
    };
    let client = AssistClient::new(transport);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };
    let lines = match runtime.block_on(client.generate_subtasks(&prompt, &store.tasks)) {
        Ok(lines) => lines,
        Err(e) => {
            // Terminal for this operation; no retry.
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if lines.is_empty() {
        println!("Assistant returned no subtasks.");
        return;
    }

    let subtasks: Vec<Subtask> = lines.into_iter().map(Subtask::new).collect();
    let count = subtasks.len();

    let target_id = match store.last_task() {
        Some(t) => t.id.clone(),
        None => {
            let order = store.next_order();
            let mut placeholder = Task::new("AI generated task", Priority::Medium, order);
            placeholder.description = Some("From AI".into());
            let id = placeholder.id.clone();
            if let Err(e) = store.add(placeholder) {
                eprintln!("Failed to save store: {e}");
                std::process::exit(1);
            }
            id
        }
    };
    if let Err(e) = store.append_subtasks(&target_id, subtasks) {
        eprintln!("Failed to save store: {e}");
        std::process::exit(1);
    }
    let title = store.get(&target_id).map(|t| t.title.clone()).unwrap_or_default();
    println!("Assistant returned {count} subtask(s), attached to '{title}'.");
}

/// Run the assist proxy server until interrupted.
pub fn cmd_serve(port: u16) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let api_key = std::env::var("OPENAI_API_KEY").ok();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(server::serve(port, api_key)) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Split comma-separated tag inputs, trimming and dropping empties.
pub fn split_tags(inputs: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = part.trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

/// Print tasks in a formatted table.
fn print_table(tasks: &[&Task]) {
    println!(
        "{:<14} {:<4} {:<8} {:<11} {:<5} {}",
        "Id", "Done", "Pri", "Due", "Subs", "Title [tags]"
    );
    for t in tasks {
        let done = if t.completed { "[x]" } else { "[ ]" };
        let due = t.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        let subs = if t.subtasks.is_empty() {
            "-".to_string()
        } else {
            let done_count = t.subtasks.iter().filter(|s| s.done).count();
            format!("{}/{}", done_count, t.subtasks.len())
        };
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        println!(
            "{:<14} {:<4} {:<8} {:<11} {:<5} {}{}",
            truncate(&t.id, 14),
            done,
            format_priority(t.priority),
            due,
            subs,
            t.title,
            tags
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Blocking yes/no prompt on stdin. Defaults to no.
fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn resolve_or_exit(store: &Store, ident: &str) -> String {
    match store.resolve(ident) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
