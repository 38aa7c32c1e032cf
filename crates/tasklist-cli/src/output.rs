//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use tasklist_core::{Snapshot, Task, TaskCounts, TaskFilter};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print a single task
    pub fn print_task(&self, task: &Task) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", task.id);
                println!("Text:      {}", task.text);
                println!(
                    "Status:    {}",
                    if task.completed { "completed" } else { "active" }
                );
                println!("Created:   {}", task.created_date.format("%Y-%m-%d %H:%M"));
                if let Some(done) = task.completed_date {
                    println!("Completed: {}", done.format("%Y-%m-%d %H:%M"));
                }
            }
            OutputFormat::Json => {
                println!("{}", to_json(task));
            }
            OutputFormat::Quiet => {
                println!("{}", task.id);
            }
        }
    }

    /// Print a list of tasks
    pub fn print_tasks(&self, tasks: &[&Task], filter: TaskFilter) {
        match self.format {
            OutputFormat::Human => {
                if tasks.is_empty() {
                    println!("{}", filter.empty_message());
                    return;
                }
                for task in tasks {
                    println!("{}", task_line(task));
                }
                println!("\n{} task(s)", tasks.len());
            }
            OutputFormat::Json => {
                println!("{}", to_json(&tasks));
            }
            OutputFormat::Quiet => {
                for task in tasks {
                    println!("{}", task.id);
                }
            }
        }
    }

    /// Print the snapshot as the task list view
    ///
    /// Shows the filtered list, the active/completed tallies and, when the
    /// last operation failed, its error. A snapshot still waiting on its
    /// first load shows only a loading line.
    pub fn print_snapshot(&self, snapshot: &Snapshot, filter: TaskFilter) {
        let tasks = snapshot.filtered(filter);
        match self.format {
            OutputFormat::Human => {
                if let Some(line) = loading_line(snapshot) {
                    println!("{}", line);
                    return;
                }
                self.print_tasks(&tasks, filter);
                let counts = snapshot.counts();
                println!("Active: {} | Completed: {}", counts.active, counts.completed);
                if let Some(error) = snapshot.error() {
                    self.error_banner(error);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    to_json(&serde_json::json!({
                        "filter": filter,
                        "loading": snapshot.is_blocking(),
                        "tasks": tasks,
                        "counts": snapshot.counts(),
                        "error": snapshot.error(),
                    }))
                );
            }
            OutputFormat::Quiet => self.print_tasks(&tasks, filter),
        }
    }

    /// Print active/completed tallies
    pub fn print_counts(&self, counts: TaskCounts) {
        match self.format {
            OutputFormat::Human => {
                println!("Active:    {}", counts.active);
                println!("Completed: {}", counts.completed);
                println!("Total:     {}", counts.total());
            }
            OutputFormat::Json => {
                println!("{}", to_json(&counts));
            }
            OutputFormat::Quiet => {
                println!("{} {}", counts.active, counts.completed);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print the error left on the snapshot by a failed operation
    pub fn error_banner(&self, error: &str) {
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "error", "message": error})
                );
            }
            _ => eprintln!("⚠ {}", error),
        }
    }
}

/// Blocking indicator for a snapshot with nothing to show yet
fn loading_line(snapshot: &Snapshot) -> Option<&'static str> {
    snapshot.is_blocking().then_some("Loading tasks...")
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

/// One-line summary of a task for list output
fn task_line(task: &Task) -> String {
    format!(
        "[{}] {} | {} | {}",
        if task.completed { "x" } else { " " },
        short_id(&task.id),
        truncate(&task.text, 50),
        task.created_date.format("%Y-%m-%d")
    )
}

/// First eight characters of an id
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
