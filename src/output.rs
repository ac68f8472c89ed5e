use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style};

use crate::commands::{dep::DependencyListing, task::TaskTree, DepCommand, TaskCommand};
use crate::types::{DependencyCheck, DependencyEdge, Priority, Status, Task};
use crate::Command;

/// Color policy: --no-color > NO_COLOR env > TERM=dumb > !isatty > default (color)
fn should_use_color_for(no_color_flag: bool, is_tty: bool) -> bool {
    if no_color_flag {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("TERM").ok().as_deref() == Some("dumb") {
        return false;
    }
    is_tty
}

fn should_use_color(no_color_flag: bool) -> bool {
    should_use_color_for(no_color_flag, std::io::stdout().is_terminal())
}

fn should_use_color_stderr(no_color_flag: bool) -> bool {
    should_use_color_for(no_color_flag, std::io::stderr().is_terminal())
}

/// Color scheme for output
struct Colors {
    task_id: Style,
    completed: Style,
    todo: Style,
    in_progress: Style,
    blocked: Style,
    priority_high: Style,
    priority_low: Style,
    tree_line: Style,
    error: Style,
}

impl Colors {
    fn new(use_color: bool) -> Self {
        if use_color {
            Self {
                task_id: Style::new().cyan().dimmed(),
                completed: Style::new().green(),
                todo: Style::new().yellow(),
                in_progress: Style::new().cyan(),
                blocked: Style::new().red(),
                priority_high: Style::new().red(),
                priority_low: Style::new().dimmed(),
                tree_line: Style::new().dimmed(),
                error: Style::new().red().bold(),
            }
        } else {
            // No-op styles when color disabled
            Self {
                task_id: Style::new(),
                completed: Style::new(),
                todo: Style::new(),
                in_progress: Style::new(),
                blocked: Style::new(),
                priority_high: Style::new(),
                priority_low: Style::new(),
                tree_line: Style::new(),
                error: Style::new(),
            }
        }
    }
}

/// Handles human-readable CLI output. JSON mode bypasses this entirely.
pub struct Printer {
    colors: Colors,
}

impl Printer {
    /// Create printer for stdout (standard output)
    pub fn new(no_color_flag: bool) -> Self {
        let use_color = should_use_color(no_color_flag);
        Self {
            colors: Colors::new(use_color),
        }
    }

    /// Create printer for stderr (error output)
    pub fn new_for_stderr(no_color_flag: bool) -> Self {
        let use_color = should_use_color_stderr(no_color_flag);
        Self {
            colors: Colors::new(use_color),
        }
    }

    /// Print an error message to stderr with appropriate coloring
    pub fn print_error(&self, message: &str) {
        eprintln!("{}", message.style(self.colors.error));
    }

    fn fmt_id(&self, id: &impl std::fmt::Display) -> String {
        format!("{}", id.to_string().style(self.colors.task_id))
    }

    fn status_symbol_style(&self, status: Status) -> (&'static str, Style) {
        match status {
            Status::Completed => ("✓", self.colors.completed),
            Status::Blocked => ("⊘", self.colors.blocked),
            Status::InProgress => ("◐", self.colors.in_progress),
            Status::Todo => ("○", self.colors.todo),
        }
    }

    fn priority_tag(&self, priority: Priority) -> Option<String> {
        match priority {
            Priority::High => Some(format!("{}", "[high]".style(self.colors.priority_high))),
            Priority::Low => Some(format!("{}", "[low]".style(self.colors.priority_low))),
            Priority::Medium => None,
        }
    }

    pub fn print(&self, command: &Command, output: &str) {
        match command {
            Command::Init => println!("Initialized foreman database"),
            Command::Task(TaskCommand::Delete { .. }) => {
                self.print_deleted(output);
            }
            Command::Task(TaskCommand::List(_)) => {
                self.print_task_list(output);
            }
            Command::Task(TaskCommand::Tree(_)) => {
                self.print_task_trees(output);
            }
            Command::Task(_) => {
                self.print_task(output);
            }
            Command::Dep(DepCommand::Add(_)) => {
                self.print_edge(output, "Dependency added");
            }
            Command::Dep(DepCommand::Remove(_)) => {
                self.print_edge(output, "Dependency removed");
            }
            Command::Dep(DepCommand::Check(_)) => {
                self.print_dep_check(output);
            }
            Command::Dep(DepCommand::List { .. }) => {
                self.print_dep_listing(output);
            }
            // Completions bypass the printer entirely
            Command::Completions { .. } => {}
        }
    }

    fn task_line(&self, task: &Task) -> String {
        let (symbol, style) = self.status_symbol_style(task.status);
        let mut line = format!(
            "{} {} {}",
            symbol.style(style),
            task.title,
            self.fmt_id(&task.id)
        );
        if let Some(tag) = self.priority_tag(task.priority) {
            line.push(' ');
            line.push_str(&tag);
        }
        if let Some(due) = task.due_date {
            line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
        }
        line
    }

    fn print_task(&self, output: &str) {
        let Ok(task) = serde_json::from_str::<Task>(output) else {
            println!("{}", output);
            return;
        };

        println!("{}", self.task_line(&task));
        if !task.description.is_empty() {
            println!("  {}", task.description);
        }
        println!("  status: {}", task.status);
        if let Some(ref parent_id) = task.parent_id {
            println!("  parent: {}", self.fmt_id(parent_id));
        }
        if !task.depends_on.is_empty() {
            let ids: Vec<String> = task.depends_on.iter().map(|d| self.fmt_id(d)).collect();
            println!("  depends on: {}", ids.join(", "));
        }
        if !task.dependents.is_empty() {
            let ids: Vec<String> = task.dependents.iter().map(|d| self.fmt_id(d)).collect();
            println!("  dependents: {}", ids.join(", "));
        }
    }

    fn print_deleted(&self, output: &str) {
        match serde_json::from_str::<Task>(output) {
            Ok(task) => println!("Deleted: {} {}", task.title, self.fmt_id(&task.id)),
            Err(_) => println!("Task deleted"),
        }
    }

    fn print_task_list(&self, output: &str) {
        let Ok(tasks) = serde_json::from_str::<Vec<Task>>(output) else {
            println!("{}", output);
            return;
        };

        if tasks.is_empty() {
            println!("No tasks");
            return;
        }
        for task in &tasks {
            println!("{}", self.task_line(task));
        }
    }

    fn print_task_trees(&self, output: &str) {
        let Ok(trees) = serde_json::from_str::<Vec<TaskTree>>(output) else {
            println!("{}", output);
            return;
        };

        if trees.is_empty() {
            println!("No tasks");
            return;
        }
        for tree in &trees {
            println!("{}", self.task_line(&tree.task));
            let last = tree.subtasks.len().saturating_sub(1);
            for (i, sub) in tree.subtasks.iter().enumerate() {
                let branch = if i == last { "└─" } else { "├─" };
                println!(
                    "{} {}",
                    branch.style(self.colors.tree_line),
                    self.task_line(sub)
                );
            }
        }
    }

    fn print_edge(&self, output: &str, verb: &str) {
        match serde_json::from_str::<DependencyEdge>(output) {
            Ok(edge) => println!(
                "{}: {} -> {}",
                verb,
                self.fmt_id(&edge.task_id),
                self.fmt_id(&edge.depends_on_id)
            ),
            Err(_) => println!("{}", output),
        }
    }

    fn print_dep_check(&self, output: &str) {
        let Ok(check) = serde_json::from_str::<DependencyCheck>(output) else {
            println!("{}", output);
            return;
        };

        if check.would_create_cycle {
            println!(
                "{} {} -> {} would create a cycle",
                "⊘".style(self.colors.blocked),
                self.fmt_id(&check.task_id),
                self.fmt_id(&check.depends_on_id)
            );
        } else {
            println!(
                "{} {} -> {} is safe to add",
                "✓".style(self.colors.completed),
                self.fmt_id(&check.task_id),
                self.fmt_id(&check.depends_on_id)
            );
        }
    }

    fn print_dep_listing(&self, output: &str) {
        let Ok(listing) = serde_json::from_str::<DependencyListing>(output) else {
            println!("{}", output);
            return;
        };

        println!("{}", self.fmt_id(&listing.task_id));
        if listing.depends_on.is_empty() && listing.dependents.is_empty() {
            println!("  no dependencies");
            return;
        }
        for dep in &listing.depends_on {
            println!("  depends on {}", self.fmt_id(dep));
        }
        for dep in &listing.dependents {
            println!("  blocks {}", self.fmt_id(dep));
        }
    }
}
