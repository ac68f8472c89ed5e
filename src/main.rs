use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

mod commands;
mod core;
mod db;
mod error;
mod id;
mod output;
mod types;

use commands::{dep, task, DepCommand, DepResult, TaskCommand, TaskResult};
use id::OwnerId;
use output::Printer;

#[derive(Parser)]
#[command(name = "fm")]
#[command(version)]
#[command(
    about = "Foreman - dependency-aware task tracking",
    long_about = r#"
Foreman (fm) - task tracking with a dependency consistency engine.

Features:
  • 2-level task hierarchy: task → subtask
  • Cycle-safe depends-on edges between tasks
  • Automatic blocked/ready status propagation
  • Per-owner task partitions

Environment:
  FOREMAN_DB_PATH  Override database location
  FOREMAN_OWNER    Default owner name
  NO_COLOR         Disable colored output
"#
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output in JSON format (for programmatic use)
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Override database path (default: CWD/.foreman/tasks.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Owner whose tasks to operate on (default: FOREMAN_OWNER or "default")
    #[arg(long, global = true)]
    owner: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Task management (CRUD, lifecycle, queries)
    #[command(subcommand)]
    Task(TaskCommand),

    /// Dependency edges (add, remove, check, list)
    #[command(subcommand)]
    Dep(DepCommand),

    /// Generate shell completions
    #[command(
        about = "Generate shell completions",
        long_about = r#"
Generate shell completions for the fm CLI.

Examples:
  fm completions bash > ~/.local/share/bash-completion/completions/fm
  fm completions zsh > ~/.zfunc/_fm
  fm completions fish > ~/.config/fish/completions/fm.fish
"#
    )]
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },

    /// Initialize database in current directory
    #[command(
        about = "Initialize database",
        long_about = r#"
Initialize the Foreman database.

The database is created at:
  1. FOREMAN_DB_PATH (if set)
  2. CWD/.foreman/tasks.db

Usually runs automatically on first command.
"#
    )]
    Init,
}

/// Determine the default database path.
///
/// Resolution order:
/// 1. FOREMAN_DB_PATH env var (if set)
/// 2. Current working directory -> .foreman/tasks.db
fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("FOREMAN_DB_PATH") {
        return PathBuf::from(path);
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join(".foreman").join("tasks.db")
}

fn resolve_owner(flag: Option<&str>) -> error::Result<OwnerId> {
    let name = match flag {
        Some(name) => name.to_string(),
        None => std::env::var("FOREMAN_OWNER").unwrap_or_else(|_| "default".to_string()),
    };
    Ok(OwnerId::new(&name)?)
}

fn main() {
    let cli = Cli::parse();

    // PRECONDITION: Completions bypass normal output flow - raw shell script to stdout
    if let Command::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "fm", &mut io::stdout());
        return;
    }

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);

    let result = run(&cli.command, &db_path, cli.owner.as_deref());

    match result {
        Ok(output) => {
            if cli.json {
                println!("{}", output);
            } else {
                let printer = Printer::new(cli.no_color);
                printer.print(&cli.command, &output);
            }
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({ "error": e.to_string() });
                eprintln!("{}", err);
            } else {
                let printer = Printer::new_for_stderr(cli.no_color);
                printer.print_error(&format!("Error: {}", e));
            }
            std::process::exit(1);
        }
    }
}

fn run(command: &Command, db_path: &PathBuf, owner: Option<&str>) -> error::Result<String> {
    match command {
        Command::Init => {
            db::open_db(db_path)?;
            Ok(serde_json::json!({ "initialized": true, "path": db_path }).to_string())
        }
        Command::Task(cmd) => {
            let conn = db::open_db(db_path)?;
            let owner = resolve_owner(owner)?;
            match task::handle(&conn, owner, cmd.clone())? {
                TaskResult::One(t) => Ok(serde_json::to_string_pretty(&t)?),
                TaskResult::Many(ts) => Ok(serde_json::to_string_pretty(&ts)?),
                TaskResult::Deleted(t) => Ok(serde_json::to_string_pretty(&t)?),
                TaskResult::Trees(trees) => Ok(serde_json::to_string_pretty(&trees)?),
            }
        }
        Command::Dep(cmd) => {
            let conn = db::open_db(db_path)?;
            let owner = resolve_owner(owner)?;
            match dep::handle(&conn, owner, cmd.clone())? {
                DepResult::Added(edge) => Ok(serde_json::to_string_pretty(&edge)?),
                DepResult::Removed(edge) => Ok(serde_json::to_string_pretty(&edge)?),
                DepResult::Check(check) => Ok(serde_json::to_string_pretty(&check)?),
                DepResult::Listing(listing) => Ok(serde_json::to_string_pretty(&listing)?),
            }
        }
        // PRECONDITION: Completions handled in main() before run() is called
        Command::Completions { .. } => unreachable!("completions handled before run()"),
    }
}
