use clap::{Args, Subcommand};
use rusqlite::Connection;

use crate::commands::task::parse_task_id;
use crate::core::TaskService;
use crate::error::Result;
use crate::id::{OwnerId, TaskId};
use crate::types::{DependencyCheck, DependencyEdge};

#[derive(Subcommand, Clone)]
pub enum DepCommand {
    /// Make a task depend on another (cycle-checked)
    Add(DepArgs),
    /// Remove a dependency edge
    Remove(DepArgs),
    /// Pre-flight a dependency without creating it
    Check(DepArgs),
    /// Show a task's dependencies and dependents
    List {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
}

#[derive(Args, Clone)]
pub struct DepArgs {
    #[arg(value_parser = parse_task_id)]
    pub id: TaskId,

    #[arg(long, value_parser = parse_task_id)]
    pub on: TaskId,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyListing {
    pub task_id: TaskId,
    pub depends_on: Vec<TaskId>,
    pub dependents: Vec<TaskId>,
}

pub enum DepResult {
    Added(DependencyEdge),
    Removed(DependencyEdge),
    Check(DependencyCheck),
    Listing(DependencyListing),
}

pub fn handle(conn: &Connection, owner: OwnerId, cmd: DepCommand) -> Result<DepResult> {
    let svc = TaskService::new(conn, owner);

    match cmd {
        DepCommand::Add(args) => Ok(DepResult::Added(svc.add_dependency(&args.id, &args.on)?)),

        DepCommand::Remove(args) => {
            Ok(DepResult::Removed(svc.remove_dependency(&args.id, &args.on)?))
        }

        DepCommand::Check(args) => {
            Ok(DepResult::Check(svc.validate_dependency(&args.id, &args.on)?))
        }

        DepCommand::List { id } => {
            let task = svc.get(&id)?;
            Ok(DepResult::Listing(DependencyListing {
                task_id: task.id,
                depends_on: task.depends_on,
                dependents: task.dependents,
            }))
        }
    }
}
