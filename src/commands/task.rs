use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args, Subcommand};
use rusqlite::Connection;

use crate::core::TaskService;
use crate::error::Result;
use crate::id::{OwnerId, TaskId};
use crate::types::{CreateTaskInput, ListTasksFilter, Priority, Status, Task, UpdateTaskInput};

/// Parse TaskId from CLI string (requires prefix)
pub(crate) fn parse_task_id(s: &str) -> std::result::Result<TaskId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_priority(s: &str) -> std::result::Result<Priority, String> {
    s.parse()
}

fn parse_status(s: &str) -> std::result::Result<Status, String> {
    s.parse()
}

/// Accepts RFC 3339 or a plain date (midnight UTC).
fn parse_due(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{s}' (expected YYYY-MM-DD or RFC 3339)"))?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

#[derive(Subcommand, Clone)]
pub enum TaskCommand {
    Create(CreateArgs),
    Get {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    List(ListArgs),
    Update(UpdateArgs),
    /// Begin work on a task (todo -> in_progress)
    Start {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Mark a task completed; dependents are re-evaluated
    Complete {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Reopen a completed task; dependents re-block
    Reopen {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Delete a task, its subtasks, and every edge touching them
    Delete {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    Tree(TreeArgs),
}

#[derive(Args, Clone)]
pub struct CreateArgs {
    #[arg(short = 't', long)]
    pub title: String,

    #[arg(short = 'd', long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_task_id)]
    pub parent: Option<TaskId>,

    /// low, medium (default), or high
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    #[arg(long, value_parser = parse_due)]
    pub due: Option<DateTime<Utc>>,

    #[arg(long = "depends-on", value_delimiter = ',', value_parser = parse_task_id)]
    pub depends_on: Vec<TaskId>,
}

#[derive(Args, Clone)]
pub struct ListArgs {
    #[arg(long, value_parser = parse_task_id, conflicts_with = "roots")]
    pub parent: Option<TaskId>,

    /// todo, in_progress, completed, or blocked
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,

    /// Only top-level tasks
    #[arg(long)]
    pub roots: bool,
}

#[derive(Args, Clone)]
pub struct UpdateArgs {
    #[arg(value_parser = parse_task_id)]
    pub id: TaskId,

    #[arg(short = 't', long)]
    pub title: Option<String>,

    #[arg(short = 'd', long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    #[arg(long, value_parser = parse_due)]
    pub due: Option<DateTime<Utc>>,

    #[arg(long, value_parser = parse_task_id)]
    pub parent: Option<TaskId>,
}

#[derive(Args, Clone)]
pub struct TreeArgs {
    /// Root task to print; all roots when omitted
    #[arg(value_parser = parse_task_id)]
    pub id: Option<TaskId>,
}

pub enum TaskResult {
    One(Task),
    Many(Vec<Task>),
    Deleted(Task),
    Trees(Vec<TaskTree>),
}

/// One root task with its subtasks, for display and JSON output.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTree {
    pub task: Task,
    pub subtasks: Vec<Task>,
}

pub fn handle(conn: &Connection, owner: OwnerId, cmd: TaskCommand) -> Result<TaskResult> {
    let svc = TaskService::new(conn, owner);

    match cmd {
        TaskCommand::Create(args) => {
            let input = CreateTaskInput {
                title: args.title,
                description: args.description,
                parent_id: args.parent,
                priority: args.priority,
                due_date: args.due,
                depends_on: args.depends_on,
            };
            Ok(TaskResult::One(svc.create(&input)?))
        }

        TaskCommand::Get { id } => Ok(TaskResult::One(svc.get(&id)?)),

        TaskCommand::List(args) => {
            let filter = ListTasksFilter {
                parent_id: args.parent,
                status: args.status,
                roots: args.roots,
            };
            Ok(TaskResult::Many(svc.list(&filter)?))
        }

        TaskCommand::Update(args) => {
            let input = UpdateTaskInput {
                title: args.title,
                description: args.description,
                priority: args.priority,
                due_date: args.due,
                parent_id: args.parent,
            };
            Ok(TaskResult::One(svc.update(&args.id, &input)?))
        }

        TaskCommand::Start { id } => Ok(TaskResult::One(svc.start(&id)?)),

        TaskCommand::Complete { id } => Ok(TaskResult::One(svc.complete(&id)?)),

        TaskCommand::Reopen { id } => Ok(TaskResult::One(svc.reopen(&id)?)),

        TaskCommand::Delete { id } => Ok(TaskResult::Deleted(svc.delete(&id)?)),

        TaskCommand::Tree(args) => {
            let roots = match args.id {
                Some(id) => vec![svc.get(&id)?],
                None => svc.list(&ListTasksFilter {
                    roots: true,
                    ..Default::default()
                })?,
            };
            let mut trees = Vec::with_capacity(roots.len());
            for root in roots {
                let subtasks = svc.subtasks(&root.id)?;
                trees.push(TaskTree {
                    task: root,
                    subtasks,
                });
            }
            Ok(TaskResult::Trees(trees))
        }
    }
}
