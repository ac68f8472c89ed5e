//! Status engine: the single writer of the `status` column.
//!
//! `recompute` applies the Blocked/ToDo decision table to one task; the
//! cascade pushes recomputation outward along incoming edges until no status
//! changes, so every mutation returns with statuses at a fixpoint. The
//! explicit transitions (`start`, `mark_completed`, `reopen`) live here too,
//! keeping every status write in one place.

use std::collections::{HashSet, VecDeque};

use rusqlite::Connection;

use crate::core::graph::GraphIndex;
use crate::db::task_repo;
use crate::error::{FmError, Result};
use crate::id::{OwnerId, TaskId};
use crate::types::{Status, Task};

pub struct StatusEngine<'a> {
    conn: &'a Connection,
    owner: &'a OwnerId,
}

impl<'a> StatusEngine<'a> {
    pub fn new(conn: &'a Connection, owner: &'a OwnerId) -> Self {
        Self { conn, owner }
    }

    fn graph(&self) -> GraphIndex<'a> {
        GraphIndex::new(self.conn, self.owner)
    }

    fn get_task(&self, id: &TaskId) -> Result<Task> {
        task_repo::get_task(self.conn, self.owner, id)?
            .ok_or_else(|| FmError::TaskNotFound(id.clone()))
    }

    /// Re-derive one task's status from its dependency targets. Returns
    /// whether the stored status changed.
    ///
    /// Only the Blocked <-> ToDo toggle is automatic: Completed is sticky and
    /// InProgress/Completed are never entered here. A task whose id no longer
    /// resolves (deleted mid-cascade) recomputes to nothing.
    pub fn recompute(&self, id: &TaskId) -> Result<bool> {
        let current = match task_repo::get_status(self.conn, self.owner, id)? {
            Some(status) => status,
            None => return Ok(false),
        };
        if current == Status::Completed {
            return Ok(false);
        }

        let mut has_incomplete_dep = false;
        for dep in self.graph().successors(id)? {
            let dep_status = task_repo::get_status(self.conn, self.owner, &dep)?;
            if dep_status != Some(Status::Completed) {
                has_incomplete_dep = true;
                break;
            }
        }

        let next = if has_incomplete_dep {
            Status::Blocked
        } else if current == Status::Blocked {
            Status::Todo
        } else {
            current
        };

        if next == current {
            return Ok(false);
        }

        task_repo::set_status(self.conn, self.owner, id, next)?;
        Ok(true)
    }

    /// Recompute every seed, then every predecessor of any task whose status
    /// changed, until the worklist drains. The queue carries pending ids and
    /// `queued` keeps each id enqueued at most once per pending input; the
    /// graph is acyclic, so the pass terminates. Returns how many statuses
    /// changed.
    pub fn cascade(&self, seeds: Vec<TaskId>) -> Result<usize> {
        let graph = self.graph();
        let mut queue: VecDeque<TaskId> = VecDeque::new();
        let mut queued: HashSet<TaskId> = HashSet::new();
        for seed in seeds {
            if queued.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }

        let mut changed = 0;
        while let Some(id) = queue.pop_front() {
            queued.remove(&id);
            if self.recompute(&id)? {
                changed += 1;
                for pred in graph.predecessors(&id)? {
                    if queued.insert(pred.clone()) {
                        queue.push_back(pred);
                    }
                }
            }
        }

        Ok(changed)
    }

    /// Recompute `id`; if its status changed, cascade outward from it.
    pub fn recompute_and_cascade(&self, id: &TaskId) -> Result<()> {
        if self.recompute(id)? {
            self.cascade(self.graph().predecessors(id)?)?;
        }
        Ok(())
    }

    /// Explicit ToDo -> InProgress. Idempotent when already in progress;
    /// blocked and completed tasks are rejected. Completion state is
    /// untouched, so no cascade runs.
    pub fn start(&self, id: &TaskId) -> Result<Task> {
        let task = self.get_task(id)?;
        match task.status {
            Status::Blocked => Err(FmError::TaskBlocked(id.clone())),
            Status::Completed => Err(FmError::AlreadyCompleted(id.clone())),
            Status::InProgress => Ok(task),
            Status::Todo => {
                task_repo::set_status(self.conn, self.owner, id, Status::InProgress)?;
                self.get_task(id)
            }
        }
    }

    /// Explicit completion. Gated on subtree completion; idempotent on an
    /// already-completed task. On success every dependent is re-evaluated,
    /// transitively.
    pub fn mark_completed(&self, id: &TaskId) -> Result<Task> {
        let task = self.get_task(id)?;
        if task.status == Status::Completed {
            return Ok(task);
        }
        if task_repo::has_incomplete_subtasks(self.conn, self.owner, id)? {
            return Err(FmError::SubtasksIncomplete(id.clone()));
        }

        task_repo::set_status(self.conn, self.owner, id, Status::Completed)?;
        self.cascade(self.graph().predecessors(id)?)?;
        self.get_task(id)
    }

    /// Explicit exit from Completed, the only one the engine permits. The
    /// task drops to ToDo (or straight back to Blocked if its own
    /// dependencies are incomplete) and dependents re-block transitively;
    /// completed dependents stay completed.
    pub fn reopen(&self, id: &TaskId) -> Result<Task> {
        let task = self.get_task(id)?;
        if task.status != Status::Completed {
            return Err(FmError::NotCompleted(id.clone()));
        }

        task_repo::set_status(self.conn, self.owner, id, Status::Todo)?;
        self.recompute(id)?;
        self.cascade(self.graph().predecessors(id)?)?;
        self.get_task(id)
    }
}
