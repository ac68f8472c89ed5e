//! Mutation boundary for one owner's tasks and dependency edges.
//!
//! Every structural mutation enters here, gets validated (hierarchy guard,
//! cycle check, ownership), is written through the record store, and then
//! drives the status engine to a fixpoint before returning. Operations run
//! start-to-finish on one connection, so a caller never observes a partial
//! edge or status write. Different owners share no rows and can be served by
//! independent connections.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::core::graph::{CycleChecker, GraphIndex};
use crate::core::status::StatusEngine;
use crate::db::{edge_repo, task_repo};
use crate::error::{FmError, Result};
use crate::id::{OwnerId, TaskId};
use crate::types::{
    CreateTaskInput, DependencyCheck, DependencyEdge, ListTasksFilter, Task, UpdateTaskInput,
};

pub struct TaskService<'a> {
    conn: &'a Connection,
    owner: OwnerId,
}

impl<'a> TaskService<'a> {
    pub fn new(conn: &'a Connection, owner: OwnerId) -> Self {
        Self { conn, owner }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn engine(&self) -> StatusEngine<'_> {
        StatusEngine::new(self.conn, &self.owner)
    }

    fn graph(&self) -> GraphIndex<'_> {
        GraphIndex::new(self.conn, &self.owner)
    }

    /// Resolve a task in this owner's scope. A task that exists under a
    /// different owner is a cross-owner reference, not a missing one.
    fn ensure_visible(&self, id: &TaskId) -> Result<Task> {
        if let Some(task) = task_repo::get_task(self.conn, &self.owner, id)? {
            return Ok(task);
        }
        if task_repo::task_owner(self.conn, id)?.is_some() {
            return Err(FmError::CrossOwner(id.clone()));
        }
        Err(FmError::TaskNotFound(id.clone()))
    }

    /// Hierarchy guard: the candidate parent must exist, belong to this
    /// owner, and itself be a root (depth <= 1, no grandchildren).
    fn ensure_can_nest(&self, parent_id: &TaskId) -> Result<Task> {
        let parent = self.ensure_visible(parent_id).map_err(|e| match e {
            FmError::TaskNotFound(id) => FmError::ParentNotFound(id),
            other => other,
        })?;
        if parent.parent_id.is_some() {
            return Err(FmError::ParentAlreadyNested(parent_id.clone()));
        }
        Ok(parent)
    }

    pub fn create(&self, input: &CreateTaskInput) -> Result<Task> {
        if let Some(ref parent_id) = input.parent_id {
            self.ensure_can_nest(parent_id)?;
        }

        let mut seen: HashSet<&TaskId> = HashSet::new();
        for dep_id in &input.depends_on {
            self.ensure_visible(dep_id)?;
            if !seen.insert(dep_id) {
                return Err(FmError::DependencyExists {
                    task_id: TaskId::new(), // placeholder - task not created yet
                    depends_on_id: dep_id.clone(),
                });
            }
        }

        let task = task_repo::create_task(self.conn, &self.owner, input)?;
        // A fresh task has no predecessors, so these edges cannot close a
        // cycle and no cascade is needed beyond the task itself.
        for dep_id in &input.depends_on {
            edge_repo::put_edge(self.conn, &self.owner, &task.id, dep_id)?;
        }
        self.engine().recompute(&task.id)?;

        self.get(&task.id)
    }

    pub fn get(&self, id: &TaskId) -> Result<Task> {
        task_repo::get_task(self.conn, &self.owner, id)?
            .ok_or_else(|| FmError::TaskNotFound(id.clone()))
    }

    pub fn list(&self, filter: &ListTasksFilter) -> Result<Vec<Task>> {
        task_repo::list_tasks(self.conn, &self.owner, filter)
    }

    pub fn subtasks(&self, id: &TaskId) -> Result<Vec<Task>> {
        self.get(id)?;
        task_repo::list_subtasks(self.conn, &self.owner, id)
    }

    pub fn update(&self, id: &TaskId, input: &UpdateTaskInput) -> Result<Task> {
        self.get(id)?;

        if let Some(ref new_parent_id) = input.parent_id {
            if new_parent_id == id {
                return Err(FmError::OwnParent(id.clone()));
            }
            self.ensure_can_nest(new_parent_id)?;
            // Reparenting a task that has subtasks of its own would push
            // them to depth 2.
            if !task_repo::list_subtasks(self.conn, &self.owner, id)?.is_empty() {
                return Err(FmError::MaxDepthExceeded(id.clone()));
            }
        }

        task_repo::update_task(self.conn, &self.owner, id, input)
    }

    pub fn start(&self, id: &TaskId) -> Result<Task> {
        self.ensure_visible(id).and_then(|_| self.engine().start(id))
    }

    pub fn complete(&self, id: &TaskId) -> Result<Task> {
        self.ensure_visible(id)?;
        self.engine().mark_completed(id)
    }

    pub fn reopen(&self, id: &TaskId) -> Result<Task> {
        self.ensure_visible(id)?;
        self.engine().reopen(id)
    }

    /// Delete a task, its subtasks, and every incident edge, then re-derive
    /// the status of each surviving former dependent (a vanished dependency
    /// can unblock them). Returns the deleted record.
    pub fn delete(&self, id: &TaskId) -> Result<Task> {
        let task = self.get(id)?;
        let subtasks = task_repo::list_subtasks(self.conn, &self.owner, id)?;

        let graph = self.graph();
        let mut doomed: HashSet<TaskId> = subtasks.into_iter().map(|t| t.id).collect();
        doomed.insert(id.clone());

        let mut survivors: Vec<TaskId> = Vec::new();
        let mut seen: HashSet<TaskId> = HashSet::new();
        for gone in &doomed {
            for pred in graph.predecessors(gone)? {
                if !doomed.contains(&pred) && seen.insert(pred.clone()) {
                    survivors.push(pred);
                }
            }
        }

        task_repo::delete_task(self.conn, &self.owner, id)?;
        self.engine().cascade(survivors)?;

        Ok(task)
    }

    pub fn add_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
    ) -> Result<DependencyEdge> {
        self.ensure_visible(task_id)?;
        self.ensure_visible(depends_on_id)?;

        if task_id == depends_on_id {
            return Err(FmError::SelfDependency(task_id.clone()));
        }
        if edge_repo::edge_exists(self.conn, &self.owner, task_id, depends_on_id)? {
            return Err(FmError::DependencyExists {
                task_id: task_id.clone(),
                depends_on_id: depends_on_id.clone(),
            });
        }

        let graph = self.graph();
        if CycleChecker::new(&graph).would_create_cycle(task_id, depends_on_id)? {
            return Err(FmError::CycleDetected {
                task_id: task_id.clone(),
                depends_on_id: depends_on_id.clone(),
            });
        }

        let edge = edge_repo::put_edge(self.conn, &self.owner, task_id, depends_on_id)?;
        self.engine().recompute_and_cascade(task_id)?;
        Ok(edge)
    }

    pub fn remove_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
    ) -> Result<DependencyEdge> {
        self.ensure_visible(task_id)?;

        let edge = edge_repo::get_edge(self.conn, &self.owner, task_id, depends_on_id)?
            .ok_or_else(|| FmError::DependencyNotFound {
                task_id: task_id.clone(),
                depends_on_id: depends_on_id.clone(),
            })?;

        edge_repo::delete_edge(self.conn, &self.owner, task_id, depends_on_id)?;
        self.engine().recompute_and_cascade(task_id)?;
        Ok(edge)
    }

    /// Read-only pre-flight for a proposed edge. A self-loop reports a cycle
    /// rather than erroring, so UIs get one uniform answer.
    pub fn validate_dependency(
        &self,
        task_id: &TaskId,
        depends_on_id: &TaskId,
    ) -> Result<DependencyCheck> {
        self.ensure_visible(task_id)?;
        self.ensure_visible(depends_on_id)?;

        let graph = self.graph();
        let would_create_cycle =
            CycleChecker::new(&graph).would_create_cycle(task_id, depends_on_id)?;

        Ok(DependencyCheck {
            task_id: task_id.clone(),
            depends_on_id: depends_on_id.clone(),
            would_create_cycle,
        })
    }
}
