use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::edge_repo;
use crate::error::{FmError, Result};
use crate::id::{OwnerId, TaskId};
use crate::types::{CreateTaskInput, ListTasksFilter, Status, Task, UpdateTaskInput};

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn parse_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        owner: row.get("owner")?,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: parse_ts(row.get("due_date")?),
        priority: row.get("priority")?,
        status: row.get("status")?,
        created_at: parse_ts(row.get("created_at")?).unwrap_or_else(now),
        updated_at: parse_ts(row.get("updated_at")?).unwrap_or_else(now),
        completed_at: parse_ts(row.get("completed_at")?),
        depends_on: Vec::new(),
        dependents: Vec::new(),
    })
}

fn hydrate_edges(conn: &Connection, owner: &OwnerId, task: &mut Task) -> Result<()> {
    task.depends_on = edge_repo::edges_from(conn, owner, &task.id)?;
    task.dependents = edge_repo::edges_to(conn, owner, &task.id)?;
    Ok(())
}

pub fn create_task(conn: &Connection, owner: &OwnerId, input: &CreateTaskInput) -> Result<Task> {
    let id = TaskId::new();
    let now_str = now().to_rfc3339();

    conn.execute(
        r#"
        INSERT INTO tasks (id, owner, parent_id, title, description, due_date, priority, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            &id,
            owner,
            input.parent_id.as_ref(),
            input.title,
            input.description.as_deref().unwrap_or(""),
            input.due_date.map(|d| d.to_rfc3339()),
            input.priority.unwrap_or_default(),
            now_str,
            now_str,
        ],
    )?;

    get_task(conn, owner, &id)?.ok_or(FmError::TaskNotFound(id))
}

pub fn get_task(conn: &Connection, owner: &OwnerId, id: &TaskId) -> Result<Option<Task>> {
    let task: Option<Task> = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1 AND owner = ?2",
            params![id, owner],
            row_to_task,
        )
        .optional()?;

    if let Some(mut task) = task {
        hydrate_edges(conn, owner, &mut task)?;
        Ok(Some(task))
    } else {
        Ok(None)
    }
}

/// Owner of a task regardless of the caller's scope. Lets the mutation
/// boundary tell a cross-owner reference apart from a missing one.
pub fn task_owner(conn: &Connection, id: &TaskId) -> Result<Option<OwnerId>> {
    let owner = conn
        .query_row(
            "SELECT owner FROM tasks WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner)
}

pub fn get_status(conn: &Connection, owner: &OwnerId, id: &TaskId) -> Result<Option<Status>> {
    let status = conn
        .query_row(
            "SELECT status FROM tasks WHERE id = ?1 AND owner = ?2",
            params![id, owner],
            |row| row.get(0),
        )
        .optional()?;
    Ok(status)
}

pub fn task_exists(conn: &Connection, owner: &OwnerId, id: &TaskId) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE id = ?1 AND owner = ?2",
        params![id, owner],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_tasks(conn: &Connection, owner: &OwnerId, filter: &ListTasksFilter) -> Result<Vec<Task>> {
    let mut sql = String::from("SELECT * FROM tasks WHERE owner = ?");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner.clone())];

    if let Some(ref parent_id) = filter.parent_id {
        sql.push_str(" AND parent_id = ?");
        params_vec.push(Box::new(parent_id.clone()));
    }

    if filter.roots {
        sql.push_str(" AND parent_id IS NULL");
    }

    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        params_vec.push(Box::new(status));
    }

    sql.push_str(
        " ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, created_at ASC, id ASC",
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let mut tasks: Vec<Task> = stmt
        .query_map(params_refs.as_slice(), row_to_task)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;

    for task in &mut tasks {
        hydrate_edges(conn, owner, task)?;
    }

    Ok(tasks)
}

pub fn update_task(
    conn: &Connection,
    owner: &OwnerId,
    id: &TaskId,
    input: &UpdateTaskInput,
) -> Result<Task> {
    let now_str = now().to_rfc3339();

    let mut updates = Vec::new();
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now_str)];
    let mut param_idx = 2;

    updates.push("updated_at = ?1".to_string());

    if let Some(ref title) = input.title {
        updates.push(format!("title = ?{}", param_idx));
        params_vec.push(Box::new(title.clone()));
        param_idx += 1;
    }

    if let Some(ref description) = input.description {
        updates.push(format!("description = ?{}", param_idx));
        params_vec.push(Box::new(description.clone()));
        param_idx += 1;
    }

    if let Some(priority) = input.priority {
        updates.push(format!("priority = ?{}", param_idx));
        params_vec.push(Box::new(priority));
        param_idx += 1;
    }

    if let Some(due_date) = input.due_date {
        updates.push(format!("due_date = ?{}", param_idx));
        params_vec.push(Box::new(due_date.to_rfc3339()));
        param_idx += 1;
    }

    if let Some(ref parent_id) = input.parent_id {
        updates.push(format!("parent_id = ?{}", param_idx));
        params_vec.push(Box::new(parent_id.clone()));
        param_idx += 1;
    }

    params_vec.push(Box::new(id.clone()));
    params_vec.push(Box::new(owner.clone()));

    let sql = format!(
        "UPDATE tasks SET {} WHERE id = ?{} AND owner = ?{}",
        updates.join(", "),
        param_idx,
        param_idx + 1
    );

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_refs.as_slice())?;

    get_task(conn, owner, id)?.ok_or_else(|| FmError::TaskNotFound(id.clone()))
}

/// Write the status column. Only the status engine calls this; everything
/// else goes through the mutation boundary.
pub(crate) fn set_status(
    conn: &Connection,
    owner: &OwnerId,
    id: &TaskId,
    status: Status,
) -> Result<()> {
    let now_str = now().to_rfc3339();
    let completed_at = if status == Status::Completed {
        Some(now_str.clone())
    } else {
        None
    };
    conn.execute(
        "UPDATE tasks SET status = ?1, completed_at = ?2, updated_at = ?3 WHERE id = ?4 AND owner = ?5",
        params![status, completed_at, now_str, id, owner],
    )?;
    Ok(())
}

/// Delete a task. `ON DELETE CASCADE` removes its subtasks and every edge
/// touching the task or a removed subtask.
pub fn delete_task(conn: &Connection, owner: &OwnerId, id: &TaskId) -> Result<()> {
    conn.execute(
        "DELETE FROM tasks WHERE id = ?1 AND owner = ?2",
        params![id, owner],
    )?;
    Ok(())
}

pub fn list_subtasks(conn: &Connection, owner: &OwnerId, parent_id: &TaskId) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM tasks WHERE parent_id = ?1 AND owner = ?2
         ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, created_at ASC, id ASC",
    )?;
    let mut tasks: Vec<Task> = stmt
        .query_map(params![parent_id, owner], row_to_task)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;

    for task in &mut tasks {
        hydrate_edges(conn, owner, task)?;
    }

    Ok(tasks)
}

pub fn has_incomplete_subtasks(conn: &Connection, owner: &OwnerId, id: &TaskId) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE parent_id = ?1 AND owner = ?2 AND status != 'completed'",
        params![id, owner],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
