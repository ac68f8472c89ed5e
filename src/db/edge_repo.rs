use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{FmError, Result};
use crate::id::{OwnerId, TaskId};
use crate::types::DependencyEdge;

fn row_to_edge(row: &Row) -> rusqlite::Result<DependencyEdge> {
    let created_at: String = row.get("created_at")?;
    Ok(DependencyEdge {
        task_id: row.get("task_id")?,
        depends_on_id: row.get("depends_on_id")?,
        owner: row.get("owner")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

pub fn put_edge(
    conn: &Connection,
    owner: &OwnerId,
    task_id: &TaskId,
    depends_on_id: &TaskId,
) -> Result<DependencyEdge> {
    let now_str = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO task_deps (task_id, depends_on_id, owner, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![task_id, depends_on_id, owner, now_str],
    )?;
    get_edge(conn, owner, task_id, depends_on_id)?.ok_or_else(|| FmError::DependencyNotFound {
        task_id: task_id.clone(),
        depends_on_id: depends_on_id.clone(),
    })
}

pub fn get_edge(
    conn: &Connection,
    owner: &OwnerId,
    task_id: &TaskId,
    depends_on_id: &TaskId,
) -> Result<Option<DependencyEdge>> {
    let edge = conn
        .query_row(
            "SELECT * FROM task_deps WHERE task_id = ?1 AND depends_on_id = ?2 AND owner = ?3",
            params![task_id, depends_on_id, owner],
            row_to_edge,
        )
        .optional()?;
    Ok(edge)
}

pub fn edge_exists(
    conn: &Connection,
    owner: &OwnerId,
    task_id: &TaskId,
    depends_on_id: &TaskId,
) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM task_deps WHERE task_id = ?1 AND depends_on_id = ?2 AND owner = ?3",
        params![task_id, depends_on_id, owner],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn delete_edge(
    conn: &Connection,
    owner: &OwnerId,
    task_id: &TaskId,
    depends_on_id: &TaskId,
) -> Result<usize> {
    let count = conn.execute(
        "DELETE FROM task_deps WHERE task_id = ?1 AND depends_on_id = ?2 AND owner = ?3",
        params![task_id, depends_on_id, owner],
    )?;
    Ok(count)
}

/// Targets of a task's outgoing edges: the tasks it depends on.
pub fn edges_from(conn: &Connection, owner: &OwnerId, task_id: &TaskId) -> Result<Vec<TaskId>> {
    let mut stmt =
        conn.prepare("SELECT depends_on_id FROM task_deps WHERE task_id = ?1 AND owner = ?2")?;
    let ids = stmt
        .query_map(params![task_id, owner], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<TaskId>>>()?;
    Ok(ids)
}

/// Sources of a task's incoming edges: the tasks that depend on it.
pub fn edges_to(conn: &Connection, owner: &OwnerId, depends_on_id: &TaskId) -> Result<Vec<TaskId>> {
    let mut stmt =
        conn.prepare("SELECT task_id FROM task_deps WHERE depends_on_id = ?1 AND owner = ?2")?;
    let ids = stmt
        .query_map(params![depends_on_id, owner], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<TaskId>>>()?;
    Ok(ids)
}
