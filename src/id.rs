//! Prefixed ULID newtype for type-safe task IDs, plus the owner key.
//!
//! - `TaskId`: `task_01ARZ3NDEKTSV4RRFFQ69G5FAV`
//! - `OwnerId`: opaque non-empty account name, assigned by the caller

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdParseError {
    #[error("Invalid ULID format: {0}")]
    InvalidUlid(String),
    #[error("Missing prefix: expected '{expected}', got '{actual}'")]
    MissingPrefix {
        expected: &'static str,
        actual: String,
    },
    #[error("Owner name must not be empty")]
    EmptyOwner,
}

fn validate_ulid(s: &str) -> Result<(), IdParseError> {
    ulid::Ulid::from_string(s)
        .map(|_| ())
        .map_err(|_| IdParseError::InvalidUlid(s.to_string()))
}

// ============ TaskId ============

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub const PREFIX: &'static str = "task_";

    /// Generate new TaskId with fresh ULID
    pub fn new() -> Self {
        Self(format!("{}{}", Self::PREFIX, ulid::Ulid::new()))
    }

    /// Create from raw ULID (no prefix). Used by FromSql.
    pub(crate) fn from_raw_ulid(ulid: String) -> Self {
        Self(format!("{}{}", Self::PREFIX, ulid))
    }

    /// Extract the ULID part (without prefix)
    pub fn ulid_part(&self) -> &str {
        self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
    }

    /// Full string representation (with prefix)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| IdParseError::MissingPrefix {
                expected: Self::PREFIX,
                actual: s.to_string(),
            })?;
        validate_ulid(ulid)?;
        Ok(Self::from_raw_ulid(ulid.to_string()))
    }
}

impl ToSql for TaskId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        // Store with prefix - single source of truth
        Ok(ToSqlOutput::from(self.0.clone()))
    }
}

impl FromSql for TaskId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        // Read directly - no transformation needed
        let s = value.as_str()?.to_string();
        Ok(Self(s))
    }
}

// ============ OwnerId ============

/// Account name that exclusively holds a task and every edge touching it.
/// Assigned upstream (CLI flag or env); the engine only requires it to be
/// non-empty and otherwise treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(name: &str) -> Result<Self, IdParseError> {
        if name.trim().is_empty() {
            return Err(IdParseError::EmptyOwner);
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl ToSql for OwnerId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.clone()))
    }
}

impl FromSql for OwnerId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?.to_string();
        Ok(Self(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_new() {
        let id = TaskId::new();
        assert!(id.as_str().starts_with("task_"));
        assert_eq!(id.ulid_part().len(), 26);
    }

    #[test]
    fn task_id_parse_with_prefix() {
        let id: TaskId = "task_01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
        assert_eq!(id.as_str(), "task_01ARZ3NDEKTSV4RRFFQ69G5FAV");
    }

    #[test]
    fn task_id_parse_without_prefix_fails() {
        let result: Result<TaskId, _> = "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse();
        assert!(matches!(result, Err(IdParseError::MissingPrefix { .. })));
    }

    #[test]
    fn task_id_parse_invalid_ulid() {
        let result: Result<TaskId, _> = "task_invalid".parse();
        assert!(matches!(result, Err(IdParseError::InvalidUlid(_))));
    }

    #[test]
    fn task_id_serde() {
        let id = TaskId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with("\"task_"));
        let parsed: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn owner_id_rejects_empty() {
        assert!(matches!(OwnerId::new(""), Err(IdParseError::EmptyOwner)));
        assert!(matches!(OwnerId::new("   "), Err(IdParseError::EmptyOwner)));
    }

    #[test]
    fn owner_id_parse() {
        let owner: OwnerId = "alice".parse().unwrap();
        assert_eq!(owner.as_str(), "alice");
    }
}
