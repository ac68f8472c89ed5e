//! Unit tests for TaskService.
//!
//! Tests cover:
//! - CRUD operations
//! - Parent/child relationships and the one-level nesting limit
//! - Ownership partitioning
//! - Dependency edge validation
//! - CASCADE delete behavior
//! - Status transitions through the explicit entry points

use foreman::core::TaskService;
use foreman::db::schema;
use foreman::error::FmError;
use foreman::id::{OwnerId, TaskId};
use foreman::types::{CreateTaskInput, ListTasksFilter, Priority, Status, UpdateTaskInput};
use rusqlite::Connection;

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    schema::init_schema(&conn).unwrap();
    conn
}

fn service(conn: &Connection) -> TaskService<'_> {
    TaskService::new(conn, OwnerId::new("tester").unwrap())
}

fn create(svc: &TaskService, title: &str) -> foreman::types::Task {
    svc.create(&CreateTaskInput {
        title: title.to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn create_under(svc: &TaskService, parent: &TaskId, title: &str) -> foreman::types::Task {
    svc.create(&CreateTaskInput {
        title: title.to_string(),
        parent_id: Some(parent.clone()),
        ..Default::default()
    })
    .unwrap()
}

// ==================== CRUD Operations ====================

#[test]
fn test_create_root_task() {
    let conn = setup_db();
    let svc = service(&conn);

    let task = svc
        .create(&CreateTaskInput {
            title: "Build auth system".to_string(),
            description: Some("JWT with refresh tokens".to_string()),
            priority: Some(Priority::High),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(task.title, "Build auth system");
    assert_eq!(task.description, "JWT with refresh tokens");
    assert_eq!(task.parent_id, None);
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.status, Status::Todo);
    assert!(task.completed_at.is_none());
}

#[test]
fn test_create_subtask() {
    let conn = setup_db();
    let svc = service(&conn);

    let root = create(&svc, "Root");
    let sub = create_under(&svc, &root.id, "Sub");

    assert_eq!(sub.parent_id, Some(root.id));
}

#[test]
fn test_create_with_nonexistent_parent() {
    let conn = setup_db();
    let svc = service(&conn);

    let result = svc.create(&CreateTaskInput {
        title: "Task".to_string(),
        parent_id: Some(TaskId::new()),
        ..Default::default()
    });

    assert!(matches!(result, Err(FmError::ParentNotFound(_))));
}

#[test]
fn test_create_with_nonexistent_dependency() {
    let conn = setup_db();
    let svc = service(&conn);

    let result = svc.create(&CreateTaskInput {
        title: "Task".to_string(),
        depends_on: vec![TaskId::new()],
        ..Default::default()
    });

    assert!(matches!(result, Err(FmError::TaskNotFound(_))));
}

#[test]
fn test_get_missing_task() {
    let conn = setup_db();
    let svc = service(&conn);

    assert!(matches!(
        svc.get(&TaskId::new()),
        Err(FmError::TaskNotFound(_))
    ));
}

#[test]
fn test_update_fields_individually() {
    let conn = setup_db();
    let svc = service(&conn);
    let task = create(&svc, "Before");

    let updated = svc
        .update(
            &task.id,
            &UpdateTaskInput {
                title: Some("After".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "After");
    assert_eq!(updated.priority, Priority::Medium);

    let updated = svc
        .update(
            &task.id,
            &UpdateTaskInput {
                priority: Some(Priority::Low),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "After");
    assert_eq!(updated.priority, Priority::Low);
}

#[test]
fn test_list_filters_by_status() {
    let conn = setup_db();
    let svc = service(&conn);

    let a = create(&svc, "a");
    let b = create(&svc, "b");
    create(&svc, "c");
    svc.complete(&a.id).unwrap();
    svc.add_dependency(&b.id, &a.id).unwrap();

    let completed = svc
        .list(&ListTasksFilter {
            status: Some(Status::Completed),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, a.id);

    let todo = svc
        .list(&ListTasksFilter {
            status: Some(Status::Todo),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(todo.len(), 2);
}

#[test]
fn test_list_orders_by_priority() {
    let conn = setup_db();
    let svc = service(&conn);

    svc.create(&CreateTaskInput {
        title: "low".to_string(),
        priority: Some(Priority::Low),
        ..Default::default()
    })
    .unwrap();
    svc.create(&CreateTaskInput {
        title: "high".to_string(),
        priority: Some(Priority::High),
        ..Default::default()
    })
    .unwrap();

    let tasks = svc.list(&ListTasksFilter::default()).unwrap();
    assert_eq!(tasks[0].title, "high");
    assert_eq!(tasks[1].title, "low");
}

// ==================== Hierarchy ====================

#[test]
fn test_nesting_depth_limited_to_one() {
    let conn = setup_db();
    let svc = service(&conn);

    let root = create(&svc, "Root");
    let sub = create_under(&svc, &root.id, "Sub");

    let result = svc.create(&CreateTaskInput {
        title: "Grandchild".to_string(),
        parent_id: Some(sub.id),
        ..Default::default()
    });
    assert!(matches!(result, Err(FmError::ParentAlreadyNested(_))));
}

#[test]
fn test_reparent_under_root_is_allowed() {
    let conn = setup_db();
    let svc = service(&conn);

    let a = create(&svc, "a");
    let b = create(&svc, "b");

    let moved = svc
        .update(
            &b.id,
            &UpdateTaskInput {
                parent_id: Some(a.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(moved.parent_id, Some(a.id));
}

#[test]
fn test_reparent_under_subtask_rejected() {
    let conn = setup_db();
    let svc = service(&conn);

    let root = create(&svc, "Root");
    let sub = create_under(&svc, &root.id, "Sub");
    let other = create(&svc, "Other");

    let result = svc.update(
        &other.id,
        &UpdateTaskInput {
            parent_id: Some(sub.id),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(FmError::ParentAlreadyNested(_))));
}

// ==================== Ownership ====================

#[test]
fn test_tasks_invisible_across_owners() {
    let conn = setup_db();
    let alice = TaskService::new(&conn, OwnerId::new("alice").unwrap());
    let bob = TaskService::new(&conn, OwnerId::new("bob").unwrap());

    let task = alice
        .create(&CreateTaskInput {
            title: "Alice's task".to_string(),
            ..Default::default()
        })
        .unwrap();

    // plain reads do not leak existence across the partition
    assert!(matches!(bob.get(&task.id), Err(FmError::TaskNotFound(_))));
}

#[test]
fn test_cross_owner_edge_rejected_both_directions() {
    let conn = setup_db();
    let alice = TaskService::new(&conn, OwnerId::new("alice").unwrap());
    let bob = TaskService::new(&conn, OwnerId::new("bob").unwrap());

    let a = alice
        .create(&CreateTaskInput {
            title: "a".to_string(),
            ..Default::default()
        })
        .unwrap();
    let b = bob
        .create(&CreateTaskInput {
            title: "b".to_string(),
            ..Default::default()
        })
        .unwrap();

    assert!(matches!(
        alice.add_dependency(&a.id, &b.id),
        Err(FmError::CrossOwner(_))
    ));
    assert!(matches!(
        bob.add_dependency(&b.id, &a.id),
        Err(FmError::CrossOwner(_))
    ));
}

// ==================== Lifecycle ====================

#[test]
fn test_start_then_complete() {
    let conn = setup_db();
    let svc = service(&conn);
    let task = create(&svc, "Task");

    let started = svc.start(&task.id).unwrap();
    assert_eq!(started.status, Status::InProgress);

    let completed = svc.complete(&task.id).unwrap();
    assert_eq!(completed.status, Status::Completed);
    assert!(completed.completed_at.is_some());
}

#[test]
fn test_start_blocked_task_rejected() {
    let conn = setup_db();
    let svc = service(&conn);
    let task = create(&svc, "Task");
    let dep = create(&svc, "Dep");
    svc.add_dependency(&task.id, &dep.id).unwrap();

    assert!(matches!(
        svc.start(&task.id),
        Err(FmError::TaskBlocked(_))
    ));
}

#[test]
fn test_complete_with_incomplete_subtasks_rejected() {
    let conn = setup_db();
    let svc = service(&conn);
    let root = create(&svc, "Root");
    let sub = create_under(&svc, &root.id, "Sub");

    let result = svc.complete(&root.id);
    assert!(matches!(result, Err(FmError::SubtasksIncomplete(_))));
    assert_eq!(svc.get(&root.id).unwrap().status, Status::Todo);

    svc.complete(&sub.id).unwrap();
    let done = svc.complete(&root.id).unwrap();
    assert_eq!(done.status, Status::Completed);
}

#[test]
fn test_reopen_clears_completed_at() {
    let conn = setup_db();
    let svc = service(&conn);
    let task = create(&svc, "Task");

    svc.complete(&task.id).unwrap();
    let reopened = svc.reopen(&task.id).unwrap();
    assert_eq!(reopened.status, Status::Todo);
    assert!(reopened.completed_at.is_none());
}

// ==================== Deletion ====================

#[test]
fn test_delete_removes_subtasks() {
    let conn = setup_db();
    let svc = service(&conn);
    let root = create(&svc, "Root");
    let sub = create_under(&svc, &root.id, "Sub");

    svc.delete(&root.id).unwrap();

    assert!(matches!(svc.get(&root.id), Err(FmError::TaskNotFound(_))));
    assert!(matches!(svc.get(&sub.id), Err(FmError::TaskNotFound(_))));
}

#[test]
fn test_delete_scoped_to_owner() {
    let conn = setup_db();
    let alice = TaskService::new(&conn, OwnerId::new("alice").unwrap());
    let bob = TaskService::new(&conn, OwnerId::new("bob").unwrap());

    let task = alice
        .create(&CreateTaskInput {
            title: "Alice's".to_string(),
            ..Default::default()
        })
        .unwrap();

    assert!(matches!(
        bob.delete(&task.id),
        Err(FmError::TaskNotFound(_))
    ));
    assert!(alice.get(&task.id).is_ok());
}
