//! Adjacency view over the dependency edge table, and the cycle check that
//! guards every edge insert.
//!
//! The index holds no state of its own: it is a pure view over the edge
//! records and can be rebuilt from them at any time, which is also the
//! crash-recovery story. Reads issued after an edge insert or delete on the
//! same connection see the new edge set.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::db::{edge_repo, task_repo};
use crate::error::{FmError, Result};
use crate::id::{OwnerId, TaskId};

pub struct GraphIndex<'a> {
    conn: &'a Connection,
    owner: &'a OwnerId,
}

impl<'a> GraphIndex<'a> {
    pub fn new(conn: &'a Connection, owner: &'a OwnerId) -> Self {
        Self { conn, owner }
    }

    /// Tasks that `id` depends on (targets of its outgoing edges).
    pub fn successors(&self, id: &TaskId) -> Result<Vec<TaskId>> {
        edge_repo::edges_from(self.conn, self.owner, id)
    }

    /// Tasks that depend on `id` (sources of its incoming edges). Drives the
    /// recompute cascade.
    pub fn predecessors(&self, id: &TaskId) -> Result<Vec<TaskId>> {
        edge_repo::edges_to(self.conn, self.owner, id)
    }
}

enum Frame {
    Enter(TaskId),
    Exit(TaskId),
}

/// Read-only reachability probe for proposed edges. Never mutates the graph.
pub struct CycleChecker<'a> {
    graph: &'a GraphIndex<'a>,
}

impl<'a> CycleChecker<'a> {
    pub fn new(graph: &'a GraphIndex<'a>) -> Self {
        Self { graph }
    }

    /// Would the edge `task -> depends_on` close a cycle? True iff a path
    /// already leads from `depends_on` back to `task`, or the edge is a
    /// self-loop. Unknown ids are an error, not "no cycle".
    ///
    /// Iterative DFS over `successors` with an explicit frame stack, so call
    /// depth stays constant however deep the graph is. Two sets carry the
    /// traversal state: `on_path` holds the nodes on the current DFS stack,
    /// `visited` holds nodes fully explored and known not to reach `task`.
    /// A single shared set would re-explore or misjudge diamond-shaped
    /// sub-DAGs; keeping the sets separate makes each node's verdict final
    /// the moment its subtree is exhausted.
    pub fn would_create_cycle(&self, task: &TaskId, depends_on: &TaskId) -> Result<bool> {
        for id in [task, depends_on] {
            if !task_repo::task_exists(self.graph.conn, self.graph.owner, id)? {
                return Err(FmError::TaskNotFound(id.clone()));
            }
        }

        if task == depends_on {
            return Ok(true);
        }

        let mut visited: HashSet<TaskId> = HashSet::new();
        let mut on_path: HashSet<TaskId> = HashSet::new();
        let mut stack = vec![Frame::Enter(depends_on.clone())];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    if node == *task {
                        return Ok(true);
                    }
                    if visited.contains(&node) || on_path.contains(&node) {
                        continue;
                    }
                    on_path.insert(node.clone());
                    stack.push(Frame::Exit(node.clone()));
                    for succ in self.graph.successors(&node)? {
                        if !visited.contains(&succ) {
                            stack.push(Frame::Enter(succ));
                        }
                    }
                }
                Frame::Exit(node) => {
                    on_path.remove(&node);
                    visited.insert(node);
                }
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::types::CreateTaskInput;

    fn setup() -> (Connection, OwnerId) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        schema::init_schema(&conn).unwrap();
        (conn, OwnerId::new("tester").unwrap())
    }

    fn mk_task(conn: &Connection, owner: &OwnerId, title: &str) -> TaskId {
        task_repo::create_task(
            conn,
            owner,
            &CreateTaskInput {
                title: title.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    fn mk_edge(conn: &Connection, owner: &OwnerId, task: &TaskId, dep: &TaskId) {
        edge_repo::put_edge(conn, owner, task, dep).unwrap();
    }

    #[test]
    fn successors_and_predecessors_reflect_edges() {
        let (conn, owner) = setup();
        let a = mk_task(&conn, &owner, "a");
        let b = mk_task(&conn, &owner, "b");
        mk_edge(&conn, &owner, &a, &b);

        let graph = GraphIndex::new(&conn, &owner);
        assert_eq!(graph.successors(&a).unwrap(), vec![b.clone()]);
        assert_eq!(graph.predecessors(&b).unwrap(), vec![a.clone()]);
        assert!(graph.successors(&b).unwrap().is_empty());
        assert!(graph.predecessors(&a).unwrap().is_empty());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let (conn, owner) = setup();
        let a = mk_task(&conn, &owner, "a");

        let graph = GraphIndex::new(&conn, &owner);
        let checker = CycleChecker::new(&graph);
        assert!(checker.would_create_cycle(&a, &a).unwrap());
    }

    #[test]
    fn detects_two_node_cycle() {
        let (conn, owner) = setup();
        let a = mk_task(&conn, &owner, "a");
        let b = mk_task(&conn, &owner, "b");
        mk_edge(&conn, &owner, &a, &b);

        let graph = GraphIndex::new(&conn, &owner);
        let checker = CycleChecker::new(&graph);
        assert!(checker.would_create_cycle(&b, &a).unwrap());
        assert!(!checker.would_create_cycle(&a, &b).unwrap());
    }

    #[test]
    fn detects_transitive_cycle() {
        let (conn, owner) = setup();
        let a = mk_task(&conn, &owner, "a");
        let b = mk_task(&conn, &owner, "b");
        let c = mk_task(&conn, &owner, "c");
        mk_edge(&conn, &owner, &a, &b);
        mk_edge(&conn, &owner, &b, &c);

        let graph = GraphIndex::new(&conn, &owner);
        let checker = CycleChecker::new(&graph);
        assert!(checker.would_create_cycle(&c, &a).unwrap());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        // d -> b -> a, d -> c -> a: a is reachable twice, no cycle anywhere
        let (conn, owner) = setup();
        let a = mk_task(&conn, &owner, "a");
        let b = mk_task(&conn, &owner, "b");
        let c = mk_task(&conn, &owner, "c");
        let d = mk_task(&conn, &owner, "d");
        mk_edge(&conn, &owner, &b, &a);
        mk_edge(&conn, &owner, &c, &a);
        mk_edge(&conn, &owner, &d, &b);
        mk_edge(&conn, &owner, &d, &c);

        let graph = GraphIndex::new(&conn, &owner);
        let checker = CycleChecker::new(&graph);
        let e = mk_task(&conn, &owner, "e");
        assert!(!checker.would_create_cycle(&a, &e).unwrap());
        // closing the diamond backwards is a cycle
        assert!(checker.would_create_cycle(&a, &d).unwrap());
    }

    #[test]
    fn cycle_through_one_diamond_branch_is_found() {
        // e -> b and e -> c, b -> a, c -> a. Proposing a -> e must report a
        // cycle even after the first branch through `a` is fully explored.
        let (conn, owner) = setup();
        let a = mk_task(&conn, &owner, "a");
        let b = mk_task(&conn, &owner, "b");
        let c = mk_task(&conn, &owner, "c");
        let e = mk_task(&conn, &owner, "e");
        mk_edge(&conn, &owner, &b, &a);
        mk_edge(&conn, &owner, &c, &a);
        mk_edge(&conn, &owner, &e, &b);
        mk_edge(&conn, &owner, &e, &c);

        let graph = GraphIndex::new(&conn, &owner);
        let checker = CycleChecker::new(&graph);
        assert!(checker.would_create_cycle(&a, &e).unwrap());
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let (conn, owner) = setup();
        let mut ids = Vec::new();
        for i in 0..2_000 {
            ids.push(mk_task(&conn, &owner, &format!("t{i}")));
        }
        for pair in ids.windows(2) {
            mk_edge(&conn, &owner, &pair[0], &pair[1]);
        }

        let graph = GraphIndex::new(&conn, &owner);
        let checker = CycleChecker::new(&graph);
        let first = ids.first().unwrap();
        let last = ids.last().unwrap();
        assert!(checker.would_create_cycle(last, first).unwrap());
        assert!(!checker.would_create_cycle(first, last).unwrap());
    }

    #[test]
    fn unknown_endpoint_is_an_error() {
        let (conn, owner) = setup();
        let a = mk_task(&conn, &owner, "a");
        let ghost = TaskId::new();

        let graph = GraphIndex::new(&conn, &owner);
        let checker = CycleChecker::new(&graph);
        assert!(matches!(
            checker.would_create_cycle(&a, &ghost),
            Err(FmError::TaskNotFound(_))
        ));
        assert!(matches!(
            checker.would_create_cycle(&ghost, &a),
            Err(FmError::TaskNotFound(_))
        ));
    }

    #[test]
    fn edges_of_other_owners_are_invisible() {
        let (conn, owner) = setup();
        let other = OwnerId::new("other").unwrap();
        let a = mk_task(&conn, &owner, "a");
        let x = mk_task(&conn, &other, "x");
        let y = mk_task(&conn, &other, "y");
        mk_edge(&conn, &other, &x, &y);

        let graph = GraphIndex::new(&conn, &owner);
        assert!(graph.successors(&x).unwrap().is_empty());
        assert!(graph.predecessors(&y).unwrap().is_empty());
        assert!(graph.successors(&a).unwrap().is_empty());
    }
}
