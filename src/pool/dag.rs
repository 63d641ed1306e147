//! Dependency DAG over tasks, built around one designated "current" task.
//!
//! # Representation
//!
//! - `nodes`: vertex map `TaskId -> (task, handle, indegree)`
//! - `deps`: per-vertex predecessor lists (`a ∈ deps[b]` encodes the edge
//!   `a → b`, "b depends on a")
//!
//! Indegree of a vertex equals the length of its predecessor list; vertices
//! inserted as bare dependencies carry no list of their own until they gain
//! one via `add_task`.
//!
//! # Acyclicity
//!
//! Enforced at edge insertion: an edge `pred → curr` is rejected when a path
//! `curr → … → pred` already exists, i.e. when a walk over predecessor lists
//! starting at `pred` reaches `curr`.
//!
//! # Removal
//!
//! `remove_dependency` unlinks exactly one edge and deletes the predecessor
//! vertex only once nothing references it — its indegree is zero and it
//! appears in no predecessor list. Vertices with other parents survive.
//!
//! # Readiness
//!
//! A task is dispatchable when its indegree is zero. [`TaskDag::ready`],
//! [`TaskDag::take_ready`], [`TaskDag::on_complete`], and
//! [`TaskDag::drain_ready_into`] expose the poll/advance cycle for feeding
//! a [`ThreadPool`].

use ahash::AHashMap;
use tracing::{info, warn};

use super::core::ThreadPool;
use super::error::DagError;
use super::task::{Task, TaskId};
use super::value::TaskHandle;

struct DagNode {
    /// Present until the task is dispatched via `take_ready`/`drain_ready_into`.
    task: Option<Task>,
    /// Captured at insertion; retrievable once per task.
    handle: Option<TaskHandle>,
    /// Unresolved predecessor count.
    indegree: usize,
}

/// Builder-style dependency graph of tasks.
#[derive(Default)]
pub struct TaskDag {
    nodes: AHashMap<TaskId, DagNode>,
    deps: AHashMap<TaskId, Vec<TaskId>>,
    current: Option<TaskId>,
}

impl TaskDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Indegree of a vertex, if present.
    pub fn indegree(&self, id: TaskId) -> Option<usize> {
        self.nodes.get(&id).map(|n| n.indegree)
    }

    /// The vertex's predecessor ids, if it owns a list.
    pub fn dependencies(&self, id: TaskId) -> Option<&[TaskId]> {
        self.deps.get(&id).map(Vec::as_slice)
    }

    /// Inserts `task` as the current task.
    ///
    /// Re-inserting a known id is a no-op diagnostic; the current task is
    /// left unchanged. The task's result handle is captured for later
    /// retrieval via [`take_handle`](Self::take_handle).
    pub fn add_task(&mut self, mut task: Task) -> Result<&mut Self, DagError> {
        let id = task.id();
        if self.nodes.contains_key(&id) {
            info!(task = %id, "task already in the graph");
            return Ok(self);
        }
        let handle = task.take_handle().ok();
        self.nodes.insert(
            id,
            DagNode {
                task: Some(task),
                handle,
                indegree: 0,
            },
        );
        self.deps.insert(id, Vec::new());
        self.current = Some(id);
        Ok(self)
    }

    /// Adds `task` as a predecessor of the current task (edge task → current).
    ///
    /// A duplicate predecessor is a no-op diagnostic. Fails with
    /// [`DagError::Missing`] when no current task exists and with
    /// [`DagError::Cycle`] when the edge would make the graph cyclic.
    pub fn add_dependency(&mut self, mut task: Task) -> Result<&mut Self, DagError> {
        let curr = self.current_id()?;
        let pred = task.id();

        if self
            .deps
            .get(&curr)
            .is_some_and(|list| list.contains(&pred))
        {
            info!(pred = %pred, curr = %curr, "dependency already present");
            return Ok(self);
        }
        if self.reaches(pred, curr) {
            return Err(DagError::Cycle { pred, succ: curr });
        }

        if !self.nodes.contains_key(&pred) {
            let handle = task.take_handle().ok();
            self.nodes.insert(
                pred,
                DagNode {
                    task: Some(task),
                    handle,
                    indegree: 0,
                },
            );
        }
        let list = self
            .deps
            .get_mut(&curr)
            .ok_or(DagError::RemovalInconsistent {
                id: curr,
                detail: "current task has no predecessor list",
            })?;
        list.push(pred);
        self.nodes
            .get_mut(&curr)
            .expect("current task vanished from the vertex map")
            .indegree += 1;
        Ok(self)
    }

    /// Unlinks the edge `pred → current`.
    ///
    /// The predecessor vertex itself is deleted only when nothing references
    /// it any more (indegree zero and absent from every predecessor list).
    /// An absent edge is reported as [`DagError::Missing`] and leaves the
    /// graph unchanged.
    pub fn remove_dependency(&mut self, pred: TaskId) -> Result<&mut Self, DagError> {
        let curr = self.current_id()?;
        let list = self.deps.get_mut(&curr).ok_or(DagError::RemovalInconsistent {
            id: curr,
            detail: "current task has no predecessor list",
        })?;
        let Some(pos) = list.iter().position(|&id| id == pred) else {
            warn!(pred = %pred, curr = %curr, "dependency not found; nothing removed");
            return Err(DagError::Missing {
                id: pred,
                detail: "not a dependency of the current task",
            });
        };
        list.remove(pos);

        let node = self
            .nodes
            .get_mut(&curr)
            .ok_or(DagError::RemovalInconsistent {
                id: curr,
                detail: "current task missing from the vertex map",
            })?;
        if node.indegree == 0 {
            return Err(DagError::RemovalInconsistent {
                id: curr,
                detail: "indegree underflow while unlinking",
            });
        }
        node.indegree -= 1;

        self.release_if_orphaned(pred);
        Ok(self)
    }

    /// Zero-indegree vertices still holding their task, in id order.
    pub fn ready(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.indegree == 0 && n.task.is_some())
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Removes and returns the tasks of all ready vertices. The vertices
    /// stay in the graph until [`on_complete`](Self::on_complete) retires
    /// them, so successors remain gated.
    pub fn take_ready(&mut self) -> Vec<Task> {
        let ids = self.ready();
        ids.into_iter()
            .filter_map(|id| self.nodes.get_mut(&id).and_then(|n| n.task.take()))
            .collect()
    }

    /// Retires a completed vertex: removes it, decrements each successor's
    /// indegree, and returns the ids that became ready.
    ///
    /// Fails with [`DagError::Missing`] for unknown ids.
    pub fn on_complete(&mut self, id: TaskId) -> Result<Vec<TaskId>, DagError> {
        if !self.nodes.contains_key(&id) {
            return Err(DagError::Missing {
                id,
                detail: "cannot complete a task that is not in the graph",
            });
        }
        let mut newly_ready = Vec::new();
        for (&succ, list) in self.deps.iter_mut() {
            let before = list.len();
            list.retain(|&p| p != id);
            let removed = before - list.len();
            if removed > 0 {
                let node = self
                    .nodes
                    .get_mut(&succ)
                    .ok_or(DagError::RemovalInconsistent {
                        id: succ,
                        detail: "successor missing from the vertex map",
                    })?;
                if node.indegree < removed {
                    return Err(DagError::RemovalInconsistent {
                        id: succ,
                        detail: "indegree underflow while retiring a predecessor",
                    });
                }
                node.indegree -= removed;
                if node.indegree == 0 {
                    newly_ready.push(succ);
                }
            }
        }
        self.nodes.remove(&id);
        self.deps.remove(&id);
        if self.current == Some(id) {
            self.current = None;
        }
        newly_ready.sort_unstable();
        Ok(newly_ready)
    }

    /// Submits every ready task into `pool` and returns the dispatched ids.
    ///
    /// Completion is reported back via [`on_complete`](Self::on_complete) by
    /// the caller, typically after waiting on the captured handles.
    pub fn drain_ready_into(&mut self, pool: &ThreadPool) -> Vec<TaskId> {
        let tasks = self.take_ready();
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(task.id());
            pool.submit_task(task);
        }
        ids
    }

    /// Takes the handle captured for `id` at insertion time, if still held.
    pub fn take_handle(&mut self, id: TaskId) -> Option<TaskHandle> {
        self.nodes.get_mut(&id).and_then(|n| n.handle.take())
    }

    fn current_id(&self) -> Result<TaskId, DagError> {
        self.current.ok_or(DagError::Missing {
            id: TaskId::INVALID,
            detail: "no current task; call add_task first",
        })
    }

    /// True when a walk over predecessor lists starting at `from` reaches
    /// `target` — i.e. an edge-direction path `target → … → from` exists.
    fn reaches(&self, from: TaskId, target: TaskId) -> bool {
        if from == target {
            return true;
        }
        let mut stack = vec![from];
        let mut seen = ahash::AHashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(list) = self.deps.get(&id) {
                for &pred in list {
                    if pred == target {
                        return true;
                    }
                    stack.push(pred);
                }
            }
        }
        false
    }

    /// Deletes a vertex once nothing points at it.
    fn release_if_orphaned(&mut self, id: TaskId) {
        let orphaned = self.nodes.get(&id).is_some_and(|n| n.indegree == 0)
            && !self.deps.values().any(|list| list.contains(&id));
        if orphaned {
            self.nodes.remove(&id);
            self.deps.remove(&id);
            if self.current == Some(id) {
                self.current = None;
            }
        }
    }
}

impl std::fmt::Debug for TaskDag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDag")
            .field("vertices", &self.nodes.len())
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Task {
        Task::from_fn(|| ())
    }

    #[test]
    fn wiring_matches_the_builder_calls() {
        let a = noop();
        let b = noop();
        let c = noop();
        let (ida, idb, idc) = (a.id(), b.id(), c.id());

        let mut dag = TaskDag::new();
        dag.add_task(a)
            .unwrap()
            .add_dependency(b)
            .unwrap()
            .add_dependency(c)
            .unwrap();

        assert_eq!(dag.indegree(ida), Some(2));
        assert_eq!(dag.indegree(idb), Some(0));
        assert_eq!(dag.indegree(idc), Some(0));
        assert_eq!(dag.dependencies(ida), Some(&[idb, idc][..]));
        // Bare dependencies own no predecessor list of their own.
        assert_eq!(dag.dependencies(idb), None);
    }

    #[test]
    fn remove_dependency_unlinks_one_edge() {
        let a = noop();
        let b = noop();
        let c = noop();
        let (ida, idb, idc) = (a.id(), b.id(), c.id());

        let mut dag = TaskDag::new();
        dag.add_task(a)
            .unwrap()
            .add_dependency(b)
            .unwrap()
            .add_dependency(c)
            .unwrap();
        dag.remove_dependency(idb).unwrap();

        assert_eq!(dag.indegree(ida), Some(1));
        assert_eq!(dag.dependencies(ida), Some(&[idc][..]));
        assert!(!dag.contains(idb), "orphaned dependency is deleted");
        assert!(dag.contains(idc));
    }

    #[test]
    fn shared_dependency_survives_unlinking_one_parent() {
        // d feeds both a and b; unlinking d → b must not delete d.
        let a = noop();
        let b = noop();
        let d = noop();
        let (ida, idb, idd) = (a.id(), b.id(), d.id());

        let mut dag = TaskDag::new();
        dag.add_task(a).unwrap().add_dependency(d).unwrap(); // d → a
        dag.add_task(b).unwrap();
        dag.add_dependency_by_id_for_tests(idd).unwrap(); // d → b

        dag.remove_dependency(idd).unwrap(); // current is b
        assert!(dag.contains(idd), "d still feeds a");
        assert_eq!(dag.indegree(idb), Some(0));
        assert_eq!(dag.dependencies(ida), Some(&[idd][..]));

        dag.set_current_for_tests(ida);
        dag.remove_dependency(idd).unwrap();
        assert!(!dag.contains(idd), "last reference gone, vertex deleted");
        assert_eq!(dag.indegree(ida), Some(0));
    }

    #[test]
    fn duplicate_dependency_is_a_noop() {
        let a = noop();
        let b = noop();
        let (ida, idb) = (a.id(), b.id());

        let mut dag = TaskDag::new();
        dag.add_task(a).unwrap().add_dependency(b).unwrap();
        dag.add_dependency_by_id_for_tests(idb).unwrap();

        assert_eq!(dag.indegree(ida), Some(1));
        assert_eq!(dag.dependencies(ida), Some(&[idb][..]));
    }

    #[test]
    fn cycle_is_rejected() {
        let a = noop();
        let b = noop();
        let (ida, idb) = (a.id(), b.id());

        let mut dag = TaskDag::new();
        dag.add_task(a).unwrap().add_dependency(b).unwrap(); // b → a

        // Self-loop a → a.
        assert!(matches!(
            dag.add_dependency_by_id_for_tests(ida),
            Err(DagError::Cycle { .. })
        ));

        // Reverse edge a → b while b → a exists.
        dag.set_current_for_tests(idb);
        assert!(matches!(
            dag.add_dependency_by_id_for_tests(ida),
            Err(DagError::Cycle { .. })
        ));

        // The rejected edges left nothing behind.
        assert_eq!(dag.indegree(ida), Some(1));
        assert_eq!(dag.indegree(idb), Some(0));
    }

    #[test]
    fn missing_dependency_leaves_graph_unchanged() {
        let a = noop();
        let b = noop();
        let ida = a.id();
        let idb = b.id();

        let mut dag = TaskDag::new();
        dag.add_task(a).unwrap().add_dependency(b).unwrap();

        let ghost = TaskId::from_u32(u32::MAX);
        assert!(matches!(
            dag.remove_dependency(ghost),
            Err(DagError::Missing { .. })
        ));
        assert_eq!(dag.indegree(ida), Some(1));
        assert!(dag.contains(idb));
    }

    #[test]
    fn on_complete_propagates_readiness() {
        let a = noop();
        let b = noop();
        let (ida, idb) = (a.id(), b.id());

        let mut dag = TaskDag::new();
        dag.add_task(a).unwrap().add_dependency(b).unwrap();

        assert_eq!(dag.ready(), vec![idb]);
        let newly = dag.on_complete(idb).unwrap();
        assert_eq!(newly, vec![ida]);
        assert_eq!(dag.ready(), vec![ida]);
    }

    #[test]
    fn take_ready_keeps_vertices_gating_successors() {
        let a = noop();
        let b = noop();
        let (ida, idb) = (a.id(), b.id());

        let mut dag = TaskDag::new();
        dag.add_task(a).unwrap().add_dependency(b).unwrap();

        let tasks = dag.take_ready();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id(), idb);
        // b's vertex still gates a until completion is reported.
        assert!(dag.ready().is_empty());
        assert_eq!(dag.indegree(ida), Some(1));

        assert_eq!(dag.on_complete(idb).unwrap(), vec![ida]);
    }

    #[test]
    fn handles_are_captured_per_vertex() {
        let mut a = noop();
        let taken_early = a.take_handle().unwrap();
        let b = noop();
        let (ida, idb) = (a.id(), b.id());

        let mut dag = TaskDag::new();
        dag.add_task(a).unwrap().add_dependency(b).unwrap();

        // a's handle escaped before insertion; the DAG holds none for it.
        assert!(dag.take_handle(ida).is_none());
        assert!(dag.take_handle(idb).is_some());
        assert!(dag.take_handle(idb).is_none(), "handle is single-take");
        drop(taken_early);
    }
}

#[cfg(test)]
impl TaskDag {
    /// Test hook: adds an edge `pred → current` for an existing vertex id,
    /// bypassing task construction. Mirrors `add_dependency` exactly.
    fn add_dependency_by_id_for_tests(&mut self, pred: TaskId) -> Result<&mut Self, DagError> {
        let curr = self.current_id()?;
        if self
            .deps
            .get(&curr)
            .is_some_and(|list| list.contains(&pred))
        {
            return Ok(self);
        }
        if self.reaches(pred, curr) {
            return Err(DagError::Cycle { pred, succ: curr });
        }
        self.deps.entry(curr).or_default().push(pred);
        self.nodes.get_mut(&curr).unwrap().indegree += 1;
        Ok(self)
    }

    fn set_current_for_tests(&mut self, id: TaskId) {
        self.current = Some(id);
    }
}
