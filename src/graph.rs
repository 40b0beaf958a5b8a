//! The task graph arena and its state transitions.
//!
//! `TaskGraph` owns every node in a Mutex-guarded arena and hands out cheap
//! [`Task`] handles indexing into it. The arena lock is the claim primitive:
//! every `NotStarted → Started` transition is a check-and-set performed in a
//! single critical section, so concurrent branches racing for a shared
//! (diamond) dependency resolve to exactly one winner. The lock is never held
//! across an await.

use std::collections::HashSet;
use std::sync::Arc;

use futures::channel::oneshot;
use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::action::{Action, ErasedAction};
use crate::error::{DagError, DagResult};
use crate::node::{Claim, ExecState, Node};
use crate::task::Task;
use crate::types::TaskId;

/// A graph of tasks wired by "must complete before me" edges.
///
/// Cloning a `TaskGraph` is cheap and yields another handle to the same
/// graph; all state lives behind a shared arena. Build the graph with
/// [`TaskGraph::add_task`] (and [`Task::add_dependency`]), then call
/// [`Task::perform`] on a root.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use taskdag::{action_fn, TaskGraph};
///
/// # futures::executor::block_on(async {
/// let graph = TaskGraph::new();
/// let runs = Arc::new(AtomicUsize::new(0));
///
/// let counted = {
///     let runs = Arc::clone(&runs);
///     graph.add_task(action_fn(move || {
///         let runs = Arc::clone(&runs);
///         async move {
///             runs.fetch_add(1, Ordering::SeqCst);
///             Ok(())
///         }
///     }))
/// };
///
/// counted.perform().await.unwrap();
/// counted.perform().await.unwrap(); // already done: no-op
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct TaskGraph {
    pub(crate) inner: Arc<GraphInner>,
}

pub(crate) struct GraphInner {
    pub(crate) nodes: Mutex<Vec<Node>>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GraphInner {
                nodes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Add a task with no initial dependencies.
    pub fn add_task<A: Action>(&self, action: A) -> Task {
        self.insert(Box::new(action), Vec::new())
    }

    /// Add a task with an initial ordered dependency list.
    ///
    /// The dependencies must already exist, so the new node cannot close a
    /// cycle (nothing depends on it yet); the only failure is mixing handles
    /// from another graph.
    ///
    /// # Errors
    ///
    /// Returns [`DagError::GraphMismatch`] if any dependency belongs to a
    /// different graph.
    pub fn add_task_with_deps<A: Action>(&self, action: A, deps: &[&Task]) -> DagResult<Task> {
        let mut dep_ids = Vec::with_capacity(deps.len());
        for dep in deps {
            if !self.same_graph(&dep.graph) {
                return Err(DagError::GraphMismatch);
            }
            dep_ids.push(dep.id);
        }
        Ok(self.insert(Box::new(action), dep_ids))
    }

    /// Number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.inner.nodes.lock().len()
    }

    /// Whether the graph contains no tasks.
    pub fn is_empty(&self) -> bool {
        self.inner.nodes.lock().is_empty()
    }

    fn insert(&self, action: Box<dyn ErasedAction>, deps: Vec<TaskId>) -> Task {
        let mut nodes = self.inner.nodes.lock();
        let id = TaskId(nodes.len());

        #[cfg(feature = "tracing")]
        debug!(
            task_id = id.0,
            dependency_count = deps.len(),
            "adding task to graph"
        );

        nodes.push(Node::new(action, deps));
        drop(nodes);

        Task {
            graph: self.clone(),
            id,
        }
    }

    pub(crate) fn same_graph(&self, other: &TaskGraph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl GraphInner {
    /// Atomically claim `id` for execution.
    ///
    /// Exactly one caller can observe `NotStarted` and flip it to `Started`;
    /// the action moves out of the node in the same critical section, so a
    /// task can never run twice concurrently.
    pub(crate) fn claim(&self, id: TaskId) -> Claim {
        let mut nodes = self.nodes.lock();
        let node = &mut nodes[id.0];
        match node.state {
            ExecState::Done => Claim::AlreadyDone,
            ExecState::Started => {
                let (tx, rx) = oneshot::channel();
                node.waiters.push(tx);
                Claim::Wait(rx)
            }
            ExecState::NotStarted => match node.action.take() {
                Some(action) => {
                    node.state = ExecState::Started;
                    Claim::Won {
                        action,
                        deps: node.deps.clone(),
                    }
                }
                // The action is only ever absent once the task completed.
                None => Claim::AlreadyDone,
            },
        }
    }

    /// Mark a claimed task `Done` and wake its waiters with success.
    pub(crate) fn finish(&self, id: TaskId) {
        let waiters = {
            let mut nodes = self.nodes.lock();
            let node = &mut nodes[id.0];
            node.state = ExecState::Done;
            std::mem::take(&mut node.waiters)
        };
        for waiter in waiters {
            // A waiter may have been dropped; that's fine.
            let _ = waiter.send(Ok(()));
        }
    }

    /// Release a claim without completing: the task returns to `NotStarted`,
    /// the unconsumed action (if any) goes back into the node, and waiters
    /// observe `err`.
    pub(crate) fn release(&self, id: TaskId, action: Option<Box<dyn ErasedAction>>, err: &DagError) {
        let waiters = {
            let mut nodes = self.nodes.lock();
            let node = &mut nodes[id.0];
            node.state = ExecState::NotStarted;
            if action.is_some() {
                node.action = action;
            }
            std::mem::take(&mut node.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(err.clone()));
        }
    }

    /// Whether `to` is reachable from `from` over one or more dependency
    /// edges. Tracks visited nodes so it terminates even if the graph has
    /// been made cyclic through unchecked edge additions.
    pub(crate) fn reachable(&self, from: TaskId, to: TaskId) -> bool {
        let nodes = self.nodes.lock();
        reachable_in(&nodes, from, to)
    }
}

/// Reachability over an already-locked arena. `add_dependency` runs the check
/// and the insertion under one lock acquisition so concurrent adds cannot
/// interleave a cycle past the check.
pub(crate) fn reachable_in(nodes: &[Node], from: TaskId, to: TaskId) -> bool {
    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut stack: Vec<TaskId> = nodes[from.0].deps.clone();
    while let Some(id) = stack.pop() {
        if id == to {
            return true;
        }
        if visited.insert(id) {
            stack.extend(nodes[id.0].deps.iter().copied());
        }
    }
    false
}
