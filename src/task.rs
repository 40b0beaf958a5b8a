//! Task handles and the perform engine.
//!
//! A [`Task`] is a cheap handle into its graph's arena. The three graph
//! operations live here: `add_dependency` (checked and unchecked),
//! `depends_on`, and `perform` in its serial and parallel variants. Both
//! variants share one recursive routine, `perform_task`, parameterized by
//! [`Mode`]; the mode decides only whether direct dependencies run one at a
//! time or are dispatched through a spawner.
//!
//! # Diamonds vs. cycles
//!
//! Every `perform` branch carries the set of task ids on its own call
//! ancestry. Meeting a task already in that set is a cycle and fails with
//! [`DagError::CycleDetected`]. Meeting a task that is `Started` but *not*
//! on the ancestry means a concurrent branch (the other side of a diamond)
//! claimed it first; this branch registers a waiter and adopts the
//! claimant's outcome instead of erroring. The persistent `Started` flag
//! alone is never treated as evidence of a cycle.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;

#[cfg(feature = "tracing")]
use tracing::{debug, error, trace};

use crate::action::ErasedAction;
use crate::error::{DagError, DagResult};
use crate::graph::{reachable_in, TaskGraph};
use crate::node::{Claim, ExecState};
use crate::types::TaskId;

/// Function that spawns a branch future on the caller's async runtime.
///
/// Examples:
/// - Tokio: `|fut| { tokio::spawn(fut); }`
/// - smol: `|fut| { smol::spawn(fut).detach(); }`
pub(crate) type Spawner = Arc<dyn Fn(BoxFuture<'static, ()>) + Send + Sync>;

/// How `perform` drives direct dependencies: in listed order, or
/// concurrently through a spawner. One configuration, one code path.
#[derive(Clone)]
pub(crate) enum Mode {
    Serial,
    Parallel(Spawner),
}

/// Handle to one task in a [`TaskGraph`].
///
/// Handles are cheap to clone and share; a task may be listed as a
/// dependency of any number of other tasks (diamond shapes are legal and
/// the shared task still runs at most once).
#[derive(Clone)]
pub struct Task {
    pub(crate) graph: TaskGraph,
    pub(crate) id: TaskId,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}

impl Task {
    /// This task's id within its graph.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether this task's action has completed successfully.
    pub fn is_done(&self) -> bool {
        self.graph.inner.nodes.lock()[self.id.0].state == ExecState::Done
    }

    /// Number of direct dependencies currently listed.
    pub fn dependency_count(&self) -> usize {
        self.graph.inner.nodes.lock()[self.id.0].deps.len()
    }

    /// Append `dependency` to this task's dependency list, refusing edges
    /// that would make the graph cyclic.
    ///
    /// The reachability check and the insertion happen under a single lock
    /// acquisition, so two concurrent `add_dependency` calls cannot
    /// interleave a cycle past the check.
    ///
    /// # Errors
    ///
    /// - [`DagError::WouldCreateCycle`] if this task is reachable from
    ///   `dependency` (or `dependency` is this task); the list is left
    ///   unchanged.
    /// - [`DagError::GraphMismatch`] if the handles come from different
    ///   graphs.
    pub fn add_dependency(&self, dependency: &Task) -> DagResult<()> {
        if !self.graph.same_graph(&dependency.graph) {
            return Err(DagError::GraphMismatch);
        }

        let mut nodes = self.graph.inner.nodes.lock();
        if dependency.id == self.id || reachable_in(&nodes, dependency.id, self.id) {
            return Err(DagError::WouldCreateCycle {
                task_id: self.id.0,
                dependency_id: dependency.id.0,
            });
        }

        #[cfg(feature = "tracing")]
        debug!(
            task_id = self.id.0,
            dependency_id = dependency.id.0,
            "wiring task dependency"
        );

        nodes[self.id.0].deps.push(dependency.id);
        Ok(())
    }

    /// Append `dependency` without the cycle check.
    ///
    /// This can make the graph cyclic; `perform` will then fail with
    /// [`DagError::CycleDetected`] rather than loop or overflow. Prefer
    /// [`Task::add_dependency`] unless edge insertion is on a hot path and
    /// acyclicity is guaranteed by construction.
    ///
    /// # Errors
    ///
    /// Returns [`DagError::GraphMismatch`] if the handles come from
    /// different graphs (graph membership is validated even here, since a
    /// foreign id would index an unrelated task).
    pub fn add_dependency_unchecked(&self, dependency: &Task) -> DagResult<()> {
        if !self.graph.same_graph(&dependency.graph) {
            return Err(DagError::GraphMismatch);
        }

        #[cfg(feature = "tracing")]
        debug!(
            task_id = self.id.0,
            dependency_id = dependency.id.0,
            "wiring task dependency (unchecked)"
        );

        self.graph.inner.nodes.lock()[self.id.0].deps.push(dependency.id);
        Ok(())
    }

    /// Whether `other` is reachable from this task over one or more
    /// dependency edges.
    ///
    /// Pure query, no side effects. Terminates even on a graph made cyclic
    /// through [`Task::add_dependency_unchecked`]. Handles from a different
    /// graph are never reachable.
    pub fn depends_on(&self, other: &Task) -> bool {
        self.graph.same_graph(&other.graph) && self.graph.inner.reachable(self.id, other.id)
    }

    /// Perform this task and all its transitive dependencies, serially.
    ///
    /// Dependencies run in listed order, depth-first, each at most once;
    /// this task's own action runs last. Calling `perform` on a task that is
    /// already done is a no-op, and partial progress survives failures: a
    /// second call after an [`DagError::ActionFailed`] resumes with the
    /// dependencies that already completed still done.
    ///
    /// # Errors
    ///
    /// - [`DagError::CycleDetected`] if the dependency relation is cyclic.
    /// - [`DagError::ActionFailed`] / [`DagError::ActionPanicked`] if an
    ///   action fails; the failing task stays retryable.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self), fields(task_id = self.id.0))
    )]
    pub async fn perform(&self) -> DagResult<()> {
        perform_task(self.graph.clone(), self.id, HashSet::new(), Mode::Serial).await
    }

    /// Perform this task with direct dependencies dispatched concurrently.
    ///
    /// Each dependency branch is handed to `spawner` as a `'static` boxed
    /// future; the task's own action runs only after every branch has
    /// finished (barrier semantics). Ordering across independent subgraphs
    /// is unspecified; ordering within one chain is preserved by the
    /// recursive barrier. Semantics otherwise match [`Task::perform`]:
    /// at-most-once actions, cycle detection, resumable partial progress.
    ///
    /// The spawner makes this runtime-agnostic:
    ///
    /// ```no_run
    /// # use taskdag::{action_fn, TaskGraph};
    /// # async {
    /// # let graph = TaskGraph::new();
    /// # let root = graph.add_task(action_fn(|| async { Ok(()) }));
    /// root.perform_parallel(|fut| {
    ///     tokio::spawn(fut);
    /// })
    /// .await
    /// .unwrap();
    /// # };
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, spawner), fields(task_id = self.id.0))
    )]
    pub async fn perform_parallel<S>(&self, spawner: S) -> DagResult<()>
    where
        S: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
    {
        perform_task(
            self.graph.clone(),
            self.id,
            HashSet::new(),
            Mode::Parallel(Arc::new(spawner)),
        )
        .await
    }
}

/// Releases a claim if the future driving it is dropped mid-flight.
///
/// Without this, cancelling a `perform` call would leave the task `Started`
/// forever and hang every waiter. On premature drop the claim is released,
/// the unconsumed action restored, and waiters observe [`DagError::Aborted`].
struct ClaimGuard {
    graph: TaskGraph,
    id: TaskId,
    action: Option<Box<dyn ErasedAction>>,
    armed: bool,
}

impl ClaimGuard {
    fn new(graph: TaskGraph, id: TaskId, action: Box<dyn ErasedAction>) -> Self {
        Self {
            graph,
            id,
            action: Some(action),
            armed: true,
        }
    }

    fn action_mut(&mut self) -> &mut dyn ErasedAction {
        // Present from claim until complete()/fail(); invariant by construction.
        self.action.as_deref_mut().expect("claim holds the action")
    }

    /// Success: the action is consumed, the task is `Done`.
    fn complete(&mut self) {
        self.armed = false;
        self.action = None;
        self.graph.inner.finish(self.id);
    }

    /// Failure: release the claim, restore the action, propagate `err` to
    /// waiters.
    fn fail(&mut self, err: &DagError) {
        self.armed = false;
        self.graph.inner.release(self.id, self.action.take(), err);
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.armed {
            let err = DagError::Aborted { task_id: self.id.0 };
            self.graph.inner.release(self.id, self.action.take(), &err);
        }
    }
}

/// Recursive perform. Boxed because async recursion needs an indirection,
/// and `'static` so parallel branches can be handed to a spawner.
pub(crate) fn perform_task(
    graph: TaskGraph,
    id: TaskId,
    mut path: HashSet<TaskId>,
    mode: Mode,
) -> BoxFuture<'static, DagResult<()>> {
    Box::pin(async move {
        // Own ancestry first: a Started task on this branch's path is a
        // cycle, not a concurrent claimant.
        if path.contains(&id) {
            #[cfg(feature = "tracing")]
            error!(task_id = id.0, "cycle detected in dependency graph");

            return Err(DagError::CycleDetected { task_id: id.0 });
        }

        let (action, deps) = match graph.inner.claim(id) {
            Claim::AlreadyDone => return Ok(()),
            Claim::Wait(rx) => {
                #[cfg(feature = "tracing")]
                trace!(task_id = id.0, "waiting for concurrent claimant");

                return match rx.await {
                    Ok(outcome) => outcome,
                    // Claimant dropped without notifying; treat as aborted.
                    Err(oneshot::Canceled) => Err(DagError::Aborted { task_id: id.0 }),
                };
            }
            Claim::Won { action, deps } => (action, deps),
        };

        #[cfg(feature = "tracing")]
        trace!(
            task_id = id.0,
            dependency_count = deps.len(),
            "claimed task"
        );

        path.insert(id);
        let mut guard = ClaimGuard::new(graph.clone(), id, action);

        match &mode {
            Mode::Serial => {
                for dep in deps {
                    if let Err(err) =
                        perform_task(graph.clone(), dep, path.clone(), Mode::Serial).await
                    {
                        guard.fail(&err);
                        return Err(err);
                    }
                }
            }
            Mode::Parallel(spawner) => {
                let mut pending = Vec::with_capacity(deps.len());
                for dep in deps {
                    let (tx, rx) = oneshot::channel();
                    let branch = perform_task(graph.clone(), dep, path.clone(), mode.clone());
                    (spawner.as_ref())(Box::pin(async move {
                        let _ = tx.send(branch.await);
                    }));
                    pending.push((dep, rx));
                }

                // Barrier: join every branch before surfacing the first
                // error, so sibling branches are never left running against
                // a released claim.
                let mut first_err = None;
                for (dep, rx) in pending {
                    let outcome = match rx.await {
                        Ok(outcome) => outcome,
                        Err(oneshot::Canceled) => Err(DagError::Aborted { task_id: dep.0 }),
                    };
                    if let Err(err) = outcome {
                        if first_err.is_none() {
                            first_err = Some(err);
                        }
                    }
                }
                if let Some(err) = first_err {
                    guard.fail(&err);
                    return Err(err);
                }
            }
        }

        #[cfg(feature = "tracing")]
        trace!(task_id = id.0, "dependencies complete, running action");

        // Catch panics so the state machine stays consistent whether an
        // action fails by Err or by unwinding.
        let run = AssertUnwindSafe(guard.action_mut().run())
            .catch_unwind()
            .await;

        match run {
            Ok(Ok(())) => {
                guard.complete();

                #[cfg(feature = "tracing")]
                trace!(task_id = id.0, "task done");

                Ok(())
            }
            Ok(Err(action_err)) => {
                let err = DagError::ActionFailed {
                    task_id: id.0,
                    message: action_err.to_string(),
                };

                #[cfg(feature = "tracing")]
                error!(task_id = id.0, %action_err, "action failed");

                guard.fail(&err);
                Err(err)
            }
            Err(payload) => {
                let panic_message = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };

                #[cfg(feature = "tracing")]
                error!(task_id = id.0, %panic_message, "action panicked");

                let err = DagError::ActionPanicked {
                    task_id: id.0,
                    panic_message,
                };
                guard.fail(&err);
                Err(err)
            }
        }
    })
}
