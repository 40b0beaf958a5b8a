//! Internal per-task storage for the graph arena.
//!
//! A `Node` holds everything the graph tracks about one task: its dependency
//! edges, its execution state, the boxed action, and the waiters registered
//! by concurrent `perform` branches. All fields are mutated only under the
//! graph's arena lock.

use futures::channel::oneshot;

use crate::action::ErasedAction;
use crate::error::DagResult;
use crate::types::TaskId;

/// Execution state of a task. Transitions only move forward during a run:
/// `NotStarted → Started → Done`. A failed or aborted task returns to
/// `NotStarted` with its action restored, which is what makes retry possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecState {
    NotStarted,
    Started,
    Done,
}

pub(crate) struct Node {
    /// Direct dependencies, in the order they were listed or added.
    pub(crate) deps: Vec<TaskId>,
    pub(crate) state: ExecState,
    /// Present while the task still has work to do. Taken out by a winning
    /// claim and consumed on success; restored on failure or abort.
    pub(crate) action: Option<Box<dyn ErasedAction>>,
    /// Branches waiting for a concurrent claimant to finish this task.
    pub(crate) waiters: Vec<oneshot::Sender<DagResult<()>>>,
}

impl Node {
    pub(crate) fn new(action: Box<dyn ErasedAction>, deps: Vec<TaskId>) -> Self {
        Self {
            deps,
            state: ExecState::NotStarted,
            action: Some(action),
            waiters: Vec::new(),
        }
    }
}

/// Outcome of attempting to claim a task for execution.
pub(crate) enum Claim {
    /// This caller won the claim: it now owns the action and must drive the
    /// task to completion (or release it on failure).
    Won {
        action: Box<dyn ErasedAction>,
        deps: Vec<TaskId>,
    },
    /// The task already completed; nothing to do.
    AlreadyDone,
    /// A concurrent branch holds the claim. Await its outcome.
    Wait(oneshot::Receiver<DagResult<()>>),
}
