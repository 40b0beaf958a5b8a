//! Error types for graph construction and execution.

/// Errors that can occur while wiring or performing a task graph.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DagError {
    /// A `perform` call re-entered a task that is already executing on its
    /// own call ancestry: the dependency relation contains a cycle.
    ///
    /// Tasks that finished before the cycle was hit stay `Done`; tasks
    /// claimed along the failing path are released so a later `perform`
    /// (after the cycle is removed) can run them.
    CycleDetected { task_id: usize },

    /// A checked `add_dependency` was refused because the proposed edge
    /// would make the dependency relation cyclic. No state was modified.
    WouldCreateCycle {
        task_id: usize,
        dependency_id: usize,
    },

    /// The task's action returned an error. The task stays not-done so a
    /// later `perform` can retry it; dependencies that completed keep their
    /// `Done` state.
    ActionFailed { task_id: usize, message: String },

    /// The task's action panicked during execution.
    ActionPanicked {
        task_id: usize,
        panic_message: String,
    },

    /// The `perform` call executing this task was dropped before the task
    /// finished. The claim was released; the task is retryable.
    Aborted { task_id: usize },

    /// Task handles from two different graphs were mixed in one operation.
    GraphMismatch,
}

impl std::fmt::Display for DagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DagError::CycleDetected { task_id } => {
                write!(
                    f,
                    "Task #{task_id} depends on itself: the dependency graph contains a cycle"
                )
            }
            DagError::WouldCreateCycle {
                task_id,
                dependency_id,
            } => {
                write!(
                    f,
                    "Refusing to add dependency #{dependency_id} to task #{task_id}: \
                     the edge would introduce a cycle"
                )
            }
            DagError::ActionFailed { task_id, message } => {
                write!(f, "Task #{task_id} failed: {message}")
            }
            DagError::ActionPanicked {
                task_id,
                panic_message,
            } => {
                write!(
                    f,
                    "Task #{task_id} panicked during execution: {panic_message}"
                )
            }
            DagError::Aborted { task_id } => {
                write!(
                    f,
                    "Task #{task_id} was aborted: the perform call driving it was dropped"
                )
            }
            DagError::GraphMismatch => {
                write!(f, "Task handles belong to different graphs")
            }
        }
    }
}

impl std::error::Error for DagError {}

/// Result type for graph operations.
pub type DagResult<T> = Result<T, DagError>;
