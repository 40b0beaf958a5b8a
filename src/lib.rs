//! Runtime Task Dependency Graphs
//!
//! A minimal, runtime-agnostic executor for dependency graphs that are built
//! — and rewired — at runtime, with dynamic cycle detection and at-most-once,
//! parallel-safe task execution.
//!
//! # Features
//!
//! - **Runtime-mutable graphs**: Add tasks and dependency edges at any time;
//!   [`Task::add_dependency`] refuses edges that would close a cycle, and
//!   [`Task::perform`] detects cycles introduced through the unchecked
//!   variant instead of looping or overflowing the stack.
//! - **At-most-once execution**: A task's action runs exactly once no matter
//!   how many paths reach it. Shared ("diamond") dependencies are claimed
//!   atomically; losing branches wait for the winner instead of re-running.
//! - **Serial and parallel modes**: One execution routine; the mode is a
//!   configuration. Serial recursion is fully deterministic, parallel mode
//!   dispatches dependency branches through a spawner with barrier/join
//!   semantics before the dependent's own action runs.
//! - **Runtime-agnostic**: No runtime dependency; parallel mode takes a
//!   spawner closure and works with Tokio, smol, async-std, etc.
//! - **Resumable failure**: A failed action leaves its task retryable while
//!   completed dependencies stay done, so a later `perform` resumes rather
//!   than repeats.
//!
//! # Quick Start
//!
//! ```
//! use taskdag::{action_fn, TaskGraph};
//!
//! # futures::executor::block_on(async {
//! let graph = TaskGraph::new();
//!
//! let fetch = graph.add_task(action_fn(|| async {
//!     println!("fetch inputs");
//!     Ok(())
//! }));
//! let build = graph.add_task(action_fn(|| async {
//!     println!("build");
//!     Ok(())
//! }));
//! let package = graph.add_task(action_fn(|| async {
//!     println!("package");
//!     Ok(())
//! }));
//!
//! build.add_dependency(&fetch).unwrap();
//! package.add_dependency(&build).unwrap();
//!
//! // Runs fetch, then build, then package; each at most once.
//! package.perform().await.unwrap();
//! assert!(fetch.is_done() && build.is_done() && package.is_done());
//! # });
//! ```
//!
//! # Parallel execution
//!
//! Independent dependency branches can run concurrently on any runtime:
//!
//! ```no_run
//! # use taskdag::{action_fn, TaskGraph};
//! # async {
//! # let graph = TaskGraph::new();
//! # let root = graph.add_task(action_fn(|| async { Ok(()) }));
//! root.perform_parallel(|fut| {
//!     tokio::spawn(fut);
//! })
//! .await
//! .unwrap();
//! # };
//! ```
//!
//! # Errors
//!
//! Fallible operations return [`DagResult<T>`]. Cycle hazards surface as
//! [`DagError::WouldCreateCycle`] (checked wiring, recoverable) or
//! [`DagError::CycleDetected`] (at perform time); action failures as
//! [`DagError::ActionFailed`] / [`DagError::ActionPanicked`], both leaving
//! the failing task retryable.
//!
//! # Optional Tracing Support
//!
//! The `tracing` cargo feature instruments graph wiring and execution via
//! the `tracing` crate, with zero overhead when disabled — instrumentation
//! is compiled out entirely via `#[cfg(feature = "tracing")]`.

mod action;
mod error;
mod graph;
mod node;
mod task;
mod types;

pub use action::{action_fn, Action, ActionError};
pub use error::{DagError, DagResult};
pub use graph::TaskGraph;
pub use task::Task;
pub use types::TaskId;
