//! The `Action` trait and closure adapters.
//!
//! An action is the unit of work a task carries: a zero-argument async
//! procedure that may fail. The graph treats it as opaque and invokes it at
//! most once per successful completion; a failed action stays in its task so
//! a later `perform` can retry it, which is why `run` takes `&mut self`
//! rather than consuming the action.

use std::future::Future;

use futures::future::BoxFuture;

/// Error type actions may return. Boxed so callers can use any error type.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// A zero-argument, side-effecting unit of async work.
///
/// Implement this directly for struct-based actions, or build one from a
/// closure with [`action_fn`]:
///
/// ```
/// use taskdag::{action_fn, TaskGraph};
///
/// # futures::executor::block_on(async {
/// let graph = TaskGraph::new();
/// let hello = graph.add_task(action_fn(|| async {
///     println!("hello");
///     Ok(())
/// }));
/// hello.perform().await.unwrap();
/// # });
/// ```
pub trait Action: Send + 'static {
    /// Run the action once. Returning `Err` marks the owning task as failed
    /// but retryable.
    fn run(&mut self) -> impl Future<Output = Result<(), ActionError>> + Send;
}

/// Object-safe counterpart of [`Action`] for heterogeneous storage.
///
/// The arena stores `Box<dyn ErasedAction>`; this is the only type-erasure
/// boundary in the crate. The public surface stays fully typed.
pub(crate) trait ErasedAction: Send {
    fn run(&mut self) -> BoxFuture<'_, Result<(), ActionError>>;
}

impl<A: Action> ErasedAction for A {
    fn run(&mut self) -> BoxFuture<'_, Result<(), ActionError>> {
        Box::pin(Action::run(self))
    }
}

/// Build an [`Action`] from an async closure.
///
/// The closure is `FnMut` so a task whose action failed can be performed
/// again. Any error type convertible into [`ActionError`] works:
///
/// ```
/// use taskdag::action_fn;
///
/// let mut attempts = 0u32;
/// let action = action_fn(move || {
///     attempts += 1;
///     async move {
///         if attempts < 2 {
///             Err("transient".into())
///         } else {
///             Ok(())
///         }
///     }
/// });
/// # let _ = action;
/// ```
pub fn action_fn<F, Fut>(f: F) -> impl Action
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    ActionFn { f }
}

struct ActionFn<F> {
    f: F,
}

impl<F, Fut> Action for ActionFn<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    fn run(&mut self) -> impl Future<Output = Result<(), ActionError>> + Send {
        (self.f)()
    }
}
