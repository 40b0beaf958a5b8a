//! Basic execution semantics: idempotence, diamonds, resumption.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskdag::{action_fn, TaskGraph};

use crate::common::{counting, new_log, recording};

#[tokio::test]
async fn single_task_runs_once() {
    let graph = TaskGraph::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let task = graph.add_task(counting(&runs));

    task.perform().await.unwrap();
    assert!(task.is_done());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn perform_twice_invokes_the_action_once() {
    let graph = TaskGraph::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let task = graph.add_task(counting(&runs));

    task.perform().await.unwrap();
    // Second call is a no-op short-circuit
    task.perform().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn diamond_runs_the_shared_dependency_once() {
    // a -> {b, c}, b -> d, c -> d
    let graph = TaskGraph::new();
    let log = new_log();

    let d = graph.add_task(recording(&log, "d"));
    let b = graph.add_task_with_deps(recording(&log, "b"), &[&d]).unwrap();
    let c = graph.add_task_with_deps(recording(&log, "c"), &[&d]).unwrap();
    let a = graph
        .add_task_with_deps(recording(&log, "a"), &[&b, &c])
        .unwrap();

    a.perform().await.unwrap();

    let order = log.lock().clone();
    assert_eq!(order.iter().filter(|n| **n == "d").count(), 1);
    // Every dependency ran before its dependent
    let pos = |name| order.iter().position(|n| *n == name).unwrap();
    assert!(pos("d") < pos("b"));
    assert!(pos("d") < pos("c"));
    assert!(pos("b") < pos("a"));
    assert!(pos("c") < pos("a"));
}

#[tokio::test]
async fn performing_a_mid_graph_task_runs_only_its_subgraph() {
    let graph = TaskGraph::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let leaf = graph.add_task(counting(&runs));
    let mid = graph.add_task_with_deps(counting(&runs), &[&leaf]).unwrap();
    let root = graph.add_task_with_deps(counting(&runs), &[&mid]).unwrap();

    mid.perform().await.unwrap();
    assert!(leaf.is_done());
    assert!(mid.is_done());
    assert!(!root.is_done());
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // Performing the root afterwards resumes: only the root's action runs
    root.perform().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn dependencies_added_after_construction_are_honored() {
    let graph = TaskGraph::new();
    let log = new_log();

    let root = graph.add_task(recording(&log, "root"));
    let late = graph.add_task(recording(&log, "late"));
    root.add_dependency(&late).unwrap();

    root.perform().await.unwrap();
    assert_eq!(*log.lock(), vec!["late", "root"]);
}

#[tokio::test]
async fn empty_action_graph_with_shared_handles() {
    // Clones of a handle refer to the same task
    let graph = TaskGraph::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let task = graph.add_task(counting(&runs));
    let alias = task.clone();

    task.perform().await.unwrap();
    alias.perform().await.unwrap();

    assert!(alias.is_done());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn action_errors_use_the_callers_error_type() {
    #[derive(Debug)]
    struct CustomError;

    impl std::fmt::Display for CustomError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "custom failure")
        }
    }

    impl std::error::Error for CustomError {}

    let graph = TaskGraph::new();
    let task = graph.add_task(action_fn(|| async { Err(CustomError.into()) }));

    let err = task.perform().await.unwrap_err();
    assert!(err.to_string().contains("custom failure"));
}
