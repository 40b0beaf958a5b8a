//! Core identifier types for tasks in a graph.

/// Opaque task identifier, unique within one [`TaskGraph`](crate::TaskGraph).
///
/// Ids index into the graph's arena and are only meaningful for the graph
/// that allocated them. They are cheap to copy and usable as map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Position of this task in its graph's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
