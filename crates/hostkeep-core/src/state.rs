//! Queue lifecycle states

/// Lifecycle of a [`crate::TaskQueue`]
///
/// `Created -> Running` happens on the first enqueue, `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No task has been enqueued yet, no worker exists
    Created,
    /// The worker is draining tasks
    Running,
    /// No further tasks are accepted
    Closed,
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueState::Created => write!(f, "created"),
            QueueState::Running => write!(f, "running"),
            QueueState::Closed => write!(f, "closed"),
        }
    }
}
