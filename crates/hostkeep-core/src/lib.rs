//! hostkeep-core: background work scheduling
//!
//! Implements the single-worker [`TaskQueue`] that the agent uses to run
//! collection jobs without blocking the caller on their completion.

pub mod error;
pub mod state;
pub mod tasker;

pub use error::QueueError;
pub use state::QueueState;
pub use tasker::{AfterTaskHook, TaskQueue};
