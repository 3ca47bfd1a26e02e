//! Task dispatch.
//!
//! - **Handler**: the pluggable domain processor for a family of intent types
//! - **Registry**: intent-type routing, fixed before the agent starts
//! - **Executor**: runs one task behind a fault boundary with a deadline
//!
//! Handlers are selected by lookup, never by type hierarchy: a registry maps
//! intent-type patterns to `Arc<dyn Handler>` values.

mod executor;
mod registry;

pub use executor::TaskDispatcher;
pub use registry::{HandlerBinding, HandlerRegistry, RouteSource};

use crate::protocol::{Task, TaskResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Executes tasks for the intent types it is registered under.
///
/// Returning `Err` or panicking is allowed; the dispatcher converts both into
/// a failed `TaskResult`. Long-running handlers must watch
/// `TaskContext::cancelled` and return promptly once it fires.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn execute(&self, task: Task, ctx: TaskContext) -> anyhow::Result<TaskResult>;
}

/// Per-invocation context handed to a handler.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub intent_id: String,
    pub intent_type: String,
    cancel: CancellationToken,
    deadline: Instant,
}

impl TaskContext {
    pub(crate) fn new(
        intent_id: impl Into<String>,
        intent_type: impl Into<String>,
        cancel: CancellationToken,
        deadline: Instant,
    ) -> Self {
        Self {
            intent_id: intent_id.into(),
            intent_type: intent_type.into(),
            cancel,
            deadline,
        }
    }

    /// Whether the task has been cancelled (deadline or shutdown).
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the task is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The cancellation token, for handing to sub-operations.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
