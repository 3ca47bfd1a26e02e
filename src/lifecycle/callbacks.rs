//! Optional hooks around bid evaluation and task execution.

use crate::fault::contain;
use crate::protocol::{Assignment, Bid, Intent, TaskResult};
use tracing::warn;

/// Observer hooks. Every method defaults to a no-op.
///
/// A hook that returns an error or panics is logged and the flow it
/// surrounds continues unchanged.
pub trait Callbacks: Send + Sync {
    fn before_bid(&self, _intent: &Intent) -> anyhow::Result<()> {
        Ok(())
    }

    /// `bid` is `None` when the strategy declined or faulted.
    fn after_bid(&self, _intent: &Intent, _bid: Option<&Bid>) -> anyhow::Result<()> {
        Ok(())
    }

    fn before_task(&self, _assignment: &Assignment) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_task(&self, _assignment: &Assignment, _result: &TaskResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Callbacks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {}

/// Run one hook, logging its failure.
pub(crate) fn invoke(hook: &str, subject: &str, f: impl FnOnce() -> anyhow::Result<()>) {
    match contain(f) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(hook, subject, error = %format!("{:#}", e), "callback failed"),
        Err(msg) => warn!(hook, subject, panic = %msg, "callback panicked"),
    }
}
