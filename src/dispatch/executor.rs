//! Task executor.
//!
//! Runs a handler on its own tokio task so a panic or a hang cannot take the
//! agent down with it. The outcome is always a `TaskResult`:
//!
//! | Handler outcome           | Result                          |
//! |---------------------------|---------------------------------|
//! | `Ok(result)`              | `result` (normalized)           |
//! | `Err(e)`                  | failure, `FailureKind::Handler` |
//! | panic                     | failure, `Panicked`             |
//! | deadline elapsed          | failure, `DeadlineExceeded`     |
//! | shutdown token cancelled  | failure, `Cancelled`            |
//! | no route for intent type  | failure, `Unroutable`           |

use super::{HandlerRegistry, TaskContext};
use crate::fault::panic_message;
use crate::protocol::{Assignment, FailureKind, TaskResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Routes assignments to handlers and enforces the per-task deadline.
#[derive(Debug, Clone)]
pub struct TaskDispatcher {
    registry: Arc<HandlerRegistry>,
    timeout: Duration,
    cancel_grace: Duration,
}

impl TaskDispatcher {
    /// Freeze `registry` and build a dispatcher around it.
    pub fn new(registry: HandlerRegistry, timeout: Duration, cancel_grace: Duration) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout,
            cancel_grace,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute one assignment.
    ///
    /// `shutdown` is the agent-wide cancellation token; the handler sees a
    /// child of it that is also cancelled when the deadline elapses. After
    /// cancellation the handler gets `cancel_grace` to return before its task
    /// is aborted.
    pub async fn execute(
        &self,
        assignment: &Assignment,
        shutdown: &CancellationToken,
    ) -> TaskResult {
        let task_id = assignment.task.id.as_str();

        let handler = match self.registry.resolve(&assignment.intent_type) {
            Ok(binding) => {
                debug!(
                    task_id,
                    intent_type = %assignment.intent_type,
                    pattern = binding.pattern.unwrap_or("<default>"),
                    "routed task"
                );
                Arc::clone(binding.handler)
            }
            Err(e) => {
                warn!(task_id, intent_type = %assignment.intent_type, "unroutable task");
                return TaskResult::fault(FailureKind::Unroutable, e.to_string());
            }
        };

        let cancel = shutdown.child_token();
        let deadline = Instant::now() + self.timeout;
        let ctx = TaskContext::new(
            assignment.intent_id.clone(),
            assignment.intent_type.clone(),
            cancel.clone(),
            deadline,
        );
        let task = assignment.task.clone();

        info!(task_id, assignment_id = %assignment.assignment_id, "executing task");
        let started = Instant::now();
        let mut join = tokio::spawn(async move { handler.execute(task, ctx).await });

        let result = tokio::select! {
            joined = &mut join => {
                let result = from_join(task_id, joined);
                if !result.is_success() && shutdown.is_cancelled() {
                    TaskResult::fault(
                        FailureKind::Cancelled,
                        format!(
                            "task '{}' was cancelled by agent shutdown: {}",
                            task_id,
                            result.error().unwrap_or_default()
                        ),
                    )
                } else {
                    result
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                cancel.cancel();
                self.wind_down(task_id, join).await;
                TaskResult::fault(
                    FailureKind::DeadlineExceeded,
                    format!(
                        "task '{}' exceeded its deadline of {}",
                        task_id,
                        format_duration(self.timeout)
                    ),
                )
            }
            _ = shutdown.cancelled() => {
                self.wind_down(task_id, join).await;
                TaskResult::fault(
                    FailureKind::Cancelled,
                    format!("task '{}' was cancelled by agent shutdown", task_id),
                )
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result.error() {
            None => info!(task_id, elapsed_ms, "task completed"),
            Some(error) => {
                warn!(task_id, elapsed_ms, status = %result.status(), error, "task failed")
            }
        }
        result
    }

    /// Give a cancelled handler its grace period, then abort it.
    async fn wind_down(&self, task_id: &str, mut join: JoinHandle<anyhow::Result<TaskResult>>) {
        if tokio::time::timeout(self.cancel_grace, &mut join).await.is_err() {
            warn!(
                task_id,
                grace_ms = self.cancel_grace.as_millis() as u64,
                "handler ignored cancellation; aborting"
            );
            join.abort();
        }
    }
}

fn from_join(
    task_id: &str,
    joined: std::result::Result<anyhow::Result<TaskResult>, JoinError>,
) -> TaskResult {
    match joined {
        Ok(Ok(result)) => result.normalized(),
        Ok(Err(e)) => TaskResult::failure(format!("{:#}", e)),
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            TaskResult::fault(
                FailureKind::Panicked,
                format!(
                    "handler panicked on task '{}': {}",
                    task_id,
                    panic_message(payload.as_ref())
                ),
            )
        }
        Err(_) => TaskResult::fault(
            FailureKind::Cancelled,
            format!("handler for task '{}' was aborted", task_id),
        ),
    }
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}
