//! Intent-consumption loop.
//!
//! Polls the matcher until stopped. Each intent gets its own bid decision
//! task; assignments go to the worker pool, or are rejected when it is full.
//!
//! A poll in flight when `stop` fires is allowed to finish (it is bounded by
//! the request timeout). The matcher has already handed out what it returns,
//! so assignments in that response are reported `CANCELLED` and intents are
//! not bid on.

use super::callbacks::{Callbacks, invoke};
use super::pool::WorkQueue;
use super::runner::TaskRunner;
use crate::bidding::{BiddingStrategy, decide};
use crate::client::MatcherClient;
use crate::protocol::{Intent, MatcherEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) struct Intake {
    pub(crate) matcher: Arc<dyn MatcherClient>,
    pub(crate) strategy: Arc<dyn BiddingStrategy>,
    pub(crate) callbacks: Arc<dyn Callbacks>,
    pub(crate) queue: WorkQueue,
    pub(crate) runner: Arc<TaskRunner>,
    pub(crate) poll_interval: Duration,
}

impl Intake {
    /// Run until `stop` fires, then wait for outstanding bid decisions and
    /// rejection reports.
    pub(crate) async fn run(self, stop: CancellationToken) {
        info!(poll_ms = self.poll_interval.as_millis() as u64, "consuming intents");
        let mut side_tasks = JoinSet::new();

        while !stop.is_cancelled() {
            let polled = self.matcher.poll().await;
            let stopping = stop.is_cancelled();

            let idle = match polled {
                Ok(events) if events.is_empty() => true,
                Ok(events) => {
                    for event in events {
                        if stopping {
                            self.cancel(event, &mut side_tasks);
                        } else {
                            self.dispatch(event, &mut side_tasks);
                        }
                    }
                    false
                }
                Err(e) => {
                    warn!(error = %e, "matcher poll failed");
                    true
                }
            };

            while let Some(joined) = side_tasks.try_join_next() {
                reap(joined);
            }

            if idle && !stopping {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        debug!(outstanding = side_tasks.len(), "intake stopping");
        while let Some(joined) = side_tasks.join_next().await {
            reap(joined);
        }
        info!("stopped consuming intents");
    }

    fn dispatch(&self, event: MatcherEvent, side_tasks: &mut JoinSet<()>) {
        match event {
            MatcherEvent::Intent(intent) => {
                side_tasks.spawn(bid(
                    intent,
                    Arc::clone(&self.strategy),
                    Arc::clone(&self.callbacks),
                    Arc::clone(&self.matcher),
                ));
            }
            MatcherEvent::Assignment(assignment) => {
                debug!(
                    assignment_id = %assignment.assignment_id,
                    task_id = %assignment.task.id,
                    "assignment received"
                );
                if let Err(assignment) = self.queue.try_submit(assignment) {
                    let runner = Arc::clone(&self.runner);
                    side_tasks.spawn(async move { runner.reject(assignment).await });
                }
            }
        }
    }

    /// Account for an event that arrived after `stop` fired.
    fn cancel(&self, event: MatcherEvent, side_tasks: &mut JoinSet<()>) {
        match event {
            MatcherEvent::Intent(intent) => {
                debug!(intent_id = %intent.id, "agent stopping; not bidding");
            }
            MatcherEvent::Assignment(assignment) => {
                info!(
                    assignment_id = %assignment.assignment_id,
                    "assignment arrived during shutdown; cancelling"
                );
                let runner = Arc::clone(&self.runner);
                side_tasks.spawn(async move { runner.cancel_queued(assignment).await });
            }
        }
    }
}

async fn bid(
    intent: Intent,
    strategy: Arc<dyn BiddingStrategy>,
    callbacks: Arc<dyn Callbacks>,
    matcher: Arc<dyn MatcherClient>,
) {
    invoke("before_bid", &intent.id, || callbacks.before_bid(&intent));
    let decision = decide(strategy.as_ref(), &intent);
    invoke("after_bid", &intent.id, || {
        callbacks.after_bid(&intent, decision.as_ref())
    });

    if let Some(bid) = decision
        && let Err(e) = matcher.submit_bid(&intent.id, &bid).await
    {
        warn!(intent_id = %intent.id, error = %e, "bid submission failed");
    }
}

fn reap(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "intake task terminated abnormally");
    }
}
