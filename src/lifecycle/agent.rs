//! The agent: registrations, configuration and the start/stop state machine.

use super::callbacks::{Callbacks, NoopCallbacks};
use super::intake::Intake;
use super::pool::WorkerPool;
use super::runner::{ShutdownSummary, TaskRunner};
use super::state::AgentState;
use crate::bidding::BiddingStrategy;
use crate::client::{HttpMatcherClient, HttpValidatorClient, MatcherClient, ValidatorTransport};
use crate::config::{AgentConfig, ResolvedConfig};
use crate::dispatch::{Handler, HandlerRegistry, TaskDispatcher};
use crate::error::{AgentError, Result};
use crate::protocol::AgentRegistration;
use crate::submit::{ExecutionReportSubmitter, RetryPolicy, UndeliveredJournal};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything that exists only while the agent runs.
struct Running {
    intake_stop: CancellationToken,
    intake: JoinHandle<()>,
    tasks: CancellationToken,
    pool: WorkerPool,
    runner: Arc<TaskRunner>,
    matcher: Arc<dyn MatcherClient>,
    submitter: Arc<ExecutionReportSubmitter>,
    shutdown_grace: Duration,
    report_window: Duration,
}

/// A marketplace agent.
///
/// ```text
/// CREATED ──configure()──▶ CONFIGURED ──start()──▶ RUNNING ──stop()──▶ STOPPING ──▶ STOPPED
/// ```
///
/// `start()` called in `CREATED` runs `configure()` first, so configuration
/// problems surface before any connection is opened.
pub struct Agent {
    config: AgentConfig,
    state: AgentState,
    registry: HandlerRegistry,
    strategy: Option<Arc<dyn BiddingStrategy>>,
    callbacks: Arc<dyn Callbacks>,
    matcher: Option<Arc<dyn MatcherClient>>,
    validator: Option<Arc<dyn ValidatorTransport>>,
    resolved: Option<ResolvedConfig>,
    shutdown: CancellationToken,
    running: Option<Running>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            state: AgentState::Created,
            registry: HandlerRegistry::new(),
            strategy: None,
            callbacks: Arc::new(NoopCallbacks),
            matcher: None,
            validator: None,
            resolved: None,
            shutdown: CancellationToken::new(),
            running: None,
        }
    }

    /// Use `matcher` instead of an HTTP client built from the config.
    pub fn with_matcher(mut self, matcher: Arc<dyn MatcherClient>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Use `validator` instead of an HTTP client built from the config.
    pub fn with_validator(mut self, validator: Arc<dyn ValidatorTransport>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// The agent-wide cancellation token. Cancelling it makes `run_until`
    /// stop the agent.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Route intent types matching `pattern` (exact or glob) to `handler`.
    pub fn register_handler(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<()> {
        self.ensure_registrations_open("register_handler")?;
        self.registry.register(pattern, handler)
    }

    /// Handler for intent types no pattern matches.
    pub fn register_default_handler(&mut self, handler: Arc<dyn Handler>) -> Result<()> {
        self.ensure_registrations_open("register_default_handler")?;
        self.registry.set_default(handler);
        Ok(())
    }

    pub fn register_bidding_strategy(&mut self, strategy: Arc<dyn BiddingStrategy>) -> Result<()> {
        self.ensure_registrations_open("register_bidding_strategy")?;
        self.strategy = Some(strategy);
        Ok(())
    }

    pub fn register_callbacks(&mut self, callbacks: Arc<dyn Callbacks>) -> Result<()> {
        self.ensure_registrations_open("register_callbacks")?;
        self.callbacks = callbacks;
        Ok(())
    }

    /// Check registrations and resolve the configuration.
    ///
    /// `CREATED → CONFIGURED`. Also accepted in `CONFIGURED`, where it
    /// re-validates. Never touches the network.
    pub fn configure(&mut self) -> Result<()> {
        if !self.state.accepts_registrations() {
            return Err(AgentError::IllegalState(format!(
                "configure() called in state {}",
                self.state
            )));
        }

        let mut missing = Vec::new();
        if self.registry.is_empty() {
            missing.push("at least one task handler must be registered");
        }
        if self.strategy.is_none() {
            missing.push("a bidding strategy must be registered");
        }
        if !missing.is_empty() {
            return Err(AgentError::Configuration(missing.join("; ")));
        }

        let resolved = self.config.resolve()?;
        info!(
            agent_id = %resolved.identity.agent_id,
            subnet_id = %resolved.identity.subnet_id,
            capabilities = ?resolved.identity.capabilities,
            "agent configured"
        );
        self.resolved = Some(resolved);
        self.state = AgentState::Configured;
        Ok(())
    }

    /// Connect to the matcher and begin consuming intents.
    ///
    /// If the matcher connection fails the agent stays `CONFIGURED` and
    /// `start()` may be retried.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == AgentState::Created {
            self.configure()?;
        }
        if self.state != AgentState::Configured {
            return Err(AgentError::IllegalState(format!(
                "start() called in state {}; expected {}",
                self.state,
                AgentState::Configured
            )));
        }
        let (Some(resolved), Some(strategy)) = (self.resolved.clone(), self.strategy.clone())
        else {
            return Err(AgentError::IllegalState(
                "agent is CONFIGURED without a resolved configuration".to_string(),
            ));
        };

        let identity = &resolved.identity;
        let runtime = &resolved.runtime;

        let matcher: Arc<dyn MatcherClient> = match &self.matcher {
            Some(matcher) => Arc::clone(matcher),
            None => Arc::new(HttpMatcherClient::new(
                identity.matcher_url.clone(),
                identity.agent_id.clone(),
                runtime.request_timeout(),
            )?),
        };
        let validator: Arc<dyn ValidatorTransport> = match &self.validator {
            Some(validator) => Arc::clone(validator),
            None => Arc::new(HttpValidatorClient::new(
                identity.validator_url.clone(),
                runtime.request_timeout(),
            )?),
        };

        matcher
            .connect(&AgentRegistration {
                agent_id: identity.agent_id.clone(),
                subnet_id: identity.subnet_id.clone(),
                chain_address: identity.chain_address.clone(),
                capabilities: identity.capabilities.clone(),
                intent_types: identity.intent_types.clone(),
                public_key: resolved.signing.public_key_hex(),
            })
            .await?;

        let mut submitter = ExecutionReportSubmitter::new(
            validator,
            resolved.signing.clone(),
            RetryPolicy::from_config(&runtime.retry),
        );
        if let Some(path) = &runtime.undelivered_journal {
            submitter = submitter.with_journal(UndeliveredJournal::new(path));
        }
        let submitter = Arc::new(submitter);

        let dispatcher = TaskDispatcher::new(
            std::mem::take(&mut self.registry),
            runtime.task_timeout(),
            runtime.cancel_grace(),
        );
        let runner = Arc::new(TaskRunner::new(
            identity.agent_id.clone(),
            dispatcher,
            Arc::clone(&matcher),
            Arc::clone(&submitter),
            Arc::clone(&self.callbacks),
        ));

        let tasks = self.shutdown.child_token();
        let pool = WorkerPool::spawn(
            runtime.max_concurrent_tasks,
            runtime.queue_depth,
            Arc::clone(&runner),
            tasks.clone(),
        );
        let Some(queue) = pool.queue() else {
            return Err(AgentError::IllegalState(
                "worker pool closed before start".to_string(),
            ));
        };

        let intake_stop = self.shutdown.child_token();
        let intake = Intake {
            matcher: Arc::clone(&matcher),
            strategy,
            callbacks: Arc::clone(&self.callbacks),
            queue,
            runner: Arc::clone(&runner),
            poll_interval: runtime.poll_interval(),
        };
        let intake = tokio::spawn(intake.run(intake_stop.clone()));

        self.running = Some(Running {
            intake_stop,
            intake,
            tasks,
            pool,
            runner,
            matcher,
            submitter,
            shutdown_grace: runtime.shutdown_grace(),
            report_window: runtime.cancel_grace() + runtime.request_timeout(),
        });
        self.state = AgentState::Running;
        info!(
            agent_id = %identity.agent_id,
            workers = runtime.max_concurrent_tasks,
            queue_depth = runtime.queue_depth,
            "agent running"
        );
        Ok(())
    }

    /// Stop consuming intents, drain in-flight work, and close connections.
    ///
    /// Workers get `shutdown_grace` to finish what they hold and what is
    /// queued. After that in-flight tasks are cancelled and anything still
    /// queued is reported `CANCELLED`. Those reports get `cancel_grace` plus
    /// one request timeout; whatever is still undelivered then goes to the
    /// journal and is counted as unreported.
    pub async fn stop(&mut self) -> Result<ShutdownSummary> {
        if self.state != AgentState::Running {
            return Err(AgentError::IllegalState(format!(
                "stop() called in state {}; expected {}",
                self.state,
                AgentState::Running
            )));
        }
        let Some(mut running) = self.running.take() else {
            return Err(AgentError::IllegalState(
                "agent is RUNNING without runtime state".to_string(),
            ));
        };
        self.state = AgentState::Stopping;
        info!("stopping agent");

        running.intake_stop.cancel();
        if let Err(e) = running.intake.await {
            warn!(error = %e, "intake loop terminated abnormally");
        }

        running.pool.close();
        let mut cutoff = None;
        if !running.pool.join(running.shutdown_grace).await {
            warn!(
                grace_secs = running.shutdown_grace.as_secs(),
                "shutdown grace elapsed; cancelling in-flight tasks"
            );
            running.tasks.cancel();
            let runner = Arc::clone(&running.runner);
            let window = running.report_window;
            cutoff = Some(tokio::spawn(async move {
                tokio::time::sleep(window).await;
                warn!(
                    window_ms = window.as_millis() as u64,
                    "reporting window elapsed; journaling pending reports"
                );
                runner.cut_off();
            }));
            running.pool.join_all().await;
        }

        let leftover = running.pool.drain().await;
        if !leftover.is_empty() {
            info!(count = leftover.len(), "cancelling queued assignments");
        }
        for assignment in leftover {
            running.runner.cancel_queued(assignment).await;
        }
        if let Some(cutoff) = cutoff {
            cutoff.abort();
        }

        running.matcher.close().await;
        running.submitter.transport().close().await;
        self.shutdown.cancel();
        self.state = AgentState::Stopped;

        let summary = running.runner.summary();
        info!(
            completed = summary.completed,
            cancelled = summary.cancelled,
            rejected = summary.rejected,
            unreported = summary.unreported,
            "agent stopped"
        );
        Ok(summary)
    }

    /// Start, run until `signal` resolves or the shutdown token is
    /// cancelled, then stop.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<ShutdownSummary>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = signal => info!("termination signal received"),
            _ = shutdown.cancelled() => info!("shutdown requested"),
        }
        self.stop().await
    }

    fn ensure_registrations_open(&self, operation: &str) -> Result<()> {
        if self.state.accepts_registrations() {
            Ok(())
        } else {
            Err(AgentError::IllegalState(format!(
                "{}() called in state {}",
                operation, self.state
            )))
        }
    }
}
