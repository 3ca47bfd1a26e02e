//! Agent lifecycle.
//!
//! `Agent` owns the registrations and drives the state machine. While
//! running, one intake loop polls the matcher and feeds a bounded
//! `WorkerPool`; each worker pushes assignments through a `TaskRunner`.
//!
//! # Shutdown
//!
//! 1. The intake loop stops and waits for its bid decisions.
//! 2. The pool queue closes; workers finish what is queued within the grace
//!    period.
//! 3. In-flight tasks are cancelled; queued leftovers are reported
//!    `CANCELLED`.
//! 4. Matcher and validator clients are closed.

mod agent;
mod callbacks;
mod intake;
mod pool;
mod runner;
mod state;


pub use agent::Agent;
pub use callbacks::{Callbacks, NoopCallbacks};
pub use runner::ShutdownSummary;
pub use state::AgentState;
