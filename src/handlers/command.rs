//! Subprocess-backed handler.
//!
//! Runs an external command once per task. The task payload is written to the
//! child's stdin and its stdout becomes the result data; a non-zero exit is a
//! failed result carrying the tail of stderr. The child is killed when the
//! task is cancelled.

use super::template::{TemplateError, render_template};
use crate::dispatch::{Handler, TaskContext};
use crate::error::{AgentError, Result};
use crate::protocol::{Task, TaskResult};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::debug;

/// Variables available to command templates.
pub const TEMPLATE_VARIABLES: [&str; 4] = ["task_id", "assignment_id", "intent_id", "intent_type"];

/// Maximum stderr characters quoted in a failure message.
const STDERR_TAIL_CHARS: usize = 512;

/// Handler that delegates each task to an external command.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    template: String,
    words: Vec<String>,
    environment: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandHandler {
    /// Parse and check a command template such as `analyse --task {task_id}`.
    ///
    /// The template is split into words before substitution, so values that
    /// contain spaces stay a single argument.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let words = shell_words::split(&template).map_err(|e| {
            AgentError::Configuration(format!(
                "failed to parse handler command '{}': {}\n\
                 Fix: check for unmatched quotes or invalid escape sequences.",
                template, e
            ))
        })?;

        if words.is_empty() {
            return Err(AgentError::Configuration(
                "handler command is empty".to_string(),
            ));
        }

        let sample: HashMap<&str, String> = TEMPLATE_VARIABLES
            .iter()
            .map(|name| (*name, String::new()))
            .collect();
        for word in &words {
            render_template(word, &sample).map_err(|e| template_error(&template, e))?;
        }

        Ok(Self {
            template,
            words,
            environment: BTreeMap::new(),
            working_dir: None,
        })
    }

    /// Extra environment variable for the child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn argv(&self, task: &Task, ctx: &TaskContext) -> Result<Vec<String>> {
        let variables: HashMap<&str, String> = HashMap::from([
            ("task_id", task.id.clone()),
            ("assignment_id", task.assignment_id.clone()),
            ("intent_id", ctx.intent_id.clone()),
            ("intent_type", ctx.intent_type.clone()),
        ]);

        self.words
            .iter()
            .map(|word| {
                render_template(word, &variables).map_err(|e| template_error(&self.template, e))
            })
            .collect()
    }
}

#[async_trait]
impl Handler for CommandHandler {
    async fn execute(&self, task: Task, ctx: TaskContext) -> anyhow::Result<TaskResult> {
        let argv = self.argv(&task, &ctx)?;
        let program = &argv[0];

        let mut command = Command::new(program);
        command
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.environment {
            command.env(key, value);
        }

        debug!(task_id = %task.id, program = %program, "spawning handler command");
        let child = command.spawn().with_context(|| {
            format!(
                "failed to execute handler command '{}'; ensure it is installed and in PATH",
                program
            )
        })?;

        // Dropping the collection future drops the child, which kills it.
        let output = tokio::select! {
            output = collect(child, task.data) => output
                .with_context(|| format!("handler command '{}' failed", program))?,
            _ = ctx.cancelled() => {
                anyhow::bail!("handler command '{}' was killed on cancellation", program);
            }
        };

        if output.status.success() {
            return Ok(TaskResult::success(output.stdout));
        }

        let exit = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "a signal".to_string(),
        };
        let stderr = stderr_tail(&output.stderr);
        let message = if stderr.is_empty() {
            format!("handler command '{}' terminated with {}", program, exit)
        } else {
            format!(
                "handler command '{}' terminated with {}: {}",
                program, exit, stderr
            )
        };
        Ok(TaskResult::failure_with_data(output.stdout, message))
    }
}

/// Feed `input` to the child's stdin and wait for it to exit.
async fn collect(mut child: Child, input: Vec<u8>) -> io::Result<Output> {
    let stdin = child.stdin.take();
    let feed = async move {
        let Some(mut stdin) = stdin else {
            return Ok(());
        };
        match stdin.write_all(&input).await {
            // The command may exit without reading its input.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    fed?;
    output
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        text.to_string()
    } else {
        let tail: String = text.chars().skip(count - STDERR_TAIL_CHARS).collect();
        format!("...{}", tail)
    }
}

fn template_error(template: &str, e: TemplateError) -> AgentError {
    match e {
        TemplateError::UndefinedVariable { name, .. } => AgentError::Configuration(format!(
            "handler command references undefined variable '{}'\n\
             Command: {}\n\
             Available variables: {}",
            name,
            template,
            TEMPLATE_VARIABLES.join(", ")
        )),
        other => AgentError::Configuration(format!(
            "invalid handler command '{}': {}",
            template, other
        )),
    }
}
