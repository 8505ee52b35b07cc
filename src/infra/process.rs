//! External process execution
//!
//! Runs build tools and custom scripts with a controlled environment,
//! captured output, an optional timeout and cooperative cancellation.
//! Every invocation gets a fresh environment assembled by the caller;
//! nothing leaks from one module's build into the next.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::config::defaults;

/// Shared cancellation flag polled by running subprocesses
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// A fresh, unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn set(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// One external command to run
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments in order
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Complete environment; the child inherits nothing else
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Build a spec for a program run in a directory
    pub fn new(program: &str, cwd: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Extend the environment
    #[must_use]
    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// Command line rendered for log messages
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Process exited with this status code
    Exited(i32),
    /// Process was killed after exceeding the timeout
    TimedOut,
    /// Process was killed because cancellation was requested
    Cancelled,
}

/// Captured result of one invocation
#[derive(Debug)]
pub struct CommandOutput {
    /// How the invocation ended
    pub outcome: RunOutcome,
    /// Combined stdout and stderr
    pub output: String,
    /// Wall-clock time spent
    pub duration: Duration,
}

impl CommandOutput {
    /// Whether the process exited zero
    pub fn success(&self) -> bool {
        self.outcome == RunOutcome::Exited(0)
    }

    /// Last part of the captured output, bounded for report storage
    pub fn tail(&self) -> &str {
        let bytes = self.output.as_bytes();
        if bytes.len() <= defaults::OUTPUT_TAIL_BYTES {
            return &self.output;
        }
        let mut start = bytes.len() - defaults::OUTPUT_TAIL_BYTES;
        while start < bytes.len() && !self.output.is_char_boundary(start) {
            start += 1;
        }
        &self.output[start..]
    }
}

/// Run a command to completion.
///
/// The child gets exactly the environment in the spec, nothing
/// inherited. While the child runs the cancel flag is polled every
/// 100ms; a set flag or an elapsed timeout kills the process and
/// reports the corresponding outcome instead of an exit status.
pub async fn run(
    spec: &CommandSpec,
    timeout: Option<Duration>,
    cancel: &CancelFlag,
) -> std::io::Result<CommandOutput> {
    let start = Instant::now();

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .env_clear()
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let out_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stdout.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });
    let err_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stderr.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });

    let poll = Duration::from_millis(defaults::CANCEL_POLL_MS);
    let outcome = loop {
        if cancel.is_set() {
            let _ = child.start_kill();
            let _ = child.wait().await;
            break RunOutcome::Cancelled;
        }
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                let _ = child.start_kill();
                let _ = child.wait().await;
                break RunOutcome::TimedOut;
            }
        }
        match tokio::time::timeout(poll, child.wait()).await {
            Ok(status) => break RunOutcome::Exited(status?.code().unwrap_or(-1)),
            Err(_) => continue,
        }
    };

    let mut output = out_task.await.unwrap_or_default();
    let err_output = err_task.await.unwrap_or_default();
    if !err_output.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&err_output);
    }

    Ok(CommandOutput {
        outcome,
        output,
        duration: start.elapsed(),
    })
}
