//! Command execution: the shell executor and the retrying runner used by serial
//! dispatch and by every queue worker.

use log::{debug, warn};
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::budget::FailureBudget;
use crate::engine::cancel::CancelToken;
use crate::error::CommandError;

/// Signals that count as a user interrupt when they terminate a child command.
#[cfg(unix)]
const INTERRUPT_SIGNALS: [i32; 4] = [libc::SIGHUP, libc::SIGINT, libc::SIGQUIT, libc::SIGTERM];
#[cfg(not(unix))]
const INTERRUPT_SIGNALS: [i32; 0] = [];

/// How a command ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Exited(i32),
    Signaled(i32),
}

impl CommandStatus {
    pub fn success(self) -> bool {
        matches!(self, CommandStatus::Exited(0))
    }

    /// Terminated by HUP, INT, QUIT or TERM. Always fatal, force does not apply.
    pub fn is_interrupt(self) -> bool {
        matches!(self, CommandStatus::Signaled(sig) if INTERRUPT_SIGNALS.contains(&sig))
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Exited(code) => write!(f, "{}", code),
            CommandStatus::Signaled(sig) => write!(f, "signal {}", sig),
        }
    }
}

impl From<ExitStatus> for CommandStatus {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return CommandStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return CommandStatus::Signaled(sig);
            }
        }
        CommandStatus::Exited(-1)
    }
}

/// Spawns one rendered command and waits for it.
pub trait CommandExecutor: Send + Sync {
    fn run_shell(&self, command: &OsStr) -> io::Result<CommandStatus>;
}

/// Runs commands through `sh -c` (or `cmd /C` on Windows).
#[derive(Clone, Debug)]
pub struct ShellExecutor {
    shell: PathBuf,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        #[cfg(windows)]
        let shell = PathBuf::from("cmd");
        #[cfg(not(windows))]
        let shell = PathBuf::from("/bin/sh");
        Self { shell }
    }
}

impl CommandExecutor for ShellExecutor {
    fn run_shell(&self, command: &OsStr) -> io::Result<CommandStatus> {
        let flag = if cfg!(windows) { "/C" } else { "-c" };
        let status = Command::new(&self.shell).arg(flag).arg(command).status()?;
        Ok(status.into())
    }
}

/// Bounded retry within one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-attempts after the first failure.
    pub retries: u32,
    /// Pause before each re-attempt.
    pub delay: Duration,
}

/// Final status of one command and how many re-attempts it took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitOutcome {
    pub status: CommandStatus,
    pub retried: u32,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs rendered commands under the run's failure policy (retry, force, budget).
///
/// Shared by reference with queue workers: it holds no per-command state, and the
/// budget is the same `Arc` for every caller.
pub struct RetryableRunner {
    executor: Arc<dyn CommandExecutor>,
    retry: Option<RetryPolicy>,
    force: bool,
    budget: Arc<FailureBudget>,
    cancel: CancelToken,
}

impl RetryableRunner {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        retry: Option<RetryPolicy>,
        force: bool,
        budget: Arc<FailureBudget>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            executor,
            retry,
            force,
            budget,
            cancel,
        }
    }

    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry
    }

    pub fn budget(&self) -> &Arc<FailureBudget> {
        &self.budget
    }

    fn attempt(&self, command: &OsStr) -> Result<CommandStatus, CommandError> {
        let status = self
            .executor
            .run_shell(command)
            .map_err(|source| CommandError::Spawn {
                command: shown(command),
                source,
            })?;
        if let CommandStatus::Signaled(signal) = status
            && status.is_interrupt()
        {
            return Err(CommandError::Interrupted {
                command: shown(command),
                signal,
            });
        }
        Ok(status)
    }

    /// Run `command` once, or under the retry policy when one is set.
    ///
    /// Every failed attempt that is followed by another attempt takes one unit from the
    /// failure budget; the last attempt never does. A command still failing after all
    /// retries is logged and its status returned, it is not an error here.
    pub fn run(&self, command: impl AsRef<OsStr>) -> Result<ExitOutcome, CommandError> {
        let command = command.as_ref();
        if self.cancel.is_cancelled() {
            return Err(CommandError::Interrupted {
                command: shown(command),
                signal: libc::SIGINT,
            });
        }
        debug!("Running command '{}'", command.display());
        let mut status = self.attempt(command)?;
        let Some(policy) = self.retry else {
            return Ok(ExitOutcome { status, retried: 0 });
        };

        let mut retried = 0;
        while !status.success() && retried < policy.retries {
            let left = self.budget.consume(&shown(command))?;
            warn!(
                "Error {} retrying '{}' ({} retry failures left)",
                status,
                command.display(),
                left
            );
            if self.cancel.sleep(policy.delay) {
                return Err(CommandError::Interrupted {
                    command: shown(command),
                    signal: libc::SIGINT,
                });
            }
            status = self.attempt(command)?;
            retried += 1;
        }
        if !status.success() {
            warn!(
                "Command '{}' still failing after {} retries",
                command.display(),
                retried
            );
        }
        Ok(ExitOutcome { status, retried })
    }

    /// [`run`](Self::run), then apply force: without retry or force a nonzero status is fatal.
    pub fn run_checked(&self, command: impl AsRef<OsStr>) -> Result<ExitOutcome, CommandError> {
        let command = command.as_ref();
        let outcome = self.run(command)?;
        if outcome.success() || self.retry.is_some() {
            return Ok(outcome);
        }
        if self.force {
            warn!("Error {} for '{}'", outcome.status, command.display());
            return Ok(outcome);
        }
        Err(match outcome.status {
            CommandStatus::Exited(code) => CommandError::Failed {
                command: shown(command),
                code,
            },
            CommandStatus::Signaled(signal) => CommandError::Signaled {
                command: shown(command),
                signal,
            },
        })
    }
}

/// Command text for error messages.
fn shown(command: &OsStr) -> String {
    command.to_string_lossy().into_owned()
}
