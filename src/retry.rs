//! Bounded retry for network-touching commands.
//!
//! Clones, fetches, pulls and remote listings against hosted repositories
//! fail transiently often enough that a long multi-repository run must not
//! stop on the first hiccup. Every such command goes through `RetryRunner`,
//! which retries with a fixed delay up to a bounded number of attempts and
//! then escalates the last failure.
//!
//! Waiting goes through the `Sleeper` trait so tests can observe delays
//! without sleeping, and so a fatal error raised by another worker can cut a
//! pending wait short through the shared `CancellationFlag`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{Error, Result};

/// Granularity at which `ThreadSleeper` checks for cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Retry budget for network operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay between two attempts, in seconds.
    pub delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 11,
            delay_secs: 10,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Run-wide "a fatal error happened" flag.
///
/// This is the only mutable state shared between repository workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Trait for waiting between attempts - allows mocking in tests
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`. Returns `false` if the wait was interrupted by
    /// cancellation.
    fn sleep(&self, duration: Duration, cancel: &CancellationFlag) -> bool;
}

/// Blocks the calling thread only; other workers keep running.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancellationFlag) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_POLL_INTERVAL));
        }
    }
}

/// Executes commands, retrying failed network operations.
#[derive(Clone)]
pub struct RetryRunner {
    runner: Arc<dyn CommandRunner>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    cancel: CancellationFlag,
}

impl RetryRunner {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            runner,
            sleeper,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Runs a local command once.
    ///
    /// With `fail_on_error`, a non-zero exit becomes `Error::CommandFailed`;
    /// otherwise the output is returned whatever the exit code.
    pub fn run(&self, spec: &CommandSpec, fail_on_error: bool) -> Result<CommandOutput> {
        self.ensure_not_cancelled(spec)?;
        let output = self.runner.run(spec)?;
        if fail_on_error {
            output.check(spec, 1)
        } else {
            Ok(output)
        }
    }

    /// Runs a network command, retrying on non-zero exit.
    ///
    /// The command is attempted at most `policy.max_attempts` times with
    /// `policy.delay` between attempts. The last attempt fails loud: its
    /// output is logged at error level and, with `fail_on_error`, returned as
    /// `Error::CommandFailed` carrying the command's exit code.
    pub fn run_with_retry(&self, spec: &CommandSpec, fail_on_error: bool) -> Result<CommandOutput> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            self.ensure_not_cancelled(spec)?;
            attempt += 1;
            let output = self.runner.run(spec)?;
            if output.is_success() {
                if attempt > 1 {
                    info!("'{}' succeeded after {} attempt(s)", spec, attempt);
                }
                return Ok(output);
            }

            if attempt >= max_attempts {
                error!(
                    "'{}' failed after {} attempt(s) with exit code {}",
                    spec, attempt, output.code
                );
                for line in output.lines() {
                    error!("  {}", line);
                }
                return if fail_on_error {
                    output.check(spec, attempt)
                } else {
                    Ok(output)
                };
            }

            warn!(
                "'{}' failed with exit code {} (attempt {}/{}), retrying in {}s",
                spec, output.code, attempt, max_attempts, self.policy.delay_secs
            );
            if !self.sleeper.sleep(self.policy.delay(), &self.cancel) {
                return Err(Error::Cancelled {
                    context: format!("retry of '{}' interrupted", spec),
                });
            }
        }
    }

    fn ensure_not_cancelled(&self, spec: &CommandSpec) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled {
                context: format!("'{}' not started", spec),
            })
        } else {
            Ok(())
        }
    }
}
