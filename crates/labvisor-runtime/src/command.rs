//! Out-of-process command execution with combined output capture.
//!
//! The child's stdout and stderr are drained on reader threads into one
//! buffer, in arrival order, while the calling thread polls for exit and
//! enforces cancellation and the per-command deadline.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use labvisor_common::error::{LabError, Result};

use crate::cancel::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Interleaved stdout and stderr.
    pub output: String,
    /// Exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Returns `true` if the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns the output without surrounding whitespace.
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.output.trim()
    }
}

/// Runs one program with a fixed deadline per invocation.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    timeout: Duration,
}

impl CommandRunner {
    /// Creates a runner for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Returns the program this runner invokes.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs the program with `args` and waits for it to exit.
    ///
    /// `operation` and `target` only label errors and log lines. A non-zero
    /// exit is returned as a normal [`CommandOutput`]; interpreting it is up
    /// to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Spawn`] if the program cannot be started,
    /// [`LabError::Cancelled`] if `cancel` fires, and [`LabError::TimedOut`]
    /// if the deadline elapses. The child is killed in the last two cases.
    pub fn run(
        &self,
        operation: &'static str,
        target: &str,
        args: &[String],
        cancel: &CancelToken,
    ) -> Result<CommandOutput> {
        if cancel.is_cancelled() {
            return Err(LabError::Cancelled {
                operation,
                target: target.to_string(),
            });
        }

        tracing::debug!(program = %self.program, ?args, operation, "invoking command");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LabError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let buffer = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(drain(stdout, Arc::clone(&buffer)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(drain(stderr, Arc::clone(&buffer)));
        }

        let start = Instant::now();
        let outcome = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status.code()),
                Ok(None) => {}
                Err(source) => {
                    kill(&mut child);
                    break Err(LabError::Spawn {
                        program: self.program.clone(),
                        source,
                    });
                }
            }

            if cancel.is_cancelled() {
                kill(&mut child);
                tracing::warn!(operation, target, "command cancelled, child killed");
                break Err(LabError::Cancelled {
                    operation,
                    target: target.to_string(),
                });
            }

            if start.elapsed() > self.timeout {
                kill(&mut child);
                tracing::warn!(operation, target, timeout_secs = self.timeout.as_secs(), "command timed out, child killed");
                break Err(LabError::TimedOut {
                    operation,
                    target: target.to_string(),
                    timeout: self.timeout,
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        };

        for reader in readers {
            let _ = reader.join();
        }

        let exit_code = outcome?;
        let output = buffer
            .lock()
            .map(|mut b| std::mem::take(&mut *b))
            .unwrap_or_default();

        tracing::debug!(operation, target, ?exit_code, elapsed_ms = start.elapsed().as_millis(), "command finished");
        Ok(CommandOutput { output, exit_code })
    }
}

fn drain<R>(stream: R, buffer: Arc<Mutex<String>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut chunk = Vec::new();
        loop {
            chunk.clear();
            match reader.read_until(b'\n', &mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push_str(&String::from_utf8_lossy(&chunk));
                    }
                }
            }
        }
    })
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn captures_stdout_and_stderr_together() {
        let runner = CommandRunner::new("sh", Duration::from_secs(5));
        let out = runner
            .run("test", "sh", &sh("echo out; echo err 1>&2"), &CancelToken::new())
            .unwrap();
        assert!(out.success());
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[test]
    fn non_zero_exit_is_reported_not_raised() {
        let runner = CommandRunner::new("sh", Duration::from_secs(5));
        let out = runner
            .run("test", "sh", &sh("echo boom; exit 3"), &CancelToken::new())
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.trimmed(), "boom");
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let runner = CommandRunner::new("labvisor-no-such-binary", Duration::from_secs(1));
        let err = runner
            .run("test", "x", &[], &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, LabError::Spawn { .. }));
    }

    #[test]
    fn deadline_kills_the_child() {
        let runner = CommandRunner::new("sh", Duration::from_millis(100));
        let started = Instant::now();
        let err = runner
            .run("test", "sleeper", &sh("exec sleep 5"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, LabError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let runner = CommandRunner::new("sh", Duration::from_secs(5));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = runner.run("test", "x", &sh("true"), &cancel).unwrap_err();
        assert!(matches!(err, LabError::Cancelled { .. }));
    }

    #[test]
    fn cancellation_while_running_kills_the_child() {
        let runner = CommandRunner::new("sh", Duration::from_secs(10));
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });
        let started = Instant::now();
        let err = runner.run("test", "x", &sh("exec sleep 5"), &cancel).unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, LabError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
