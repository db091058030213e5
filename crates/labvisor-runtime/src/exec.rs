//! Shell command execution inside running containers.

use labvisor_common::constants::CONTAINER_SHELL;

/// Output from an exec command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Combined stdout and stderr, trimmed of surrounding whitespace.
    pub output: String,
    /// Exit code returned by the command, `None` if it was killed.
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    /// Returns `true` if the command exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Joins `argv` into a single command line for the container shell.
///
/// Arguments are joined with single spaces and are not quoted, so pipes
/// and redirections in the submitted text reach the shell unchanged.
#[must_use]
pub fn shell_command(argv: &[String]) -> String {
    argv.join(" ")
}

/// Builds the in-container argument vector `sh -c <command>`.
#[must_use]
pub fn shell_argv(command: &str) -> [String; 3] {
    [
        CONTAINER_SHELL.to_string(),
        "-c".to_string(),
        command.to_string(),
    ]
}
