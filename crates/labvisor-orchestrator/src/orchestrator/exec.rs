//! Command execution inside lab containers.

use labvisor_common::error::{LabError, Result};
use labvisor_common::types::LabId;
use labvisor_runtime::CancelToken;
use labvisor_runtime::exec::shell_command;

use super::LabOrchestrator;

impl LabOrchestrator {
    /// Runs `argv` through the container shell and returns its trimmed
    /// combined output.
    ///
    /// The arguments are joined with spaces and passed to `sh -c` as one
    /// command line.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` with the same output when the command exits
    /// non-zero, or the engine failure.
    pub fn execute_command(
        &self,
        container: &str,
        argv: &[String],
        cancel: &CancelToken,
    ) -> Result<String> {
        let _guard = self.gate.container(container, cancel)?;
        self.exec_unlocked(container, argv, cancel)
    }

    /// Runs `argv` in the container of a lab.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown lab, `NoContainer` if it was never
    /// launched, or any [`Self::execute_command`] failure.
    pub fn execute_in_lab(&self, id: LabId, argv: &[String], cancel: &CancelToken) -> Result<String> {
        let _lab_guard = self.gate.lab(id, cancel)?;
        let lab = self.labs.get(id)?;
        if !lab.has_container() {
            return Err(LabError::NoContainer { lab_id: id.get() });
        }
        let _container_guard = self.gate.container(lab.container_name.as_str(), cancel)?;
        self.exec_unlocked(lab.container_name.as_str(), argv, cancel)
    }

    fn exec_unlocked(&self, container: &str, argv: &[String], cancel: &CancelToken) -> Result<String> {
        let command = shell_command(argv);
        tracing::debug!(container = %container, command = %command, "executing command in container");

        let out = self.runtime.exec(container, &command, cancel).inspect_err(|e| {
            tracing::error!(container = %container, error = %e, "failed to execute command");
        })?;
        let output = out.output.trim().to_string();
        if !out.success() {
            tracing::warn!(container = %container, exit_code = ?out.exit_code, "command exited unsuccessfully");
            return Err(LabError::CommandFailed {
                container: container.to_string(),
                exit_code: out.exit_code,
                output,
            });
        }
        Ok(output)
    }
}
