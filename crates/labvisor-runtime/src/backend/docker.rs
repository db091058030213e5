//! Docker CLI implementation of the container runtime.

use std::time::Duration;

use labvisor_common::error::{LabError, Result};

use super::{CommitSpec, ContainerRuntime, RunSpec};
use crate::cancel::CancelToken;
use crate::command::{CommandOutput, CommandRunner};
use crate::exec::{ExecOutput, shell_argv};

/// Runtime that drives the `docker` command-line client out of process.
#[derive(Debug, Clone)]
pub struct DockerCli {
    runner: CommandRunner,
}

impl DockerCli {
    /// Creates a client invoking `binary` with a deadline per command.
    #[must_use]
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner: CommandRunner::new(binary, timeout),
        }
    }

    /// Runs a docker subcommand and turns a non-zero exit into
    /// [`LabError::Runtime`] carrying the captured output.
    fn invoke(
        &self,
        operation: &'static str,
        target: &str,
        args: Vec<String>,
        cancel: &CancelToken,
    ) -> Result<CommandOutput> {
        let out = self.runner.run(operation, target, &args, cancel)?;
        if out.success() {
            return Ok(out);
        }
        tracing::error!(
            operation,
            target,
            exit_code = ?out.exit_code,
            output = %out.trimmed(),
            "container engine command failed"
        );
        Err(LabError::Runtime {
            operation,
            target: target.to_string(),
            exit_code: out.exit_code,
            output: out.trimmed().to_string(),
        })
    }
}

impl ContainerRuntime for DockerCli {
    fn run(&self, spec: &RunSpec, cancel: &CancelToken) -> Result<String> {
        let out = self.invoke("run", &spec.name, run_args(spec), cancel)?;
        Ok(out.trimmed().to_string())
    }

    fn start(&self, name: &str, cancel: &CancelToken) -> Result<String> {
        let out = self.invoke("start", name, strings(&["start", name]), cancel)?;
        Ok(out.trimmed().to_string())
    }

    fn stop(&self, reference: &str, cancel: &CancelToken) -> Result<()> {
        let _ = self.invoke("stop", reference, strings(&["stop", reference]), cancel)?;
        Ok(())
    }

    fn remove(&self, reference: &str, cancel: &CancelToken) -> Result<()> {
        let _ = self.invoke("remove", reference, strings(&["rm", reference]), cancel)?;
        Ok(())
    }

    fn commit(&self, spec: &CommitSpec, cancel: &CancelToken) -> Result<()> {
        let _ = self.invoke("commit", &spec.source, commit_args(spec), cancel)?;
        Ok(())
    }

    fn is_running(&self, name: &str, cancel: &CancelToken) -> Result<bool> {
        let args = strings(&["inspect", "--format", "{{.State.Running}}", name]);
        let out = self.invoke("inspect", name, args, cancel)?;
        Ok(out.trimmed() == "true")
    }

    fn published_port(
        &self,
        name: &str,
        container_port: u16,
        cancel: &CancelToken,
    ) -> Result<Option<u16>> {
        let args = vec!["port".to_string(), name.to_string(), format!("{container_port}/tcp")];
        let out = self.invoke("port", name, args, cancel)?;
        Ok(parse_port_output(&out.output))
    }

    fn list_images(&self, pattern: &str, cancel: &CancelToken) -> Result<Vec<String>> {
        let out = self.invoke("images", pattern, list_images_args(pattern), cancel)?;
        Ok(parse_image_ids(&out.output))
    }

    fn remove_image(&self, image_id: &str, force: bool, cancel: &CancelToken) -> Result<()> {
        let mut args = vec!["rmi".to_string()];
        if force {
            args.push("-f".to_string());
        }
        args.push(image_id.to_string());
        let _ = self.invoke("rmi", image_id, args, cancel)?;
        Ok(())
    }

    fn exec(
        &self,
        reference: &str,
        shell_command: &str,
        cancel: &CancelToken,
    ) -> Result<ExecOutput> {
        let mut args = strings(&["exec", reference]);
        args.extend(shell_argv(shell_command));
        let out = self.runner.run("exec", reference, &args, cancel)?;
        Ok(ExecOutput {
            output: out.trimmed().to_string(),
            exit_code: out.exit_code,
        })
    }

    fn is_available(&self) -> bool {
        which::which(self.runner.program()).is_ok()
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| (*a).to_string()).collect()
}

/// Builds `docker run -dit --name <name> -p <host>:<container> <image> [args...]`.
#[must_use]
pub fn run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = strings(&["run", "-dit", "--name", &spec.name, "-p"]);
    args.push(format!("{}:{}", spec.host_port, spec.container_port));
    args.push(spec.image.clone());
    args.extend(spec.extra_args.iter().cloned());
    args
}

/// Builds `docker commit -a <author> -m <message> <source> <target>`.
#[must_use]
pub fn commit_args(spec: &CommitSpec) -> Vec<String> {
    strings(&[
        "commit",
        "-a",
        &spec.author,
        "-m",
        &spec.message,
        &spec.source,
        &spec.target,
    ])
}

/// Builds the image listing command filtered by a reference glob.
#[must_use]
pub fn list_images_args(pattern: &str) -> Vec<String> {
    vec![
        "images".to_string(),
        "-q".to_string(),
        "--filter".to_string(),
        format!("reference={pattern}"),
    ]
}

/// Extracts unique image IDs from `docker images -q` output.
#[must_use]
pub fn parse_image_ids(output: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Extracts the host port from `docker port` output such as
/// `0.0.0.0:49153` followed by `[::]:49153`.
#[must_use]
pub fn parse_port_output(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
}
