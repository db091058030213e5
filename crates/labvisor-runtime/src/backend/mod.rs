//! Container runtime abstraction.
//!
//! The orchestrator only talks to a [`ContainerRuntime`], so engine
//! specifics stay in the implementations and tests can substitute a fake.

pub mod docker;

use labvisor_common::error::Result;

use crate::cancel::CancelToken;
use crate::exec::ExecOutput;

/// Parameters for launching a detached lab container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    /// Container name.
    pub name: String,
    /// Image reference to launch.
    pub image: String,
    /// Host port to publish.
    pub host_port: u16,
    /// Service port inside the container.
    pub container_port: u16,
    /// Arguments passed to the image entrypoint.
    pub extra_args: Vec<String>,
}

/// Parameters for snapshotting a container into a new image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSpec {
    /// Container name or ID to snapshot.
    pub source: String,
    /// Target image reference, including tag.
    pub target: String,
    /// Author label recorded on the image.
    pub author: String,
    /// Commit message recorded on the image.
    pub message: String,
}

/// Container engine operations used by the lab orchestrator.
///
/// Every failing call reports the engine's captured output so callers can
/// log engine-level detail without re-running the command.
pub trait ContainerRuntime: Send + Sync {
    /// Launches a detached, interactive-capable container and returns its
    /// engine-assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the container (name clash,
    /// lost port bind, missing image, ...).
    fn run(&self, spec: &RunSpec, cancel: &CancelToken) -> Result<String>;

    /// Starts an existing container and returns the engine's output.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn start(&self, name: &str, cancel: &CancelToken) -> Result<String>;

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped.
    fn stop(&self, reference: &str, cancel: &CancelToken) -> Result<()>;

    /// Removes a stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove(&self, reference: &str, cancel: &CancelToken) -> Result<()>;

    /// Snapshots a container's filesystem into a new image.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(&self, spec: &CommitSpec, cancel: &CancelToken) -> Result<()>;

    /// Reports whether the named container is currently running.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be inspected, e.g. because
    /// it does not exist.
    fn is_running(&self, name: &str, cancel: &CancelToken) -> Result<bool>;

    /// Returns the host port actually bound to `container_port`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping cannot be queried.
    fn published_port(
        &self,
        name: &str,
        container_port: u16,
        cancel: &CancelToken,
    ) -> Result<Option<u16>>;

    /// Lists the IDs of images whose reference matches `pattern`.
    ///
    /// The result contains each image ID once, in engine order.
    ///
    /// # Errors
    ///
    /// Returns an error if the image list cannot be read.
    fn list_images(&self, pattern: &str, cancel: &CancelToken) -> Result<Vec<String>>;

    /// Removes an image, optionally forcing removal of tagged or in-use images.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be removed.
    fn remove_image(&self, image_id: &str, force: bool, cancel: &CancelToken) -> Result<()>;

    /// Runs `shell_command` through the container shell.
    ///
    /// A non-zero exit status is reported in [`ExecOutput::exit_code`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the engine could not be invoked.
    fn exec(&self, reference: &str, shell_command: &str, cancel: &CancelToken)
    -> Result<ExecOutput>;

    /// Returns whether the engine is reachable from this host.
    fn is_available(&self) -> bool;
}
