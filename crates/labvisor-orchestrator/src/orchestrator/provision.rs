//! Lab creation: launch the container first, then persist the record.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use labvisor_common::error::{LabError, Result};
use labvisor_common::types::{ContainerName, LabId, LabStatus, NewLab, TaskId};
use labvisor_runtime::{CancelToken, RunSpec};

use super::{CreatedLab, LabOrchestrator};

/// Microsecond timestamp of the last container name issued by this process.
static LAST_LAUNCH_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Returns the current time, moved forward past the previous call when the
/// clock has not advanced, so names minted here never repeat.
fn next_launch_time() -> DateTime<Utc> {
    let now = Utc::now();
    let mut last = LAST_LAUNCH_MICROS.load(Ordering::Relaxed);
    loop {
        let candidate = now.timestamp_micros().max(last.saturating_add(1));
        match LAST_LAUNCH_MICROS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return DateTime::from_timestamp_micros(candidate).unwrap_or(now),
            Err(current) => last = current,
        }
    }
}

impl LabOrchestrator {
    /// Launches a container for `task` from `base_image` and records a new
    /// lab for it.
    ///
    /// No record is written unless the container launched. If the record
    /// cannot be written afterwards, the container is rolled back when the
    /// settings allow it; otherwise the error names the orphaned container.
    ///
    /// # Errors
    ///
    /// Returns `PortExhausted`, the engine launch failure, `Persistence`
    /// after a successful rollback, or `OrphanedContainer`. A launch cut off
    /// by cancellation or timeout is cleaned up by name before its error is
    /// returned; `OrphanedContainer` if that cleanup leaves the container.
    pub fn create_lab(
        &self,
        task: TaskId,
        base_image: &str,
        cancel: &CancelToken,
    ) -> Result<CreatedLab> {
        self.provision(task, String::new(), base_image, cancel)
    }

    /// Resolves the base image of `task` through the task catalog, then
    /// creates a lab from it.
    ///
    /// # Errors
    ///
    /// Returns `Config` when no catalog is attached, the catalog failure, or
    /// any [`Self::create_lab`] failure.
    pub fn create_lab_for_task(&self, task: TaskId, cancel: &CancelToken) -> Result<CreatedLab> {
        let catalog = self.catalog.as_ref().ok_or_else(|| LabError::Config {
            message: "no task catalog configured".into(),
        })?;
        let image = catalog.base_image(task).inspect_err(|e| {
            tracing::error!(task_id = %task, error = %e, "failed to resolve task image");
        })?;
        self.create_lab(task, &image, cancel)
    }

    /// Launches a new lab for the task of `source` from a snapshot image.
    ///
    /// Without an explicit `image` the source lab's `commit_image` is used.
    /// The source lab is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown source lab, `NoContainer` if it has
    /// no image to launch from, or any [`Self::create_lab`] failure.
    pub fn create_lab_from_commit(
        &self,
        source: LabId,
        image: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<CreatedLab> {
        let lab = self.labs.get(source)?;
        let image = image
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| lab.commit_image.trim());
        if image.is_empty() {
            return Err(LabError::NoContainer {
                lab_id: source.get(),
            });
        }
        tracing::debug!(source_lab = %source, image = %image, "recreating lab from snapshot");
        self.provision(lab.task_id, lab.title.clone(), image, cancel)
    }

    fn provision(
        &self,
        task: TaskId,
        title: String,
        image: &str,
        cancel: &CancelToken,
    ) -> Result<CreatedLab> {
        let name = ContainerName::for_task(task, next_launch_time());
        let allocated = self.ports.allocate().inspect_err(|e| {
            tracing::error!(task_id = %task, error = %e, "failed to allocate host port");
        })?;

        let spec = RunSpec {
            name: name.as_str().to_string(),
            image: image.to_string(),
            host_port: allocated,
            container_port: self.settings.service_port,
            extra_args: self.settings.launch_args.clone(),
        };
        let container_id = match self.runtime.run(&spec, cancel) {
            Ok(id) => id,
            Err(e @ (LabError::Cancelled { .. } | LabError::TimedOut { .. })) => {
                tracing::error!(task_id = %task, container = %name, image = %image, error = %e, "container launch interrupted");
                return Err(self.reclaim_interrupted_launch(&name, e));
            }
            Err(e) => {
                tracing::error!(task_id = %task, container = %name, image = %image, error = %e, "failed to launch container");
                return Err(e);
            }
        };

        let port = self.reconcile_port(&name, allocated, cancel);
        let access_url = self.settings.access_url(port);

        let record = NewLab {
            task_id: task,
            title,
            container_id: container_id.clone(),
            container_name: name.clone(),
            access_url: access_url.clone(),
            commit_image: image.to_string(),
            status: LabStatus::Running,
        };
        let lab = match self.labs.create(record) {
            Ok(lab) => lab,
            Err(e) => return Err(self.rollback_launch(&name, &container_id, e)),
        };

        tracing::info!(
            lab_id = %lab.id,
            task_id = %task,
            container = %name,
            access_url = %access_url,
            "lab created"
        );
        Ok(CreatedLab {
            container_id,
            access_url,
            lab_id: lab.id,
            container_name: name.as_str().to_string(),
        })
    }

    /// Returns the host port the engine actually published, falling back to
    /// the allocated one.
    fn reconcile_port(&self, name: &ContainerName, allocated: u16, cancel: &CancelToken) -> u16 {
        match self
            .runtime
            .published_port(name.as_str(), self.settings.service_port, cancel)
        {
            Ok(Some(bound)) if bound != allocated => {
                tracing::warn!(container = %name, allocated, bound, "engine published a different host port");
                bound
            }
            Ok(_) => allocated,
            Err(e) => {
                tracing::warn!(container = %name, allocated, error = %e, "could not query published port");
                allocated
            }
        }
    }

    /// Undoes a launch whose record could not be stored.
    fn rollback_launch(&self, name: &ContainerName, container_id: &str, cause: LabError) -> LabError {
        let orphaned = |cause: LabError| LabError::OrphanedContainer {
            container_name: name.as_str().to_string(),
            container_id: container_id.to_string(),
            source: Box::new(cause),
        };

        if !self.settings.rollback_on_persist_failure {
            tracing::error!(container = %name, container_id, error = %cause, "lab record not saved, container left running");
            return orphaned(cause);
        }

        match self.tear_down_launched(name) {
            Ok(()) => {
                tracing::warn!(container = %name, error = %cause, "lab record not saved, container rolled back");
                LabError::Persistence {
                    message: format!("lab record not saved, container {name} was removed: {cause}"),
                }
            }
            Err(e) => {
                tracing::error!(container = %name, container_id, error = %e, "rollback failed, container orphaned");
                orphaned(cause)
            }
        }
    }

    /// Removes whatever an interrupted `run` may have left under `name`.
    ///
    /// The interruption is returned as is when no container remains, and
    /// wrapped in `OrphanedContainer` when one is still known to the engine.
    fn reclaim_interrupted_launch(&self, name: &ContainerName, cause: LabError) -> LabError {
        let Err(remove_err) = self.tear_down_launched(name) else {
            tracing::warn!(container = %name, "removed container left by interrupted launch");
            return cause;
        };
        match self.runtime.is_running(name.as_str(), &CancelToken::new()) {
            Ok(_) => {
                tracing::error!(container = %name, error = %remove_err, "interrupted launch left a container behind");
                LabError::OrphanedContainer {
                    container_name: name.as_str().to_string(),
                    container_id: String::new(),
                    source: Box::new(cause),
                }
            }
            Err(_) => {
                tracing::debug!(container = %name, "interrupted launch created no container");
                cause
            }
        }
    }

    /// Stops and removes a just-launched container by name.
    ///
    /// Runs with its own token so a cancelled request still gets cleaned up.
    fn tear_down_launched(&self, name: &ContainerName) -> Result<()> {
        let detached = CancelToken::new();
        if let Err(e) = self.runtime.stop(name.as_str(), &detached) {
            tracing::warn!(container = %name, error = %e, "rollback stop failed");
        }
        self.runtime.remove(name.as_str(), &detached)
    }
}
