//! Lab lifecycle orchestrator.
//!
//! Maps lab records to container engine operations. The record of a lab is
//! written only after its container is running, and removed only after its
//! container is gone, so a stored lab always points at a real container or
//! at nothing.

mod exec;
mod provision;
mod snapshot;

use std::sync::Arc;

use labvisor_common::config::LabvisorConfig;
use labvisor_common::constants;
use labvisor_common::error::{LabError, Result};
use labvisor_common::types::{Lab, LabId, LabStatus};
use labvisor_runtime::{CancelToken, ContainerRuntime, PortAllocator};
use labvisor_store::LabRepository;
use serde::Serialize;

use crate::catalog::TaskCatalog;
use crate::gate::LabGate;

pub use snapshot::snapshot_image_name;

/// Tunables for lab provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Host name used in access URLs.
    pub public_host: String,
    /// Service port inside every lab container.
    pub service_port: u16,
    /// Author recorded on snapshot images.
    pub commit_author: String,
    /// Tear down a freshly launched container when its record cannot be saved.
    pub rollback_on_persist_failure: bool,
    /// Arguments appended to every container launch, after the image.
    pub launch_args: Vec<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            public_host: constants::DEFAULT_PUBLIC_HOST.to_string(),
            service_port: constants::DEFAULT_SERVICE_PORT,
            commit_author: constants::DEFAULT_COMMIT_AUTHOR.to_string(),
            rollback_on_persist_failure: true,
            launch_args: Vec::new(),
        }
    }
}

impl OrchestratorSettings {
    /// Takes the provisioning fields from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &LabvisorConfig) -> Self {
        Self {
            public_host: config.public_host.clone(),
            service_port: config.service_port,
            commit_author: config.commit_author.clone(),
            rollback_on_persist_failure: config.rollback_on_persist_failure,
            launch_args: Vec::new(),
        }
    }

    /// Builds the access URL for a published host port.
    #[must_use]
    pub fn access_url(&self, port: u16) -> String {
        format!("http://{}:{port}", self.public_host)
    }
}

/// Result of a successful lab creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedLab {
    /// Engine-assigned container ID.
    pub container_id: String,
    /// Externally reachable service address.
    pub access_url: String,
    /// Identifier of the persisted lab.
    pub lab_id: LabId,
    /// Engine-side container name.
    pub container_name: String,
}

/// Coordinates the container engine, port allocation, and the lab store.
pub struct LabOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    ports: Arc<dyn PortAllocator>,
    labs: Arc<dyn LabRepository>,
    catalog: Option<Arc<dyn TaskCatalog>>,
    settings: OrchestratorSettings,
    gate: LabGate,
}

impl std::fmt::Debug for LabOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabOrchestrator")
            .field("settings", &self.settings)
            .field("has_catalog", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}

impl LabOrchestrator {
    /// Creates an orchestrator without a task catalog.
    #[must_use]
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        ports: Arc<dyn PortAllocator>,
        labs: Arc<dyn LabRepository>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            runtime,
            ports,
            labs,
            catalog: None,
            settings,
            gate: LabGate::new(),
        }
    }

    /// Attaches the catalog used by [`Self::create_lab_for_task`].
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn TaskCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Replaces the per-lab gate, e.g. with one backed by a lock directory
    /// shared with other processes.
    #[must_use]
    pub fn with_gate(mut self, gate: LabGate) -> Self {
        self.gate = gate;
        self
    }

    /// Returns the active settings.
    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Starts the existing container of a lab and returns the engine's
    /// container reference.
    ///
    /// The container keeps its name and published port, so the access URL
    /// stays valid across stop/start cycles.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown lab, `NoContainer` if the lab was
    /// never launched, or the engine failure.
    pub fn start_lab(&self, id: LabId, cancel: &CancelToken) -> Result<String> {
        let _lab_guard = self.gate.lab(id, cancel)?;
        let mut lab = self.labs.get(id)?;
        if !lab.has_container() {
            return Err(LabError::NoContainer { lab_id: id.get() });
        }
        let _container_guard = self.gate.container(lab.container_name.as_str(), cancel)?;

        let output = self
            .runtime
            .start(lab.container_name.as_str(), cancel)
            .inspect_err(|e| {
                tracing::error!(lab_id = %id, container = %lab.container_name, error = %e, "failed to start container");
            })?;

        lab.status = LabStatus::Running;
        let _ = self.labs.update(&lab)?;
        tracing::info!(lab_id = %id, container = %lab.container_name, "lab started");
        Ok(output.trim().to_string())
    }

    /// Stops the container of a lab, keeping it for a later start.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown lab, `NoContainer` if the lab has no
    /// container ID, or the engine failure.
    pub fn stop_lab(&self, id: LabId, cancel: &CancelToken) -> Result<()> {
        let _lab_guard = self.gate.lab(id, cancel)?;
        let mut lab = self.labs.get(id)?;
        let container_id = lab.container_id.trim().to_string();
        if container_id.is_empty() {
            return Err(LabError::NoContainer { lab_id: id.get() });
        }
        let _container_guard = self.gate.container(lab.container_name.as_str(), cancel)?;

        self.runtime.stop(&container_id, cancel).inspect_err(|e| {
            tracing::error!(lab_id = %id, container_id = %container_id, error = %e, "failed to stop container");
        })?;

        lab.status = LabStatus::Stopped;
        let _ = self.labs.update(&lab)?;
        tracing::info!(lab_id = %id, container = %lab.container_name, "lab stopped");
        Ok(())
    }

    /// Tears down a lab: stops and removes its container, then deletes the
    /// record.
    ///
    /// The record is kept whenever the engine steps fail, so the call can be
    /// retried and a deleted lab never leaves a container behind.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown lab, the first engine failure, or a
    /// store failure.
    pub fn delete_lab(&self, id: LabId, cancel: &CancelToken) -> Result<()> {
        let _lab_guard = self.gate.lab(id, cancel)?;
        let mut lab = self.labs.get(id)?;
        let container_id = lab.container_id.trim().to_string();

        if container_id.is_empty() {
            tracing::debug!(lab_id = %id, "lab has no container, removing record only");
        } else {
            let _container_guard = self.gate.container(lab.container_name.as_str(), cancel)?;
            self.runtime.stop(&container_id, cancel).inspect_err(|e| {
                tracing::error!(lab_id = %id, container_id = %container_id, error = %e, "failed to stop container, keeping lab record");
            })?;
            if lab.status != LabStatus::Stopped {
                lab.status = LabStatus::Stopped;
                if let Err(e) = self.labs.update(&lab) {
                    tracing::warn!(lab_id = %id, error = %e, "failed to record stopped status");
                }
            }
            self.runtime.remove(&container_id, cancel).inspect_err(|e| {
                tracing::error!(lab_id = %id, container_id = %container_id, error = %e, "failed to remove container, keeping lab record");
            })?;
        }

        self.labs.delete(id)?;
        tracing::info!(lab_id = %id, container = %lab.container_name, "lab deleted");
        Ok(())
    }

    /// Fetches a lab record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown lab, or a store failure.
    pub fn get_lab(&self, id: LabId) -> Result<Lab> {
        self.labs.get(id)
    }

    /// Lists all lab records ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub fn list_labs(&self) -> Result<Vec<Lab>> {
        self.labs.list()
    }

    /// Updates the editable fields of a lab: `title` and `commit_image`.
    ///
    /// Identity fields and status are taken from the stored record, whatever
    /// `changes` carries.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown lab, or a store failure.
    pub fn update_lab(&self, changes: &Lab, cancel: &CancelToken) -> Result<Lab> {
        let _lab_guard = self.gate.lab(changes.id, cancel)?;
        let mut lab = self.labs.get(changes.id)?;
        lab.title.clone_from(&changes.title);
        lab.commit_image.clone_from(&changes.commit_image);
        let stored = self.labs.update(&lab).inspect_err(|e| {
            tracing::error!(lab_id = %changes.id, error = %e, "failed to update lab");
        })?;
        tracing::info!(lab_id = %stored.id, "lab updated");
        Ok(stored)
    }
}
