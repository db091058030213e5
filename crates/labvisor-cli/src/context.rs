//! Wiring of configuration, engine client, store, and catalog.

use std::sync::Arc;

use anyhow::Context as _;
use labvisor_common::config::{LabvisorConfig, parse_port_range};
use labvisor_orchestrator::{HttpTaskCatalog, LabGate, LabOrchestrator, OrchestratorSettings};
use labvisor_runtime::{CancelToken, ContainerRuntime, DockerCli, LocalPortAllocator};
use labvisor_store::JsonLabRepository;

use crate::commands::GlobalArgs;

/// Everything a command needs to talk to labs.
pub struct Context {
    /// Orchestrator over the configured engine and store.
    pub orchestrator: LabOrchestrator,
    /// Fired by Ctrl+C; aborts the in-flight engine command.
    pub cancel: CancelToken,
    /// Print results as JSON instead of text.
    pub json: bool,
}

impl Context {
    /// Loads configuration and builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the store cannot
    /// be opened, or the interrupt handler cannot be installed.
    pub fn load(args: &GlobalArgs) -> anyhow::Result<Self> {
        let config = LabvisorConfig::from_env().context("failed to load configuration")?;
        let config = apply_overrides(config, args)?;
        tracing::debug!(?config, "configuration loaded");

        let runtime = DockerCli::new(config.docker_binary.clone(), config.command_timeout);
        if !runtime.is_available() {
            tracing::warn!(binary = %config.docker_binary, "container engine binary not found on PATH");
        }

        let ports = config
            .port_range
            .clone()
            .map_or_else(LocalPortAllocator::ephemeral, LocalPortAllocator::with_range);

        let store = JsonLabRepository::open(&config.store_path)
            .with_context(|| format!("failed to open lab store {}", config.store_path.display()))?;

        let lock_dir = config.store_path.with_extension("locks");
        let gate = LabGate::with_lock_dir(&lock_dir)
            .with_context(|| format!("failed to create lock directory {}", lock_dir.display()))?;

        let catalog = HttpTaskCatalog::new(config.task_service_url.clone(), config.catalog_timeout)?;

        let mut settings = OrchestratorSettings::from_config(&config);
        settings.launch_args.clone_from(&args.launch_args);

        let orchestrator = LabOrchestrator::new(
            Arc::new(runtime),
            Arc::new(ports),
            Arc::new(store),
            settings,
        )
        .with_catalog(Arc::new(catalog))
        .with_gate(gate);

        let cancel = CancelToken::new();
        let on_interrupt = cancel.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        })
        .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

        Ok(Self {
            orchestrator,
            cancel,
            json: args.json,
        })
    }
}

/// Applies command-line overrides on top of the environment configuration.
///
/// # Errors
///
/// Returns an error if an override is malformed or the result is invalid.
pub fn apply_overrides(mut config: LabvisorConfig, args: &GlobalArgs) -> anyhow::Result<LabvisorConfig> {
    if let Some(path) = &args.store {
        config.store_path.clone_from(path);
    }
    if let Some(url) = &args.task_service_url {
        config.task_service_url.clone_from(url);
    }
    if let Some(host) = &args.public_host {
        config.public_host.clone_from(host);
    }
    if let Some(binary) = &args.docker_binary {
        config.docker_binary.clone_from(binary);
    }
    if let Some(range) = &args.port_range {
        config.port_range = Some(parse_port_range(range)?);
    }
    config.validate()?;
    Ok(config)
}
