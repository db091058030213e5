//! Lab lifecycle orchestration for Labvisor.
//!
//! [`LabOrchestrator`] ties together a container runtime, a port allocator,
//! a lab store, and optionally a task catalog. It owns the ordering between
//! engine-side effects and persisted records, and serialises overlapping
//! operations on the same lab through a [`LabGate`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod catalog;
pub mod gate;
pub mod orchestrator;

pub use catalog::{HttpTaskCatalog, TaskCatalog};
pub use gate::{GateGuard, LabGate};
pub use orchestrator::{CreatedLab, LabOrchestrator, OrchestratorSettings};
