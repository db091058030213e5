//! Persistence of lab records.
//!
//! The orchestrator depends only on [`LabRepository`]. Two stores ship with
//! the workspace: [`MemoryLabRepository`] for tests and embedding, and
//! [`JsonLabRepository`], a daemon-less JSON index on disk.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod json;
pub mod memory;
pub mod table;

use labvisor_common::error::Result;
use labvisor_common::types::{Lab, LabId, NewLab};

pub use json::JsonLabRepository;
pub use memory::MemoryLabRepository;

/// CRUD over lab records.
///
/// Implementations assign identifiers and maintain `created_at` /
/// `updated_at`. Failures are opaque persistence errors.
pub trait LabRepository: Send + Sync {
    /// Persists a new lab and returns it with its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be stored.
    fn create(&self, lab: NewLab) -> Result<Lab>;

    /// Replaces a stored lab and returns the stored version.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no lab has this ID, or a persistence error.
    fn update(&self, lab: &Lab) -> Result<Lab>;

    /// Deletes a lab.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no lab has this ID, or a persistence error.
    fn delete(&self, id: LabId) -> Result<()>;

    /// Fetches a lab by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no lab has this ID, or a persistence error.
    fn get(&self, id: LabId) -> Result<Lab>;

    /// Lists all labs ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self) -> Result<Vec<Lab>>;
}
