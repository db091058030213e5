//! Process-local lab store.

use std::sync::{Mutex, MutexGuard};

use labvisor_common::error::{LabError, Result};
use labvisor_common::types::{Lab, LabId, NewLab};

use crate::LabRepository;
use crate::table::LabTable;

/// Lab store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryLabRepository {
    table: Mutex<LabTable>,
}

impl MemoryLabRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LabTable>> {
        self.table.lock().map_err(|_| LabError::Persistence {
            message: "lab table lock poisoned".into(),
        })
    }
}

impl LabRepository for MemoryLabRepository {
    fn create(&self, lab: NewLab) -> Result<Lab> {
        Ok(self.lock()?.insert(lab))
    }

    fn update(&self, lab: &Lab) -> Result<Lab> {
        self.lock()?.update(lab)
    }

    fn delete(&self, id: LabId) -> Result<()> {
        self.lock()?.remove(id)
    }

    fn get(&self, id: LabId) -> Result<Lab> {
        self.lock()?.get(id)
    }

    fn list(&self) -> Result<Vec<Lab>> {
        Ok(self.lock()?.list())
    }
}
