//! In-memory lab table shared by the store implementations.

use std::collections::BTreeMap;

use chrono::Utc;
use labvisor_common::error::{LabError, Result};
use labvisor_common::types::{Lab, LabId, NewLab};
use serde::{Deserialize, Serialize};

/// Labs keyed by ID plus the next ID to assign.
///
/// IDs are never reused, even after the highest lab is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabTable {
    next_id: u64,
    labs: BTreeMap<LabId, Lab>,
}

impl LabTable {
    /// Inserts a new lab, assigning its ID and timestamps.
    pub fn insert(&mut self, new: NewLab) -> Lab {
        self.next_id = self.next_id.max(1);
        let id = LabId::new(self.next_id);
        self.next_id += 1;

        let now = Utc::now();
        let lab = Lab {
            id,
            task_id: new.task_id,
            title: new.title,
            container_id: new.container_id,
            container_name: new.container_name,
            access_url: new.access_url,
            commit_image: new.commit_image,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        let _ = self.labs.insert(id, lab.clone());
        lab
    }

    /// Replaces an existing lab, keeping its creation time.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no lab has this ID.
    pub fn update(&mut self, lab: &Lab) -> Result<Lab> {
        let stored = self.labs.get_mut(&lab.id).ok_or_else(|| not_found(lab.id))?;
        let created_at = stored.created_at;
        *stored = Lab {
            created_at,
            updated_at: Utc::now(),
            ..lab.clone()
        };
        Ok(stored.clone())
    }

    /// Removes a lab.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no lab has this ID.
    pub fn remove(&mut self, id: LabId) -> Result<()> {
        self.labs.remove(&id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    /// Returns a copy of a lab.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no lab has this ID.
    pub fn get(&self, id: LabId) -> Result<Lab> {
        self.labs.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    /// Returns all labs ordered by ID.
    pub fn list(&self) -> Vec<Lab> {
        self.labs.values().cloned().collect()
    }
}

fn not_found(id: LabId) -> LabError {
    LabError::NotFound {
        kind: "lab",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use labvisor_common::types::{ContainerName, LabStatus, TaskId};

    use super::*;

    fn new_lab(task: u64) -> NewLab {
        NewLab {
            task_id: TaskId::new(task),
            title: String::new(),
            container_id: "cid".into(),
            container_name: ContainerName::new(format!("lab_{task}_t")),
            access_url: "http://localhost:40000".into(),
            commit_image: "alpine".into(),
            status: LabStatus::Running,
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut table = LabTable::default();
        assert_eq!(table.insert(new_lab(1)).id, LabId::new(1));
        assert_eq!(table.insert(new_lab(2)).id, LabId::new(2));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let mut table = LabTable::default();
        let first = table.insert(new_lab(1));
        table.remove(first.id).unwrap();
        assert_eq!(table.insert(new_lab(1)).id, LabId::new(2));
    }

    #[test]
    fn update_keeps_created_at() {
        let mut table = LabTable::default();
        let lab = table.insert(new_lab(1));
        let mut changed = lab.clone();
        changed.title = "intro".into();
        changed.created_at = Utc::now() + chrono::Duration::days(1);
        let stored = table.update(&changed).unwrap();
        assert_eq!(stored.created_at, lab.created_at);
        assert_eq!(stored.title, "intro");
        assert!(stored.updated_at >= lab.updated_at);
    }

    #[test]
    fn missing_lab_is_not_found() {
        let mut table = LabTable::default();
        assert!(table.get(LabId::new(9)).unwrap_err().is_not_found());
        assert!(table.remove(LabId::new(9)).unwrap_err().is_not_found());
    }
}
