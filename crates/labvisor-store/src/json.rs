//! JSON-file lab store.
//!
//! Keeps the whole lab table in one JSON document. Every mutation reads the
//! file, applies the change, and replaces the file atomically through a
//! temporary sibling and a rename, so a crash never leaves a torn index.
//!
//! Any number of handles, in any number of processes, may share one file:
//! each read-modify-write runs under an exclusive advisory lock on the
//! `<file>.lock` sibling, and reads take the same lock shared.

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;
use labvisor_common::error::{LabError, Result};
use labvisor_common::types::{Lab, LabId, NewLab};

use crate::LabRepository;
use crate::table::LabTable;

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Lab store backed by a JSON file on disk.
#[derive(Debug)]
pub struct JsonLabRepository {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonLabRepository {
    /// Opens the store at `path`, creating its parent directory.
    ///
    /// The file itself is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LabError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        tracing::debug!(path = %path.display(), "opened lab store");
        Ok(Self {
            lock_path: sibling(&path, ".lock"),
            path,
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the store lock is held; it is released when the returned
    /// handle is dropped.
    fn lock(&self, exclusive: bool) -> Result<File> {
        let io_err = |e| LabError::Io {
            path: self.lock_path.clone(),
            source: e,
        };
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(io_err)?;
        if exclusive {
            FileExt::lock_exclusive(&file).map_err(io_err)?;
        } else {
            FileExt::lock_shared(&file).map_err(io_err)?;
        }
        Ok(file)
    }

    fn load(&self) -> Result<LabTable> {
        if !self.path.exists() {
            return Ok(LabTable::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| LabError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        if content.trim().is_empty() {
            return Ok(LabTable::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, table: &LabTable) -> Result<()> {
        let json = serde_json::to_string_pretty(table)?;
        let tmp = sibling(
            &self.path,
            &format!(
                ".{}.{}.tmp",
                std::process::id(),
                TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
            ),
        );
        std::fs::write(&tmp, json).map_err(|e| LabError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            LabError::Io {
                path: self.path.clone(),
                source: e,
            }
        })?;
        Ok(())
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut LabTable) -> Result<T>) -> Result<T> {
        let _lock = self.lock(true)?;
        let mut table = self.load()?;
        let value = op(&mut table)?;
        self.save(&table)?;
        Ok(value)
    }

    fn read(&self) -> Result<LabTable> {
        let _lock = self.lock(false)?;
        self.load()
    }
}

/// Appends `suffix` to the file name of `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsStr::to_os_string).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl LabRepository for JsonLabRepository {
    fn create(&self, lab: NewLab) -> Result<Lab> {
        let lab = self.mutate(|t| Ok(t.insert(lab)))?;
        tracing::debug!(lab_id = %lab.id, "lab record created");
        Ok(lab)
    }

    fn update(&self, lab: &Lab) -> Result<Lab> {
        self.mutate(|t| t.update(lab))
    }

    fn delete(&self, id: LabId) -> Result<()> {
        self.mutate(|t| t.remove(id))?;
        tracing::debug!(lab_id = %id, "lab record deleted");
        Ok(())
    }

    fn get(&self, id: LabId) -> Result<Lab> {
        self.read()?.get(id)
    }

    fn list(&self) -> Result<Vec<Lab>> {
        Ok(self.read()?.list())
    }
}
