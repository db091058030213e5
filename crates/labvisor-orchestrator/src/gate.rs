//! Keyed single-flight locking for lab operations.
//!
//! Each key (`lab:{id}` or `container:{name}`) admits one holder at a time.
//! Callers that always take a lab key before a container key cannot
//! deadlock against each other.
//!
//! A gate with a lock directory also takes an advisory lock on one file per
//! key, so gates in separate processes sharing that directory exclude each
//! other as well.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use fs2::FileExt;
use labvisor_common::error::{LabError, Result};
use labvisor_common::types::LabId;
use labvisor_runtime::CancelToken;

const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Set of currently held operation keys.
#[derive(Debug, Default)]
pub struct LabGate {
    held: Mutex<HashSet<String>>,
    released: Condvar,
    lock_dir: Option<PathBuf>,
}

/// Holds a gate key until dropped.
#[derive(Debug)]
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    gate: &'a LabGate,
    key: String,
    file: Option<File>,
}

impl LabGate {
    /// Creates a gate with no keys held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gate that also locks `<dir>/<key>.lock` for every key.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created.
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| LabError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self {
            lock_dir: Some(dir),
            ..Self::default()
        })
    }

    /// Returns the directory holding the per-key lock files, if any.
    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    /// Waits for exclusive ownership of the key for `id`.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if `cancel` fires while waiting.
    pub fn lab(&self, id: LabId, cancel: &CancelToken) -> Result<GateGuard<'_>> {
        self.acquire(format!("lab:{id}"), cancel)
    }

    /// Waits for exclusive ownership of the key for container `name`.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if `cancel` fires while waiting.
    pub fn container(&self, name: &str, cancel: &CancelToken) -> Result<GateGuard<'_>> {
        self.acquire(format!("container:{name}"), cancel)
    }

    /// Waits for exclusive ownership of `key`.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if `cancel` fires while waiting, `Io` if the key's
    /// lock file cannot be opened, or `Persistence` if the gate's lock was
    /// poisoned.
    pub fn acquire(&self, key: String, cancel: &CancelToken) -> Result<GateGuard<'_>> {
        let mut held = self.lock()?;
        while held.contains(&key) {
            if cancel.is_cancelled() {
                return Err(LabError::Cancelled {
                    operation: "lock",
                    target: key,
                });
            }
            held = self
                .released
                .wait_timeout(held, WAIT_SLICE)
                .map_err(|_| poisoned())?
                .0;
        }
        let _ = held.insert(key.clone());
        drop(held);

        let mut guard = GateGuard {
            gate: self,
            key,
            file: None,
        };
        if let Some(dir) = &self.lock_dir {
            let path = dir.join(lock_file_name(&guard.key));
            guard.file = Some(lock_key_file(&path, &guard.key, cancel)?);
        }
        tracing::trace!(key = %guard.key, "gate acquired");
        Ok(guard)
    }

    /// Returns `true` if `key` is currently held through this gate.
    pub fn is_held(&self, key: &str) -> bool {
        self.lock().is_ok_and(|held| held.contains(key))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashSet<String>>> {
        self.held.lock().map_err(|_| poisoned())
    }
}

impl GateGuard<'_> {
    /// Returns the key this guard holds.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        drop(self.file.take());
        let mut held = self
            .gate
            .held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let _ = held.remove(&self.key);
        drop(held);
        self.gate.released.notify_all();
    }
}

/// Opens `path` and polls for an exclusive lock on it until it is granted
/// or `cancel` fires.
fn lock_key_file(path: &Path, key: &str, cancel: &CancelToken) -> Result<File> {
    let io_err = |e| LabError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(io_err)?;
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => return Ok(file),
            Err(e) if is_contended(&e) => {
                if cancel.is_cancelled() {
                    return Err(LabError::Cancelled {
                        operation: "lock",
                        target: key.to_string(),
                    });
                }
                std::thread::sleep(WAIT_SLICE);
            }
            Err(e) => return Err(io_err(e)),
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Maps a gate key to a file name, e.g. `lab:3` to `lab-3.lock`.
fn lock_file_name(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| match c {
            ':' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') => c,
            _ => '_',
        })
        .collect();
    format!("{stem}.lock")
}

fn poisoned() -> LabError {
    LabError::Persistence {
        message: "lab gate lock poisoned".into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let gate = LabGate::new();
        let token = CancelToken::new();
        {
            let guard = gate.lab(LabId::new(1), &token).unwrap();
            assert_eq!(guard.key(), "lab:1");
            assert!(gate.is_held("lab:1"));
        }
        assert!(!gate.is_held("lab:1"));
    }

    #[test]
    fn distinct_keys_do_not_block() {
        let gate = LabGate::new();
        let token = CancelToken::new();
        let _a = gate.lab(LabId::new(1), &token).unwrap();
        let _b = gate.lab(LabId::new(2), &token).unwrap();
        let _c = gate.container("lab_1_x", &token).unwrap();
    }

    #[test]
    fn cancelled_wait_returns_cancelled() {
        let gate = LabGate::new();
        let token = CancelToken::new();
        let _held = gate.lab(LabId::new(1), &token).unwrap();

        let waiter = CancelToken::new();
        waiter.cancel();
        let err = gate.lab(LabId::new(1), &waiter).unwrap_err();
        assert!(matches!(err, LabError::Cancelled { operation: "lock", .. }));
    }

    #[test]
    fn same_key_is_exclusive_across_threads() {
        let gate = Arc::new(LabGate::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let token = CancelToken::new();
                    let _guard = gate.lab(LabId::new(7), &token).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    let _ = inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lock_file_names_are_path_safe() {
        assert_eq!(lock_file_name("lab:3"), "lab-3.lock");
        assert_eq!(lock_file_name("container:lab_42_x"), "container-lab_42_x.lock");
        assert_eq!(lock_file_name("container:../etc"), "container-.._etc.lock");
    }

    #[test]
    fn gates_sharing_a_lock_dir_exclude_each_other() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = LabGate::with_lock_dir(dir.path()).unwrap();
        let second = LabGate::with_lock_dir(dir.path()).unwrap();
        let token = CancelToken::new();

        let held = first.lab(LabId::new(3), &token).unwrap();
        assert!(dir.path().join("lab-3.lock").is_file());
        assert!(!second.is_held("lab:3"));

        let impatient = CancelToken::new();
        impatient.cancel();
        let err = second.lab(LabId::new(3), &impatient).unwrap_err();
        assert!(matches!(err, LabError::Cancelled { operation: "lock", .. }));
        assert!(!second.is_held("lab:3"));

        let _other = second.lab(LabId::new(4), &token).unwrap();
        drop(held);
        let _now_free = second.lab(LabId::new(3), &token).unwrap();
    }

    #[test]
    fn shared_lock_dir_serialises_threads_across_gates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gates: Vec<_> = (0..2)
            .map(|_| Arc::new(LabGate::with_lock_dir(dir.path()).unwrap()))
            .collect();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let gate = Arc::clone(&gates[i % 2]);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let token = CancelToken::new();
                    let _guard = gate.container("lab_9_x", &token).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    let _ = inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
