//! Snapshot images of lab containers.

use chrono::{DateTime, Utc};
use labvisor_common::constants::{DEFAULT_IMAGE_TAG, SNAPSHOT_TIMESTAMP_FORMAT};
use labvisor_common::error::{LabError, Result};
use labvisor_common::types::{ContainerName, LabId};
use labvisor_runtime::{CancelToken, CommitSpec};

use super::LabOrchestrator;

/// Builds the snapshot image name of `container` taken at `at`.
///
/// Returns the image reference and the timestamp it embeds. The reference
/// gets the default tag unless it already carries one.
#[must_use]
pub fn snapshot_image_name(container: &ContainerName, at: DateTime<Utc>) -> (String, String) {
    let timestamp = at.format(SNAPSHOT_TIMESTAMP_FORMAT).to_string();
    let mut image = format!("{}{timestamp}", container.snapshot_prefix());
    let last_segment = image.rsplit('/').next().unwrap_or(&image);
    if !last_segment.contains(':') {
        image = format!("{image}:{DEFAULT_IMAGE_TAG}");
    }
    (image, timestamp)
}

impl LabOrchestrator {
    /// Snapshots a running container into a new image and returns its name.
    ///
    /// Lab records are not touched.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` without touching the engine further if the
    /// container is stopped, or the engine failure (including an unknown
    /// container).
    pub fn commit_lab(&self, container: &str, cancel: &CancelToken) -> Result<String> {
        let _guard = self.gate.container(container, cancel)?;
        self.commit_container(&ContainerName::new(container), cancel)
    }

    /// Snapshots the container of a lab and records the image as the lab's
    /// `commit_image`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown lab, `NoContainer` if it was never
    /// launched, any [`Self::commit_lab`] failure, or a store failure.
    pub fn commit_and_record(&self, id: LabId, cancel: &CancelToken) -> Result<String> {
        let _lab_guard = self.gate.lab(id, cancel)?;
        let mut lab = self.labs.get(id)?;
        if !lab.has_container() {
            return Err(LabError::NoContainer { lab_id: id.get() });
        }
        let _container_guard = self.gate.container(lab.container_name.as_str(), cancel)?;

        let image = self.commit_container(&lab.container_name, cancel)?;
        lab.commit_image.clone_from(&image);
        let _ = self.labs.update(&lab).inspect_err(|e| {
            tracing::error!(lab_id = %id, image = %image, error = %e, "snapshot taken but not recorded");
        })?;
        Ok(image)
    }

    /// Removes every snapshot image of `container`.
    ///
    /// All matches are attempted even after a failure. Having no snapshots
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns the engine failure if the images cannot be listed, or
    /// `CleanupIncomplete` naming each image that could not be removed.
    pub fn delete_container_commits(&self, container: &str, cancel: &CancelToken) -> Result<()> {
        let _guard = self.gate.container(container, cancel)?;
        let pattern = format!("{}*", ContainerName::new(container).snapshot_prefix());

        let images = self.runtime.list_images(&pattern, cancel).inspect_err(|e| {
            tracing::error!(container = %container, error = %e, "failed to list snapshot images");
        })?;
        if images.is_empty() {
            tracing::info!(container = %container, "no snapshot images to delete");
            return Ok(());
        }

        let mut removed = 0_usize;
        let mut failed = Vec::new();
        let mut last_error = None;
        for image in images {
            match self.runtime.remove_image(&image, true, cancel) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(container = %container, image_id = %image, "snapshot image deleted");
                }
                Err(e) => {
                    tracing::warn!(container = %container, image_id = %image, error = %e, "failed to delete snapshot image");
                    failed.push(image);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            None => {
                tracing::info!(container = %container, removed, "snapshot images deleted");
                Ok(())
            }
            Some(last_error) => Err(LabError::CleanupIncomplete {
                failed,
                removed,
                last_error: Box::new(last_error),
            }),
        }
    }

    fn commit_container(&self, container: &ContainerName, cancel: &CancelToken) -> Result<String> {
        let running = self
            .runtime
            .is_running(container.as_str(), cancel)
            .inspect_err(|e| {
                tracing::error!(container = %container, error = %e, "container check failed");
            })?;
        if !running {
            tracing::warn!(container = %container, "refusing to commit a stopped container");
            return Err(LabError::NotRunning {
                container: container.as_str().to_string(),
            });
        }

        let (image, timestamp) = snapshot_image_name(container, Utc::now());
        let spec = CommitSpec {
            source: container.as_str().to_string(),
            target: image.clone(),
            author: self.settings.commit_author.clone(),
            message: format!("Autocommit of {container} at {timestamp}"),
        };
        self.runtime.commit(&spec, cancel).inspect_err(|e| {
            tracing::error!(container = %container, image = %image, error = %e, "commit failed");
        })?;
        tracing::info!(container = %container, image = %image, "container committed");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn snapshot_name_gets_default_tag() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let (image, ts) = snapshot_image_name(&ContainerName::new("lab_42_20240101_000000"), at);
        assert_eq!(ts, "20240305-140709");
        assert_eq!(image, "lab_42_20240101_000000-snapshot-20240305-140709:latest");
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let (image, _) = snapshot_image_name(&ContainerName::new("registry:5000/lab_1"), at);
        assert_eq!(image, "registry:5000/lab_1-snapshot-20240305-140709:latest");
    }

    #[test]
    fn tagged_reference_is_left_alone() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let (image, _) = snapshot_image_name(&ContainerName::new("registry:5000/lab:v2"), at);
        assert_eq!(image, "registry:5000/lab:v2-snapshot-20240305-140709");
    }
}
