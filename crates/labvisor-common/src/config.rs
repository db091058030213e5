//! Global configuration model for the Labvisor service.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{LabError, Result};

/// Root configuration for the lab orchestrator and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabvisorConfig {
    /// Base URL of the task catalog service.
    pub task_service_url: String,
    /// Timeout applied to each catalog lookup.
    pub catalog_timeout: Duration,
    /// Host name advertised in lab access URLs.
    pub public_host: String,
    /// Port of the terminal service inside each lab container.
    pub service_port: u16,
    /// Host port range to allocate from; the OS picks an ephemeral port if unset.
    pub port_range: Option<RangeInclusive<u16>>,
    /// Container engine binary.
    pub docker_binary: String,
    /// Deadline for each container engine invocation.
    pub command_timeout: Duration,
    /// Path of the JSON lab store.
    pub store_path: PathBuf,
    /// Author recorded on snapshot images.
    pub commit_author: String,
    /// Remove a freshly launched container when its lab record cannot be saved.
    pub rollback_on_persist_failure: bool,
}

impl Default for LabvisorConfig {
    fn default() -> Self {
        Self {
            task_service_url: constants::DEFAULT_TASK_SERVICE_URL.to_string(),
            catalog_timeout: Duration::from_secs(constants::DEFAULT_CATALOG_TIMEOUT_SECS),
            public_host: constants::DEFAULT_PUBLIC_HOST.to_string(),
            service_port: constants::DEFAULT_SERVICE_PORT,
            port_range: None,
            docker_binary: constants::DEFAULT_DOCKER_BINARY.to_string(),
            command_timeout: Duration::from_secs(constants::DEFAULT_COMMAND_TIMEOUT_SECS),
            store_path: constants::default_store_path(),
            commit_author: constants::DEFAULT_COMMIT_AUTHOR.to_string(),
            rollback_on_persist_failure: true,
        }
    }
}

impl LabvisorConfig {
    /// Loads the configuration from `LABVISOR_*` environment variables.
    ///
    /// `TASK_SERVICE_URL` is honoured when `LABVISOR_TASK_SERVICE_URL` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Config`] if a variable holds an unparsable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, applying
    /// defaults for every missing key.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Config`] if a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("LABVISOR_TASK_SERVICE_URL").or_else(|| lookup("TASK_SERVICE_URL")) {
            cfg.task_service_url = url;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "LABVISOR_CATALOG_TIMEOUT_SECS")? {
            cfg.catalog_timeout = Duration::from_secs(secs);
        }
        if let Some(host) = lookup("LABVISOR_PUBLIC_HOST") {
            cfg.public_host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "LABVISOR_SERVICE_PORT")? {
            cfg.service_port = port;
        }
        if let Some(range) = lookup("LABVISOR_PORT_RANGE") {
            cfg.port_range = Some(parse_port_range(&range)?);
        }
        if let Some(bin) = lookup("LABVISOR_DOCKER_BINARY") {
            cfg.docker_binary = bin;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "LABVISOR_COMMAND_TIMEOUT_SECS")? {
            cfg.command_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("LABVISOR_STORE_PATH") {
            cfg.store_path = PathBuf::from(path);
        }
        if let Some(author) = lookup("LABVISOR_COMMIT_AUTHOR") {
            cfg.commit_author = author;
        }
        if let Some(flag) = parse_var::<bool>(&lookup, "LABVISOR_ROLLBACK_ON_PERSIST_FAILURE")? {
            cfg.rollback_on_persist_failure = flag;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.task_service_url.is_empty() {
            return Err(config_error("task service URL must not be empty"));
        }
        if self.service_port == 0 {
            return Err(config_error("service port must be non-zero"));
        }
        if self.command_timeout.is_zero() || self.catalog_timeout.is_zero() {
            return Err(config_error("timeouts must be non-zero"));
        }
        if let Some(range) = &self.port_range {
            if *range.start() == 0 || range.is_empty() {
                return Err(config_error(format!(
                    "port range {}-{} is invalid",
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| config_error(format!("{key} has invalid value {raw:?}")))
        })
        .transpose()
}

/// Parses a `start-end` port range.
///
/// # Errors
///
/// Returns [`LabError::Config`] if the bounds are missing, non-numeric, or reversed.
pub fn parse_port_range(raw: &str) -> Result<RangeInclusive<u16>> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| config_error(format!("port range {raw:?} must look like START-END")))?;
    let start: u16 = start
        .trim()
        .parse()
        .map_err(|_| config_error(format!("invalid port range start in {raw:?}")))?;
    let end: u16 = end
        .trim()
        .parse()
        .map_err(|_| config_error(format!("invalid port range end in {raw:?}")))?;
    if start == 0 || start > end {
        return Err(config_error(format!("port range {raw:?} is empty or starts at 0")));
    }
    Ok(start..=end)
}

fn config_error(message: impl Into<String>) -> LabError {
    LabError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let cfg = LabvisorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.task_service_url, "http://localhost:8086");
        assert_eq!(cfg.service_port, 7681);
        assert_eq!(cfg.catalog_timeout, Duration::from_secs(10));
        assert!(cfg.rollback_on_persist_failure);
        assert!(cfg.port_range.is_none());
    }

    #[test]
    fn legacy_task_service_variable_is_honoured() {
        let cfg =
            LabvisorConfig::from_lookup(lookup_from(&[("TASK_SERVICE_URL", "http://tasks:9000")]))
                .unwrap();
        assert_eq!(cfg.task_service_url, "http://tasks:9000");
    }

    #[test]
    fn prefixed_variable_wins_over_legacy() {
        let cfg = LabvisorConfig::from_lookup(lookup_from(&[
            ("TASK_SERVICE_URL", "http://old"),
            ("LABVISOR_TASK_SERVICE_URL", "http://new"),
        ]))
        .unwrap();
        assert_eq!(cfg.task_service_url, "http://new");
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = LabvisorConfig::from_lookup(lookup_from(&[
            ("LABVISOR_PORT_RANGE", "20000-20010"),
            ("LABVISOR_COMMAND_TIMEOUT_SECS", "30"),
            ("LABVISOR_ROLLBACK_ON_PERSIST_FAILURE", "false"),
            ("LABVISOR_STORE_PATH", "/tmp/labs.json"),
        ]))
        .unwrap();
        assert_eq!(cfg.port_range, Some(20000..=20010));
        assert_eq!(cfg.command_timeout, Duration::from_secs(30));
        assert!(!cfg.rollback_on_persist_failure);
        assert_eq!(cfg.store_path, PathBuf::from("/tmp/labs.json"));
    }

    #[test]
    fn invalid_number_is_config_error() {
        let err = LabvisorConfig::from_lookup(lookup_from(&[("LABVISOR_SERVICE_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, LabError::Config { .. }));
        assert!(err.to_string().contains("LABVISOR_SERVICE_PORT"));
    }

    #[test]
    fn reversed_port_range_is_rejected() {
        assert!(parse_port_range("9000-8000").is_err());
        assert!(parse_port_range("0-10").is_err());
        assert!(parse_port_range("8000").is_err());
        assert_eq!(parse_port_range(" 8000 - 8001 ").unwrap(), 8000..=8001);
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let cfg = LabvisorConfig {
            command_timeout: Duration::ZERO,
            ..LabvisorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
