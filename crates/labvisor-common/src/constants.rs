//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for Labvisor data when no home directory is usable.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/labvisor";

/// Returns the data directory, preferring `$HOME/.labvisor` and falling
/// back to `/var/lib/labvisor`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        let user_dir = PathBuf::from(home).join(".labvisor");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default lab store path.
pub fn default_store_path() -> PathBuf {
    data_dir().join("labs.json")
}

/// Default URL of the task catalog service.
pub const DEFAULT_TASK_SERVICE_URL: &str = "http://localhost:8086";

/// Default timeout for one task catalog lookup, in seconds.
pub const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 10;

/// Host name advertised in lab access URLs.
pub const DEFAULT_PUBLIC_HOST: &str = "localhost";

/// Port the terminal service listens on inside every lab container.
pub const DEFAULT_SERVICE_PORT: u16 = 7681;

/// Container engine binary invoked by the runtime client.
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Default deadline for one container engine invocation, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Author recorded on snapshot images.
pub const DEFAULT_COMMIT_AUTHOR: &str = "lab-system";

/// Prefix of every lab container name.
pub const CONTAINER_NAME_PREFIX: &str = "lab_";

/// `chrono` format of the timestamp embedded in container names.
pub const CONTAINER_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Separator between a container name and its snapshot timestamp.
pub const SNAPSHOT_INFIX: &str = "-snapshot-";

/// `chrono` format of the timestamp embedded in snapshot image names.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Tag appended to snapshot image names without an explicit tag.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Shell used to run submitted commands inside a container.
pub const CONTAINER_SHELL: &str = "sh";

/// Application name used in CLI output.
pub const APP_NAME: &str = "labvisor";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "labctl";
