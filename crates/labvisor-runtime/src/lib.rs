//! Container engine access for Labvisor labs.
//!
//! - [`backend`]: the [`ContainerRuntime`](backend::ContainerRuntime) trait and
//!   the Docker CLI implementation.
//! - [`command`]: out-of-process execution with combined output, cancellation,
//!   and deadlines.
//! - [`port`]: host port allocation for published services.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod backend;
pub mod cancel;
pub mod command;
pub mod exec;
pub mod port;

pub use backend::docker::DockerCli;
pub use backend::{CommitSpec, ContainerRuntime, RunSpec};
pub use cancel::CancelToken;
pub use exec::ExecOutput;
pub use port::{LocalPortAllocator, PortAllocator};
