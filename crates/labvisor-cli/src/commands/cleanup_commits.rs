//! `labctl cleanup-commits`: Delete every snapshot image of a container.

use clap::Args;

use crate::context::Context;
use crate::output;

/// Arguments for the `cleanup-commits` command.
#[derive(Args, Debug)]
pub struct CleanupCommitsArgs {
    /// Container whose snapshots are deleted.
    pub container: String,
}

/// Executes the `cleanup-commits` command.
///
/// # Errors
///
/// Returns an error if the images cannot be listed or some could not be
/// removed.
pub fn execute(args: CleanupCommitsArgs, ctx: &Context) -> anyhow::Result<()> {
    ctx.orchestrator
        .delete_container_commits(&args.container, &ctx.cancel)?;
    output::message(
        ctx.json,
        &format!("snapshots of {} deleted", args.container),
        &serde_json::json!({ "container": args.container, "deleted": true }),
    )
}
