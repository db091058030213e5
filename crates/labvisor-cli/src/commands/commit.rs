//! `labctl commit`: Snapshot a running container into an image.

use clap::{ArgGroup, Args};
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["container", "write_back"])))]
pub struct CommitArgs {
    /// Container to snapshot; no lab record is changed.
    pub container: Option<String>,

    /// Snapshot this lab's container and record the image on the lab.
    #[arg(long, value_name = "LAB_ID")]
    pub write_back: Option<u64>,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the container is not running or the commit fails.
pub fn execute(args: CommitArgs, ctx: &Context) -> anyhow::Result<()> {
    let image = match (args.write_back, args.container) {
        (Some(lab), _) => ctx
            .orchestrator
            .commit_and_record(LabId::new(lab), &ctx.cancel)?,
        (None, Some(container)) => ctx.orchestrator.commit_lab(&container, &ctx.cancel)?,
        (None, None) => anyhow::bail!("either a container or --write-back is required"),
    };
    output::message(ctx.json, &image, &serde_json::json!({ "image": image }))
}
