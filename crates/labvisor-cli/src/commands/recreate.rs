//! `labctl recreate`: Launch a new lab from another lab's snapshot.

use clap::Args;
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `recreate` command.
#[derive(Args, Debug)]
pub struct RecreateArgs {
    /// Lab whose task and title the new lab inherits.
    pub lab: u64,

    /// Snapshot image to launch; defaults to the lab's recorded image.
    #[arg(long)]
    pub image: Option<String>,
}

/// Executes the `recreate` command.
///
/// # Errors
///
/// Returns an error if the source lab is unknown or the launch fails.
pub fn execute(args: RecreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let created = ctx.orchestrator.create_lab_from_commit(
        LabId::new(args.lab),
        args.image.as_deref(),
        &ctx.cancel,
    )?;
    output::created(&created, ctx.json)
}
