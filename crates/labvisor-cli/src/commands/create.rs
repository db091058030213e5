//! `labctl create`: Launch a new lab for a task.

use clap::Args;
use labvisor_common::types::TaskId;

use crate::context::Context;
use crate::output;

/// Arguments for the `create` command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Task the lab belongs to.
    pub task: u64,

    /// Image to launch; looked up in the task catalog when omitted.
    #[arg(long)]
    pub image: Option<String>,
}

/// Executes the `create` command.
///
/// # Errors
///
/// Returns an error if the image cannot be resolved, the container cannot
/// be launched, or the lab cannot be recorded.
pub fn execute(args: CreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let task = TaskId::new(args.task);
    let created = match args.image.as_deref() {
        Some(image) => ctx.orchestrator.create_lab(task, image, &ctx.cancel)?,
        None => ctx.orchestrator.create_lab_for_task(task, &ctx.cancel)?,
    };
    output::created(&created, ctx.json)
}
