//! `labctl list`: List labs.

use clap::Args;
use labvisor_common::types::LabStatus;

use crate::context::Context;
use crate::output;

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show running labs.
    #[arg(short, long)]
    pub running: bool,
}

/// Executes the `list` command.
///
/// # Errors
///
/// Returns an error if the lab store cannot be read.
pub fn execute(args: ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let labs: Vec<_> = ctx
        .orchestrator
        .list_labs()?
        .into_iter()
        .filter(|lab| !args.running || lab.status == LabStatus::Running)
        .collect();
    output::labs(&labs, ctx.json)
}
