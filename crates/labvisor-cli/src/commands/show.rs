//! `labctl show`: Show one lab.

use clap::Args;
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `show` command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Lab to show.
    pub lab: u64,
}

/// Executes the `show` command.
///
/// # Errors
///
/// Returns an error if the lab is unknown.
pub fn execute(args: ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let lab = ctx.orchestrator.get_lab(LabId::new(args.lab))?;
    output::lab(&lab, ctx.json)
}
