//! `labctl start`: Start a stopped lab.

use clap::Args;
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `start` command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Lab to start.
    pub lab: u64,
}

/// Executes the `start` command.
///
/// # Errors
///
/// Returns an error if the lab is unknown, has no container, or the
/// engine fails to start it.
pub fn execute(args: StartArgs, ctx: &Context) -> anyhow::Result<()> {
    let id = LabId::new(args.lab);
    let container = ctx.orchestrator.start_lab(id, &ctx.cancel)?;
    output::message(
        ctx.json,
        &format!("lab {id} started ({container})"),
        &serde_json::json!({ "lab_id": id, "container": container }),
    )
}
