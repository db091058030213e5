//! `labctl stop`: Stop a running lab.

use clap::Args;
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Lab to stop.
    pub lab: u64,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the lab is unknown, has no container, or the
/// engine fails to stop it.
pub fn execute(args: StopArgs, ctx: &Context) -> anyhow::Result<()> {
    let id = LabId::new(args.lab);
    ctx.orchestrator.stop_lab(id, &ctx.cancel)?;
    output::message(
        ctx.json,
        &format!("lab {id} stopped"),
        &serde_json::json!({ "lab_id": id, "status": "stopped" }),
    )
}
