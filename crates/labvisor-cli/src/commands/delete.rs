//! `labctl delete`: Tear down a lab and forget it.

use clap::Args;
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Lab to delete.
    pub lab: u64,

    /// Also delete the snapshot images of the lab's container.
    #[arg(long)]
    pub purge_snapshots: bool,
}

/// Executes the `delete` command.
///
/// The lab record is only removed once its container is gone. Snapshot
/// purging runs after that and does not bring the lab back on failure.
///
/// # Errors
///
/// Returns an error if teardown fails or some snapshots cannot be removed.
pub fn execute(args: DeleteArgs, ctx: &Context) -> anyhow::Result<()> {
    let id = LabId::new(args.lab);
    let container = ctx.orchestrator.get_lab(id)?.container_name;
    ctx.orchestrator.delete_lab(id, &ctx.cancel)?;

    if args.purge_snapshots && !container.is_empty() {
        ctx.orchestrator
            .delete_container_commits(container.as_str(), &ctx.cancel)?;
    }

    output::message(
        ctx.json,
        &format!("lab {id} deleted"),
        &serde_json::json!({ "lab_id": id, "deleted": true }),
    )
}
