//! `labctl update`: Change a lab's title or image.

use clap::Args;
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `update` command.
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("changes").required(true).multiple(true).args(["title", "commit_image"])))]
pub struct UpdateArgs {
    /// Lab to update.
    pub lab: u64,

    /// New display title.
    #[arg(long)]
    pub title: Option<String>,

    /// New recorded image, used by `recreate`.
    #[arg(long)]
    pub commit_image: Option<String>,
}

/// Executes the `update` command.
///
/// # Errors
///
/// Returns an error if the lab is unknown or cannot be stored.
pub fn execute(args: UpdateArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut lab = ctx.orchestrator.get_lab(LabId::new(args.lab))?;
    if let Some(title) = args.title {
        lab.title = title;
    }
    if let Some(image) = args.commit_image {
        lab.commit_image = image;
    }
    let stored = ctx.orchestrator.update_lab(&lab, &ctx.cancel)?;
    output::lab(&stored, ctx.json)
}
