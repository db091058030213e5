//! `labctl exec`: Run a shell command inside a lab container.

use clap::Args;
use labvisor_common::error::LabError;
use labvisor_common::types::LabId;

use crate::context::Context;
use crate::output;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container name or ID, or a lab ID with `--lab`.
    pub target: String,

    /// Treat the target as a lab ID.
    #[arg(long)]
    pub lab: bool,

    /// Command to execute; joined with spaces and run by `sh -c`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// Prints the command's combined output and exits with its status.
///
/// # Errors
///
/// Returns an error if the target cannot be resolved or the engine cannot
/// run the command.
pub fn execute(args: ExecArgs, ctx: &Context) -> anyhow::Result<()> {
    let result = if args.lab {
        let id: u64 = args
            .target
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid lab ID {:?}", args.target))?;
        ctx.orchestrator
            .execute_in_lab(LabId::new(id), &args.command, &ctx.cancel)
    } else {
        ctx.orchestrator
            .execute_command(&args.target, &args.command, &ctx.cancel)
    };

    match result {
        Ok(out) => output::exec_output(ctx.json, &out, Some(0)),
        Err(LabError::CommandFailed {
            output: out,
            exit_code,
            ..
        }) => {
            output::exec_output(ctx.json, &out, exit_code)?;
            std::process::exit(exit_code.unwrap_or(1));
        }
        Err(e) => Err(e.into()),
    }
}
