//! CLI command definitions and dispatch.

pub mod cleanup_commits;
pub mod commit;
pub mod create;
pub mod delete;
pub mod exec;
pub mod list;
pub mod recreate;
pub mod show;
pub mod start;
pub mod stop;
pub mod update;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::context::Context;

/// Labvisor: per-task lab containers on a single host.
#[derive(Parser, Debug)]
#[command(name = "labctl", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Options shared by every subcommand.
///
/// Each one overrides the matching `LABVISOR_*` environment variable.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the lab store file.
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Base URL of the task catalog service.
    #[arg(long, global = true, value_name = "URL")]
    pub task_service_url: Option<String>,

    /// Host name used in lab access URLs.
    #[arg(long, global = true, value_name = "HOST")]
    pub public_host: Option<String>,

    /// Container engine binary.
    #[arg(long, global = true, value_name = "PATH")]
    pub docker_binary: Option<String>,

    /// Host port range for lab services, e.g. `40000-40999`.
    #[arg(long, global = true, value_name = "START-END")]
    pub port_range: Option<String>,

    /// Extra argument appended to every container launch (repeatable).
    #[arg(long = "launch-arg", global = true, value_name = "ARG", allow_hyphen_values = true)]
    pub launch_args: Vec<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a new lab for a task.
    Create(create::CreateArgs),
    /// Launch a new lab from a lab's snapshot image.
    Recreate(recreate::RecreateArgs),
    /// Start a stopped lab.
    Start(start::StartArgs),
    /// Stop a running lab.
    Stop(stop::StopArgs),
    /// Tear down a lab and forget it.
    Delete(delete::DeleteArgs),
    /// Snapshot a running container into an image.
    Commit(commit::CommitArgs),
    /// Delete every snapshot image of a container.
    CleanupCommits(cleanup_commits::CleanupCommitsArgs),
    /// Run a shell command inside a lab container.
    Exec(exec::ExecArgs),
    /// List labs.
    List(list::ListArgs),
    /// Show one lab.
    Show(show::ShowArgs),
    /// Change a lab's title or image.
    Update(update::UpdateArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::load(&cli.global)?;
    match cli.command {
        Command::Create(args) => create::execute(args, &ctx),
        Command::Recreate(args) => recreate::execute(args, &ctx),
        Command::Start(args) => start::execute(args, &ctx),
        Command::Stop(args) => stop::execute(args, &ctx),
        Command::Delete(args) => delete::execute(args, &ctx),
        Command::Commit(args) => commit::execute(args, &ctx),
        Command::CleanupCommits(args) => cleanup_commits::execute(args, &ctx),
        Command::Exec(args) => exec::execute(args, &ctx),
        Command::List(args) => list::execute(args, &ctx),
        Command::Show(args) => show::execute(args, &ctx),
        Command::Update(args) => update::execute(args, &ctx),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use labvisor_common::config::LabvisorConfig;

    use super::*;
    use crate::context::apply_overrides;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "labctl",
            "create",
            "42",
            "--image",
            "alpine:lab-base",
            "--json",
            "--store",
            "/tmp/labs.json",
        ])
        .unwrap();
        assert!(cli.global.json);
        assert_eq!(cli.global.store, Some(PathBuf::from("/tmp/labs.json")));
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.task, 42);
                assert_eq!(args.image.as_deref(), Some("alpine:lab-base"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn launch_args_accept_leading_hyphens() {
        let cli = Cli::try_parse_from([
            "labctl",
            "--launch-arg",
            "ttyd",
            "--launch-arg",
            "-W",
            "list",
        ])
        .unwrap();
        assert_eq!(cli.global.launch_args, vec!["ttyd".to_string(), "-W".to_string()]);
    }

    #[test]
    fn commit_requires_a_target() {
        assert!(Cli::try_parse_from(["labctl", "commit"]).is_err());
        assert!(Cli::try_parse_from(["labctl", "commit", "lab_1_x", "--write-back", "3"]).is_err());
        assert!(Cli::try_parse_from(["labctl", "commit", "--write-back", "3"]).is_ok());
    }

    #[test]
    fn exec_keeps_command_hyphens() {
        let cli = Cli::try_parse_from(["labctl", "exec", "lab_1_x", "ls", "-la", "/tmp"]).unwrap();
        match cli.command {
            Command::Exec(args) => {
                assert_eq!(args.target, "lab_1_x");
                assert_eq!(args.command, vec!["ls", "-la", "/tmp"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_environment_values() {
        let args = GlobalArgs {
            store: Some(PathBuf::from("/srv/labs.json")),
            task_service_url: Some("http://tasks:9000".into()),
            port_range: Some("40000-40010".into()),
            ..GlobalArgs::default()
        };
        let config = apply_overrides(LabvisorConfig::default(), &args).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/srv/labs.json"));
        assert_eq!(config.task_service_url, "http://tasks:9000");
        assert_eq!(config.port_range, Some(40000..=40010));
    }

    #[test]
    fn malformed_port_range_is_rejected() {
        let args = GlobalArgs {
            port_range: Some("40010-40000".into()),
            ..GlobalArgs::default()
        };
        assert!(apply_overrides(LabvisorConfig::default(), &args).is_err());
    }
}
