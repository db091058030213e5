//! `DockerCli` against a scripted stand-in for the engine binary.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use labvisor_common::error::LabError;
use labvisor_runtime::{CancelToken, CommitSpec, ContainerRuntime, DockerCli, RunSpec};

const ENGINE: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
case "$1" in
  run) echo "4f1c2a9b7e3d0c5a8b6e2f1d9c7a3b5e" ;;
  inspect) echo "false" ;;
  port) printf '0.0.0.0:49153\n[::]:49153\n' ;;
  images) printf 'aaa\nbbb\naaa\n' ;;
  exec) sh -c "$5" ;;
  stop) echo "Error response from daemon: No such container: $2" >&2; exit 1 ;;
  *) echo "$2" ;;
esac
"#;

fn install_engine(dir: &Path) -> PathBuf {
    let path = dir.join("fake-docker");
    fs::write(&path, ENGINE).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

// One test drives every scenario so no other test thread forks while the
// script file is being written.
#[test]
fn engine_commands_and_output_handling() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = install_engine(dir.path());
    let cli = DockerCli::new(engine.to_string_lossy(), Duration::from_secs(10));
    let cancel = CancelToken::new();

    assert!(cli.is_available());

    let id = cli
        .run(
            &RunSpec {
                name: "lab_42_x".into(),
                image: "alpine:lab-base".into(),
                host_port: 40001,
                container_port: 7681,
                extra_args: vec![],
            },
            &cancel,
        )
        .unwrap();
    assert_eq!(id, "4f1c2a9b7e3d0c5a8b6e2f1d9c7a3b5e");

    assert_eq!(cli.start("lab_42_x", &cancel).unwrap(), "lab_42_x");
    assert!(!cli.is_running("lab_42_x", &cancel).unwrap());
    assert_eq!(cli.published_port("lab_42_x", 7681, &cancel).unwrap(), Some(49153));
    assert_eq!(
        cli.list_images("lab_42_x-snapshot-*", &cancel).unwrap(),
        vec!["aaa", "bbb"]
    );
    cli.remove_image("aaa", true, &cancel).unwrap();
    cli.commit(
        &CommitSpec {
            source: "lab_42_x".into(),
            target: "lab_42_x-snapshot-20240101-000000:latest".into(),
            author: "lab-system".into(),
            message: "Autocommit of lab_42_x at 20240101-000000".into(),
        },
        &cancel,
    )
    .unwrap();

    let out = cli.exec("lab_42_x", "echo out; echo err >&2; exit 3", &cancel).unwrap();
    assert_eq!(out.exit_code, Some(3));
    assert!(out.output.contains("out"));
    assert!(out.output.contains("err"));

    let err = cli.stop("lab_42_x", &cancel).unwrap_err();
    match err {
        LabError::Runtime { operation, output, .. } => {
            assert_eq!(operation, "stop");
            assert!(output.contains("No such container: lab_42_x"));
        }
        other => panic!("expected runtime error, got {other:?}"),
    }

    let log = calls(dir.path());
    assert_eq!(log[0], "run -dit --name lab_42_x -p 40001:7681 alpine:lab-base");
    assert!(log.contains(&"inspect --format {{.State.Running}} lab_42_x".to_string()));
    assert!(log.contains(&"port lab_42_x 7681/tcp".to_string()));
    assert!(log.contains(&"rmi -f aaa".to_string()));
    assert!(log.iter().any(|l| l.starts_with("commit -a lab-system -m Autocommit of lab_42_x")));

    let cancelled = CancelToken::new();
    cancelled.cancel();
    let err = cli.start("lab_42_x", &cancelled).unwrap_err();
    assert!(matches!(err, LabError::Cancelled { operation: "start", .. }));
}
