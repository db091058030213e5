//! Formatted output helpers for CLI commands.
//!
//! Every helper prints either a human-readable rendering or, in JSON mode,
//! one pretty-printed JSON document on stdout.

#![allow(clippy::print_stdout)]

use labvisor_common::types::{Lab, LabStatus};
use labvisor_orchestrator::CreatedLab;
use serde::Serialize;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Prints `value` as pretty JSON.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a one-line confirmation, or `value` in JSON mode.
///
/// # Errors
///
/// Returns an error if the JSON value cannot be serialized.
pub fn message(as_json: bool, text: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    if as_json {
        return json(value);
    }
    println!("{text}");
    Ok(())
}

/// Prints the result of a lab creation.
///
/// # Errors
///
/// Returns an error if the JSON value cannot be serialized.
pub fn created(lab: &CreatedLab, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(lab);
    }
    println!("{GREEN}●{RESET} lab {BOLD}{}{RESET} created", lab.lab_id);
    println!("  container  {} {DIM}[{}]{RESET}", lab.container_name, short_id(&lab.container_id));
    println!("  access     {BOLD}{}{RESET}", lab.access_url);
    Ok(())
}

/// Prints every field of one lab.
///
/// # Errors
///
/// Returns an error if the JSON value cannot be serialized.
pub fn lab(lab: &Lab, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(lab);
    }
    println!("{:<11} {}", "ID", lab.id);
    println!("{:<11} {}", "TASK", lab.task_id);
    println!("{:<11} {}", "TITLE", or_dash(&lab.title));
    println!("{:<11} {}", "STATUS", status_label(lab.status));
    println!("{:<11} {}", "CONTAINER", or_dash(lab.container_name.as_str()));
    println!("{:<11} {}", "ID (ENGINE)", or_dash(&lab.container_id));
    println!("{:<11} {}", "ACCESS", or_dash(&lab.access_url));
    println!("{:<11} {}", "IMAGE", or_dash(&lab.commit_image));
    println!("{:<11} {}", "CREATED", lab.created_at.to_rfc3339());
    println!("{:<11} {}", "UPDATED", lab.updated_at.to_rfc3339());
    Ok(())
}

/// Prints labs as a table.
///
/// # Errors
///
/// Returns an error if the JSON value cannot be serialized.
pub fn labs(labs: &[Lab], as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(labs);
    }
    if labs.is_empty() {
        println!("No labs found.");
        return Ok(());
    }
    println!(
        "{:<6} {:<8} {:<10} {:<32} {:<28} {}",
        "ID", "TASK", "STATUS", "CONTAINER", "ACCESS", "IMAGE"
    );
    for lab in labs {
        println!(
            "{:<6} {:<8} {:<10} {:<32} {:<28} {}",
            lab.id.to_string(),
            lab.task_id.to_string(),
            lab.status.to_string(),
            or_dash(lab.container_name.as_str()),
            or_dash(&lab.access_url),
            or_dash(&lab.commit_image),
        );
    }
    Ok(())
}

/// Prints the output of a command run inside a container.
///
/// # Errors
///
/// Returns an error if the JSON value cannot be serialized.
pub fn exec_output(as_json: bool, output: &str, exit_code: Option<i32>) -> anyhow::Result<()> {
    if as_json {
        return json(&serde_json::json!({ "output": output, "exit_code": exit_code }));
    }
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn status_label(status: LabStatus) -> String {
    match status {
        LabStatus::Running => format!("{GREEN}{status}{RESET}"),
        LabStatus::Stopped => format!("{YELLOW}{status}{RESET}"),
        LabStatus::Pending => format!("{DIM}{status}{RESET}"),
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Shortens an engine container ID to the usual 12 characters.
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_long_ids() {
        assert_eq!(
            short_id("4f1c2a9b7e3d0c5a8b6e2f1d9c7a3b5e"),
            "4f1c2a9b7e3d"
        );
    }

    #[test]
    fn short_id_keeps_short_ids() {
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn empty_fields_render_as_dash() {
        assert_eq!(or_dash(""), "-");
        assert_eq!(or_dash("x"), "x");
    }

    #[test]
    fn status_label_wraps_status_name() {
        assert!(status_label(LabStatus::Stopped).contains("stopped"));
    }
}
