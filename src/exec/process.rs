//! Bounded external tool invocation
//!
//! Both adapters run one child process per call. The child is killed when the
//! timeout expires or the future is dropped.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Why a tool invocation did not produce output
#[derive(Debug)]
pub enum RunFailure {
    Spawn(std::io::Error),
    Timeout,
}

/// Substitute `{name}` placeholders in argument templates
pub fn render_args(templates: &[String], vars: &[(&str, String)]) -> Vec<String> {
    templates
        .iter()
        .map(|template| {
            vars.iter().fold(template.clone(), |arg, (name, value)| {
                arg.replace(&format!("{{{name}}}"), value)
            })
        })
        .collect()
}

/// Run a program to completion, capturing stdout and stderr
pub async fn run(program: &Path, args: &[String], limit: Duration) -> Result<Output, RunFailure> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(RunFailure::Spawn)?;

    match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(RunFailure::Spawn(e)),
        // Dropping the wait future drops the child, which kills it.
        Err(_) => Err(RunFailure::Timeout),
    }
}

/// Forward-slash form of a path for tool arguments
pub fn arg_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
