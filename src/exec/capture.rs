//! Renderer capture adapter

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::capability::Capability;
use super::process::{self, arg_path, RunFailure};
use crate::catalog::Viewport;
use crate::common::config::ToolConfig;
use crate::common::{paths, truncate_diagnostic, Error, Result};

/// Max chars of renderer stderr kept in a failure
const STDERR_LIMIT: usize = 300;

/// What to render and where to put it
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub document: PathBuf,
    pub viewport: Viewport,
    pub frame: PathBuf,
    pub layout: PathBuf,
}

/// Produces a frame (and layout dump) for a document at a viewport
#[async_trait]
pub trait CaptureAdapter: Send + Sync {
    async fn capture(&self, request: &CaptureRequest, timeout: Duration) -> Result<()>;
}

/// Capture through an external renderer program
pub struct CommandCapture {
    capability: Capability,
    args: Vec<String>,
}

impl CommandCapture {
    pub fn new(config: &ToolConfig, capability: Capability) -> Self {
        Self {
            capability,
            args: config.args.clone(),
        }
    }

    /// Probe the configured program and build the adapter
    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config, Capability::probe("capture", &config.program))
    }
}

#[async_trait]
impl CaptureAdapter for CommandCapture {
    async fn capture(&self, request: &CaptureRequest, timeout: Duration) -> Result<()> {
        let program = self.capability.program()?;

        for path in [&request.frame, &request.layout] {
            if let Some(parent) = path.parent() {
                paths::ensure_dir(parent)?;
            }
        }

        let args = process::render_args(
            &self.args,
            &[
                ("document", arg_path(&request.document)),
                ("width", request.viewport.width.to_string()),
                ("height", request.viewport.height.to_string()),
                ("frame", arg_path(&request.frame)),
                ("layout", arg_path(&request.layout)),
            ],
        );

        tracing::debug!(program = %program.display(), ?args, "Running capture");

        let output = match process::run(program, &args, timeout).await {
            Ok(output) => output,
            Err(RunFailure::Timeout) => return Err(Error::CaptureTimeout(timeout)),
            Err(RunFailure::Spawn(e)) => {
                return Err(Error::CaptureFailed(format!(
                    "could not start {}: {}",
                    program.display(),
                    e
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CaptureFailed(format!(
                "{}: {}",
                output.status,
                truncate_diagnostic(stderr.trim(), STDERR_LIMIT)
            )));
        }

        if !request.frame.exists() {
            return Err(Error::CaptureFailed(
                "renderer exited successfully but wrote no frame".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dir: &std::path::Path) -> CaptureRequest {
        CaptureRequest {
            document: PathBuf::from("case.html"),
            viewport: Viewport::new(4, 4),
            frame: dir.join("capture").join("frame.ppm"),
            layout: dir.join("capture").join("layout.json"),
        }
    }

    #[tokio::test]
    async fn test_unavailable_tool_fails_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CommandCapture::new(
            &ToolConfig {
                program: "missing".to_string(),
                args: vec![],
                timeout_secs: 1,
            },
            Capability::Unavailable {
                tool: "capture".to_string(),
                reason: "'missing' not found in PATH".to_string(),
            },
        );

        for _ in 0..2 {
            let err = adapter
                .capture(&request(dir.path()), Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ToolUnavailable { .. }));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_frame_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolConfig {
            program: "true".to_string(),
            args: vec![],
            timeout_secs: 5,
        };
        let adapter = CommandCapture::from_config(&config);
        if !adapter.capability.is_available() {
            return;
        }

        let err = adapter
            .capture(&request(dir.path()), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CaptureFailed(msg) if msg.contains("no frame")));
        // Output directories are created before the renderer runs
        assert!(dir.path().join("capture").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolConfig {
            program: "sleep".to_string(),
            args: vec!["5".to_string()],
            timeout_secs: 1,
        };
        let adapter = CommandCapture::from_config(&config);
        if !adapter.capability.is_available() {
            return;
        }

        let err = adapter
            .capture(&request(dir.path()), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().ends_with("200ms"), "{err}");
    }
}
