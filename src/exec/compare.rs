//! Baseline comparison adapter
//!
//! The comparison tool prints one JSON object (camelCase keys) as the last
//! line of stdout and writes diff, heatmap, overlay and attribution artifacts
//! into the output directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::capability::Capability;
use super::process::{self, arg_path, RunFailure};
use crate::common::config::ToolConfig;
use crate::common::{paths, truncate_diagnostic, Error, Result};

const STDERR_LIMIT: usize = 300;

/// Root-cause bucket name to percentage of diff pixels
pub type Taxonomy = BTreeMap<String, f64>;

/// An element responsible for part of the diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub diff_pixels: u64,
    #[serde(default)]
    pub contribution_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likely_cause: Option<String>,
    /// Share of the element's diff pixels near its corners
    #[serde(default)]
    pub corner_ratio: f64,
}

/// Inputs for one comparison
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub baseline: PathBuf,
    pub frame: PathBuf,
    pub out_dir: PathBuf,
    pub rects: Option<PathBuf>,
    pub styles: Option<PathBuf>,
}

/// Parsed comparison result
#[derive(Debug, Clone, PartialEq)]
pub struct CompareOutput {
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub top_contributors: Option<Vec<Contributor>>,
    pub taxonomy: Option<Taxonomy>,
}

/// Wire shape of the tool's JSON line
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolReport {
    error: Option<String>,
    diff_percent: Option<f64>,
    diff_pixels: Option<u64>,
    total_pixels: Option<u64>,
    top_contributors: Option<Vec<Contributor>>,
    taxonomy: Option<Taxonomy>,
}

impl CompareOutput {
    /// Parse the tool's stdout, using the last line that is a JSON object
    pub fn parse(stdout: &str) -> Result<Self> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| l.starts_with('{'))
            .ok_or_else(|| Error::CompareFailed("no JSON result in tool output".to_string()))?;

        let report: ToolReport = serde_json::from_str(line)
            .map_err(|e| Error::CompareFailed(format!("unreadable tool result: {e}")))?;

        if let Some(error) = report.error.filter(|e| !e.is_empty()) {
            return Err(Error::CompareFailed(error));
        }

        let diff_percent = report
            .diff_percent
            .ok_or_else(|| Error::CompareFailed("tool result has no diffPercent".to_string()))?;

        Ok(Self {
            diff_percent,
            diff_pixels: report.diff_pixels.unwrap_or(0),
            total_pixels: report.total_pixels.unwrap_or(0),
            top_contributors: report.top_contributors,
            taxonomy: report.taxonomy,
        })
    }
}

/// Compares a captured frame against a baseline image
#[async_trait]
pub trait CompareAdapter: Send + Sync {
    async fn compare(&self, request: &CompareRequest, timeout: Duration) -> Result<CompareOutput>;
}

/// Comparison through an external program
pub struct CommandCompare {
    capability: Capability,
    args: Vec<String>,
}

impl CommandCompare {
    pub fn new(config: &ToolConfig, capability: Capability) -> Self {
        Self {
            capability,
            args: config.args.clone(),
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config, Capability::probe("compare", &config.program))
    }
}

#[async_trait]
impl CompareAdapter for CommandCompare {
    async fn compare(&self, request: &CompareRequest, timeout: Duration) -> Result<CompareOutput> {
        let program = self.capability.program()?;
        paths::ensure_dir(&request.out_dir)?;

        let optional = |p: &Option<PathBuf>| {
            p.as_deref()
                .filter(|p| p.exists())
                .map(arg_path)
                .unwrap_or_default()
        };

        let args = process::render_args(
            &self.args,
            &[
                ("baseline", arg_path(&request.baseline)),
                ("frame", arg_path(&request.frame)),
                ("out_dir", arg_path(&request.out_dir)),
                ("rects", optional(&request.rects)),
                ("styles", optional(&request.styles)),
            ],
        );

        tracing::debug!(program = %program.display(), ?args, "Running compare");

        let output = match process::run(program, &args, timeout).await {
            Ok(output) => output,
            Err(RunFailure::Timeout) => return Err(Error::CompareTimeout(timeout)),
            Err(RunFailure::Spawn(e)) => {
                return Err(Error::CompareFailed(format!(
                    "could not start {}: {}",
                    program.display(),
                    e
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CompareFailed(format!(
                "{}: {}",
                output.status,
                truncate_diagnostic(stderr.trim(), STDERR_LIMIT)
            )));
        }

        CompareOutput::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_json_line() {
        let stdout = r#"loading baseline...
{"diffPercent": 99}
{"diffPercent": 4.25, "diffPixels": 20400, "totalPixels": 480000, "taxonomy": {"text": 60.0, "box_model": 40.0}, "topContributors": [{"selector": "div.card", "tag": "div", "diff_pixels": 900, "contribution_percent": 4.4, "likely_cause": "box_model", "corner_ratio": 0.7}]}
"#;
        let out = CompareOutput::parse(stdout).unwrap();
        assert_eq!(out.diff_percent, 4.25);
        assert_eq!(out.diff_pixels, 20400);
        assert_eq!(out.total_pixels, 480000);
        assert_eq!(out.taxonomy.as_ref().unwrap()["text"], 60.0);
        let top = out.top_contributors.unwrap();
        assert_eq!(top[0].selector, "div.card");
        assert_eq!(top[0].likely_cause.as_deref(), Some("box_model"));
    }

    #[test]
    fn test_parse_error_field() {
        let err = CompareOutput::parse(r#"{"error": "size mismatch"}"#).unwrap_err();
        assert!(matches!(err, Error::CompareFailed(msg) if msg == "size mismatch"));
    }

    #[test]
    fn test_parse_without_json() {
        assert!(CompareOutput::parse("Segmentation fault\n").is_err());
        assert!(CompareOutput::parse(r#"{"diffPixels": 3}"#).is_err());
    }

    #[tokio::test]
    async fn test_unavailable_tool() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CommandCompare::new(
            &ToolConfig {
                program: "node".to_string(),
                args: vec![],
                timeout_secs: 1,
            },
            Capability::Unavailable {
                tool: "compare".to_string(),
                reason: "'node' not found in PATH".to_string(),
            },
        );
        let request = CompareRequest {
            baseline: dir.path().join("baseline.png"),
            frame: dir.path().join("frame.ppm"),
            out_dir: dir.path().join("diff"),
            rects: None,
            styles: None,
        };
        let err = adapter
            .compare(&request, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolUnavailable { .. }));
    }
}
