//! Work unit executor

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::baseline::BaselineStore;
use super::blank::{analyze_frame, BlankAnalysis};
use super::capture::{CaptureAdapter, CaptureRequest, CommandCapture};
use super::compare::{CommandCompare, CompareAdapter, CompareRequest, Contributor, Taxonomy};
use super::{CaseResult, FailureKind};
use crate::common::config::{BlankFrameConfig, Config};
use crate::common::paths::ArtifactPaths;
use crate::work::{RunId, WorkUnit};

/// `attribution.json` as written by the comparison tool
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributionFile {
    taxonomy: Option<Taxonomy>,
    top_contributors: Option<Vec<Contributor>>,
}

/// Runs one work unit end to end
pub struct Executor {
    capture: Arc<dyn CaptureAdapter>,
    compare: Arc<dyn CompareAdapter>,
    baselines: BaselineStore,
    results_root: PathBuf,
    blank: BlankFrameConfig,
    capture_timeout: Duration,
    compare_timeout: Duration,
}

impl Executor {
    pub fn new(
        capture: Arc<dyn CaptureAdapter>,
        compare: Arc<dyn CompareAdapter>,
        baselines: BaselineStore,
        results_root: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        Self {
            capture,
            compare,
            baselines,
            results_root: results_root.into(),
            blank: config.blank.clone(),
            capture_timeout: Duration::from_secs(config.capture.timeout_secs),
            compare_timeout: Duration::from_secs(config.compare.timeout_secs),
        }
    }

    /// Executor backed by the configured external programs
    pub fn from_config(config: &Config, results_root: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(CommandCapture::from_config(&config.capture)),
            Arc::new(CommandCompare::from_config(&config.compare)),
            BaselineStore::new(&config.paths.baselines_root),
            results_root,
            config,
        )
    }

    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// Execute a unit; failures are recorded on the result, never raised
    pub async fn execute(&self, unit: &WorkUnit, run_id: &RunId) -> CaseResult {
        let mut result = CaseResult::pending(unit);
        let paths = ArtifactPaths::resolve(&self.results_root, run_id.as_str(), unit);

        // 1. Baseline
        let Some(baseline) = self.baselines.lookup(&unit.case_id, unit.category) else {
            result.fail(
                FailureKind::MissingBaseline,
                format!(
                    "No baseline for {}/{} under {}",
                    unit.category,
                    unit.case_id,
                    self.baselines.root().display()
                ),
            );
            return result;
        };

        // 2. Capture
        let request = CaptureRequest {
            document: unit.document.clone(),
            viewport: unit.viewport,
            frame: paths.frame.clone(),
            layout: paths.layout.clone(),
        };
        let started = Instant::now();
        let captured = self.capture.capture(&request, self.capture_timeout).await;
        result.capture_ms = elapsed_ms(started);

        if let Err(e) = captured {
            tracing::debug!(unit = %unit.key(), error = %e, "Capture failed");
            result.fail(FailureKind::CaptureFailure, e.to_string());
            return result;
        }

        // 3. Blank-frame gate, before any comparison
        let analysis = self.analyze(&paths.frame).await;
        result.background_ratio = Some(analysis.background_ratio);
        result.unique_colors = Some(analysis.unique_colors);

        if analysis.is_blank {
            let mut message = format!(
                "BLANK_FRAME: {:.1}% background, {} colors",
                analysis.background_ratio * 100.0,
                analysis.unique_colors
            );
            if let Some(err) = &analysis.error {
                message.push_str(&format!(" ({err})"));
            }
            result.fail(FailureKind::BlankFrame, message);
            return result;
        }

        // 4. Compare
        let request = CompareRequest {
            baseline: baseline.image,
            frame: paths.frame.clone(),
            out_dir: paths.diff_dir.clone(),
            rects: baseline.layout_rects,
            styles: baseline.computed_styles,
        };
        let started = Instant::now();
        let compared = self.compare.compare(&request, self.compare_timeout).await;
        result.compare_ms = elapsed_ms(started);

        let output = match compared {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(unit = %unit.key(), error = %e, "Compare failed");
                result.fail(FailureKind::CompareFailure, e.to_string());
                return result;
            }
        };

        result.diff_pct = output.diff_percent;
        result.diff_pixels = output.diff_pixels;
        result.total_pixels = output.total_pixels;
        result.taxonomy = output.taxonomy;
        result.top_contributors = output.top_contributors;
        result.passed = result.diff_pct <= unit.threshold;
        if !result.passed {
            result.fail(
                FailureKind::ThresholdFail,
                format!("{:.2}% > {:.2}%", result.diff_pct, unit.threshold),
            );
        }

        // 5. Attribution artifacts
        self.attach_artifacts(&mut result, &paths);
        result
    }

    async fn analyze(&self, frame: &Path) -> BlankAnalysis {
        let frame = frame.to_path_buf();
        let config = self.blank.clone();
        match tokio::task::spawn_blocking(move || analyze_frame(&frame, &config)).await {
            Ok(analysis) => analysis,
            Err(e) => BlankAnalysis {
                is_blank: true,
                background_ratio: 1.0,
                unique_colors: 0,
                total_pixels: 0,
                error: Some(format!("frame analysis aborted: {e}")),
            },
        }
    }

    fn attach_artifacts(&self, result: &mut CaseResult, paths: &ArtifactPaths) {
        if paths.attribution.is_file() {
            result.attribution_path = Some(paths.attribution.clone());
            let parsed = std::fs::read_to_string(&paths.attribution)
                .ok()
                .and_then(|text| serde_json::from_str::<AttributionFile>(&text).ok());
            match parsed {
                Some(attribution) => {
                    if attribution.taxonomy.is_some() {
                        result.taxonomy = attribution.taxonomy;
                    }
                    if attribution.top_contributors.is_some() {
                        result.top_contributors = attribution.top_contributors;
                    }
                }
                None => tracing::debug!(
                    path = %paths.attribution.display(),
                    "Ignoring unreadable attribution file"
                ),
            }
        }

        if paths.overlay.is_file() {
            result.overlay_path = Some(paths.overlay.clone());
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
