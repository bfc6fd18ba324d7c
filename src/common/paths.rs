//! Run-scoped artifact paths and configuration locations
//!
//! Every artifact a work unit writes lives under
//! `<results_root>/<run_id>/<case_id>/<WxH>/iter-<N>/`. The layout is a pure
//! function of the unit identity, which is what lets concurrent workers write
//! into the same tree without any locking.

use std::io;
use std::path::{Path, PathBuf};

use crate::work::WorkUnit;

/// Name used for configuration and data directories
const APP_NAME: &str = "parity-harness";

/// File name of the per-run swarm report
pub const SWARM_REPORT_FILE: &str = "swarm_report.json";

/// File name of the merged aggregate report
pub const AGGREGATE_REPORT_FILE: &str = "aggregate_report.json";

/// File name of the short human summary
pub const SUMMARY_FILE: &str = "summary.txt";

/// All artifact locations for one work unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub base: PathBuf,
    pub capture_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub frame: PathBuf,
    pub layout: PathBuf,
    pub diff_image: PathBuf,
    pub heatmap: PathBuf,
    pub overlay: PathBuf,
    pub attribution: PathBuf,
}

impl ArtifactPaths {
    /// Resolve the artifact layout for a unit in a run
    ///
    /// ```text
    /// <root>/<run_id>/<case_id>/<WxH>/iter-<N>/
    ///   capture/frame.ppm
    ///   capture/layout.json
    ///   diff/diff.png
    ///   diff/heatmap.png
    ///   diff/overlay.png
    ///   diff/attribution.json
    /// ```
    pub fn resolve(results_root: &Path, run_id: &str, unit: &WorkUnit) -> Self {
        let base = results_root
            .join(run_id)
            .join(&unit.case_id)
            .join(unit.viewport.label())
            .join(format!("iter-{}", unit.iteration));
        let capture_dir = base.join("capture");
        let diff_dir = base.join("diff");

        Self {
            frame: capture_dir.join("frame.ppm"),
            layout: capture_dir.join("layout.json"),
            diff_image: diff_dir.join("diff.png"),
            heatmap: diff_dir.join("heatmap.png"),
            overlay: diff_dir.join("overlay.png"),
            attribution: diff_dir.join("attribution.json"),
            base,
            capture_dir,
            diff_dir,
        }
    }
}

/// Directory holding everything written for a run
pub fn run_dir(results_root: &Path, run_id: &str) -> PathBuf {
    results_root.join(run_id)
}

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/parity-harness/`
/// - macOS: `~/Library/Application Support/parity-harness/`
/// - Windows: `%APPDATA%\parity-harness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Create a directory tree if it does not exist yet
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
