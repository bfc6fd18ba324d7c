//! Work unit execution
//!
//! Capture, blank-frame gate and comparison for a single work unit. Every
//! outcome, including tool failures, is returned as a [`CaseResult`].

pub mod baseline;
pub mod blank;
pub mod capability;
pub mod capture;
pub mod compare;
pub mod executor;
mod process;

#[cfg(test)]
pub(crate) mod fake;

pub use baseline::{Baseline, BaselineStore};
pub use capability::Capability;
pub use capture::{CaptureAdapter, CaptureRequest, CommandCapture};
pub use compare::{CommandCompare, CompareAdapter, CompareOutput, CompareRequest, Contributor, Taxonomy};
pub use executor::Executor;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::catalog::{Category, Viewport};
use crate::work::{UnitKey, WorkUnit};

/// Why a unit did not pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingBaseline,
    CaptureFailure,
    BlankFrame,
    CompareFailure,
    /// Scored, but above the case threshold
    ThresholdFail,
}

impl FailureKind {
    /// Whether the unit produced no usable diff
    pub fn is_error(&self) -> bool {
        !matches!(self, FailureKind::ThresholdFail)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::MissingBaseline => "missing baseline",
            FailureKind::CaptureFailure => "capture failure",
            FailureKind::BlankFrame => "blank frame",
            FailureKind::CompareFailure => "compare failure",
            FailureKind::ThresholdFail => "over threshold",
        };
        f.write_str(s)
    }
}

/// Outcome of one work unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,
    #[serde(default)]
    pub document: PathBuf,
    pub category: Category,
    pub viewport: Viewport,
    pub iteration: u32,
    pub threshold: f64,

    pub passed: bool,
    pub diff_pct: f64,
    #[serde(default)]
    pub diff_pixels: u64,
    #[serde(default)]
    pub total_pixels: u64,

    #[serde(default)]
    pub is_blank_frame: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_colors: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<Taxonomy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_contributors: Option<Vec<Contributor>>,

    #[serde(default)]
    pub capture_ms: u64,
    #[serde(default)]
    pub compare_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl CaseResult {
    /// A not-yet-scored result for a unit: failed at 100% diff
    pub fn pending(unit: &WorkUnit) -> Self {
        Self {
            case_id: unit.case_id.clone(),
            document: unit.document.clone(),
            category: unit.category,
            viewport: unit.viewport,
            iteration: unit.iteration,
            threshold: unit.threshold,
            passed: false,
            diff_pct: 100.0,
            diff_pixels: 0,
            total_pixels: 0,
            is_blank_frame: false,
            background_ratio: None,
            unique_colors: None,
            attribution_path: None,
            overlay_path: None,
            taxonomy: None,
            top_contributors: None,
            capture_ms: 0,
            compare_ms: 0,
            error: None,
            failure: None,
        }
    }

    /// A terminal failure for a unit
    pub fn failed(unit: &WorkUnit, kind: FailureKind, error: impl Into<String>) -> Self {
        let mut result = Self::pending(unit);
        result.fail(kind, error);
        result
    }

    /// Mark this result as failed; errors force a blank-equivalent 100% diff
    pub fn fail(&mut self, kind: FailureKind, error: impl Into<String>) {
        self.passed = false;
        self.failure = Some(kind);
        self.error = Some(error.into());
        if kind.is_error() {
            self.diff_pct = 100.0;
        }
        if matches!(
            kind,
            FailureKind::MissingBaseline | FailureKind::CaptureFailure | FailureKind::BlankFrame
        ) {
            self.is_blank_frame = true;
        }
    }

    /// Whether this result has no usable diff
    pub fn is_errored(&self) -> bool {
        self.failure.map(|f| f.is_error()).unwrap_or(false) || self.is_blank_frame
    }

    pub fn key(&self) -> UnitKey {
        UnitKey {
            case_id: self.case_id.clone(),
            viewport: self.viewport,
            iteration: self.iteration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> WorkUnit {
        WorkUnit {
            case_id: "alpha".to_string(),
            document: PathBuf::from("alpha.html"),
            category: Category::Micro,
            viewport: Viewport::new(800, 600),
            iteration: 1,
            threshold: 15.0,
        }
    }

    #[test]
    fn test_blank_frame_forces_failure() {
        let result = CaseResult::failed(&unit(), FailureKind::BlankFrame, "BLANK_FRAME");
        assert!(result.is_blank_frame);
        assert!(!result.passed);
        assert_eq!(result.diff_pct, 100.0);
        assert!(result.is_errored());
    }

    #[test]
    fn test_threshold_fail_keeps_diff() {
        let mut result = CaseResult::pending(&unit());
        result.diff_pct = 20.0;
        result.fail(FailureKind::ThresholdFail, "20.00% > 15.00%");
        assert_eq!(result.diff_pct, 20.0);
        assert!(!result.is_errored());
        assert!(!result.is_blank_frame);
    }

    #[test]
    fn test_compare_failure_is_errored_but_not_blank() {
        let result = CaseResult::failed(&unit(), FailureKind::CompareFailure, "boom");
        assert!(result.is_errored());
        assert!(!result.is_blank_frame);
        assert_eq!(result.key(), unit().key());
    }
}
