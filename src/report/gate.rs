//! Level-based CI gate

use serde::{Deserialize, Serialize};
use std::fmt;

use super::regression::compare_reports;
use super::types::{CaseDelta, LoadedReport};
use crate::catalog::Viewport;

/// CI strictness level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum GateLevel {
    #[default]
    Commit,
    PrMerge,
    Nightly,
    Release,
}

/// Gate thresholds, in diff percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub max_diff: f64,
    pub require_stable: bool,
    pub max_variance: f64,
    pub regression_budget: f64,
}

impl GateLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateLevel::Commit => "commit",
            GateLevel::PrMerge => "pr_merge",
            GateLevel::Nightly => "nightly",
            GateLevel::Release => "release",
        }
    }

    pub fn policy(&self) -> GatePolicy {
        let (max_diff, require_stable, regression_budget) = match self {
            GateLevel::Commit => (1.0, false, 0.0),
            GateLevel::PrMerge => (0.5, true, 0.1),
            GateLevel::Nightly => (0.25, true, 0.0),
            GateLevel::Release => (0.0, true, 0.0),
        };
        GatePolicy {
            max_diff,
            require_stable,
            max_variance: 0.10,
            regression_budget,
        }
    }
}

/// Explicit overrides of a level's defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct GateOverrides {
    pub max_diff: Option<f64>,
    pub require_stable: Option<bool>,
    pub max_variance: Option<f64>,
    pub regression_budget: Option<f64>,
}

impl GatePolicy {
    pub fn with_overrides(mut self, o: GateOverrides) -> Self {
        if let Some(v) = o.max_diff {
            self.max_diff = v;
        }
        if let Some(v) = o.require_stable {
            self.require_stable = v;
        }
        if let Some(v) = o.max_variance {
            self.max_variance = v;
        }
        if let Some(v) = o.regression_budget {
            self.regression_budget = v;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    Errored,
    Diff,
    Unstable,
    Variance,
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateReason::Errored => "errored",
            GateReason::Diff => "diff",
            GateReason::Unstable => "unstable",
            GateReason::Variance => "variance",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateFailure {
    pub case_id: String,
    pub viewport: Viewport,
    pub reason: GateReason,
    pub diff_pct: f64,
    pub variance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub policy: GatePolicy,
    pub total: usize,
    pub failures: Vec<GateFailure>,
    /// Empty unless a previous report was given
    pub regressions: Vec<CaseDelta>,
    pub passed: bool,
}

/// Check every aggregate against the policy, plus regressions against `previous`
pub fn evaluate(
    report: &LoadedReport,
    policy: GatePolicy,
    previous: Option<&LoadedReport>,
) -> GateOutcome {
    let cases = report.cases();
    let mut failures = Vec::new();

    for case in &cases {
        let fail = |reason: GateReason, detail: Option<String>| GateFailure {
            case_id: case.case_id.clone(),
            viewport: case.viewport,
            reason,
            diff_pct: case.diff_pct,
            variance: case.variance,
            detail,
        };

        if case.scored_iterations == 0 {
            failures.push(fail(GateReason::Errored, case.errors.first().cloned()));
            continue;
        }
        if case.diff_pct > policy.max_diff {
            failures.push(fail(
                GateReason::Diff,
                Some(format!("{:.3}% > {:.3}%", case.diff_pct, policy.max_diff)),
            ));
            continue;
        }
        if policy.require_stable {
            if !case.stable {
                failures.push(fail(GateReason::Unstable, None));
                continue;
            }
            if case.variance > policy.max_variance {
                failures.push(fail(
                    GateReason::Variance,
                    Some(format!("{:.3} > {:.3}", case.variance, policy.max_variance)),
                ));
            }
        }
    }

    let regressions = previous
        .map(|prev| compare_reports(prev, report, policy.regression_budget).regressions)
        .unwrap_or_default();

    GateOutcome {
        policy,
        total: cases.len(),
        passed: failures.is_empty() && regressions.is_empty(),
        failures,
        regressions,
    }
}
