//! Report data types
//!
//! These are the on-disk JSON shapes: `swarm_report.json` (one run),
//! `aggregate_report.json` (merged runs) and `regression_report.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::catalog::{Category, Scope, Viewport};
use crate::exec::{CaseResult, Contributor, Taxonomy};
use crate::work::ShardSpec;

/// One (case, viewport) reduced over its iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub case_id: String,
    pub category: Category,
    pub viewport: Viewport,
    pub threshold: f64,

    /// All iterations, scored or not
    pub iterations: usize,
    /// Iterations that produced a usable diff
    pub scored_iterations: usize,

    pub diff_pct_median: f64,
    pub diff_pct_min: f64,
    pub diff_pct_max: f64,
    /// Spread proxy: max - min
    pub diff_pct_variance: f64,

    pub stable: bool,
    pub passed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_attribution_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_overlay_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_taxonomy: Option<Taxonomy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_top_contributors: Option<Vec<Contributor>>,

    #[serde(default)]
    pub all_diffs: Vec<f64>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AggregatedResult {
    pub fn key(&self) -> (String, Viewport) {
        (self.case_id.clone(), self.viewport)
    }

    pub fn is_errored(&self) -> bool {
        self.scored_iterations == 0
    }
}

/// Settings a run was started with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cases: Option<Vec<String>>,
    /// Explicit viewports; empty means each case's native one
    #[serde(default)]
    pub viewports: Vec<Viewport>,
    pub iterations: u32,
    pub jobs: usize,
    pub exploit_top: usize,
    pub exploit_iterations: u32,
    #[serde(default)]
    pub exploit_viewports: Vec<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_minutes: Option<u64>,
    pub max_variance: f64,
    pub min_iterations: usize,
}

/// Headline numbers of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_cases: usize,
    pub passed: usize,
    pub failed: usize,
    pub stable: usize,
    pub errored: usize,
    pub avg_diff_pct: f64,
    pub total_units: usize,
}

/// `swarm_report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub settings: RunSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardSpec>,
    pub summary: RunSummary,
    /// Bucket share of all attributed diff, summing to 100
    #[serde(default)]
    pub taxonomy: Taxonomy,
    /// Aggregates, worst median first
    pub results: Vec<AggregatedResult>,
    #[serde(default)]
    pub scout: Vec<CaseResult>,
    #[serde(default)]
    pub exploit: Vec<CaseResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploit_skipped: Option<String>,
    pub elapsed_secs: f64,
}

/// Per-selector contributor totals across cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardEntry {
    pub rank: usize,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub total_diff_pixels: u64,
    /// Share of all contributor diff pixels
    pub contribution_pct: f64,
    /// Summed per-case contribution percentages
    pub total_contribution_pct: f64,
    pub case_count: usize,
    /// Up to five case ids
    pub cases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likely_cause: Option<String>,
    pub corner_ratio: f64,
}

/// Ranked root causes with the cumulative gain of fixing the top N
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixScoreboard {
    pub top_contributors: Vec<ScoreboardEntry>,
    /// `top_N` to cumulative percent of contributor diff pixels
    pub projected_gains: BTreeMap<String, f64>,
}

/// One root-cause bucket across cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyBucket {
    pub bucket: String,
    pub total_contribution_pct: f64,
    pub case_count: usize,
    pub top_selectors: Vec<String>,
}

/// Flat per-(case, viewport) view used by merge, compare and gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub case_id: String,
    pub category: Category,
    pub viewport: Viewport,
    /// Median over scored iterations
    pub diff_pct: f64,
    #[serde(default)]
    pub diff_pct_min: f64,
    #[serde(default)]
    pub diff_pct_max: f64,
    pub passed: bool,
    pub stable: bool,
    pub threshold: f64,
    #[serde(default)]
    pub variance: f64,
    #[serde(default)]
    pub iterations: usize,
    #[serde(default)]
    pub scored_iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_path: Option<PathBuf>,
    #[serde(default)]
    pub top_contributors: Vec<Contributor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<Taxonomy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl From<&AggregatedResult> for CaseSummary {
    fn from(r: &AggregatedResult) -> Self {
        Self {
            case_id: r.case_id.clone(),
            category: r.category,
            viewport: r.viewport,
            diff_pct: r.diff_pct_median,
            diff_pct_min: r.diff_pct_min,
            diff_pct_max: r.diff_pct_max,
            passed: r.passed,
            stable: r.stable,
            threshold: r.threshold,
            variance: r.diff_pct_variance,
            iterations: r.iterations,
            scored_iterations: r.scored_iterations,
            overlay_path: r.best_overlay_path.clone(),
            attribution_path: r.best_attribution_path.clone(),
            top_contributors: r
                .best_top_contributors
                .iter()
                .flatten()
                .take(5)
                .cloned()
                .collect(),
            taxonomy: r.best_taxonomy.clone(),
            errors: r.errors.clone(),
        }
    }
}

/// Headline numbers of a merged report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total_cases: usize,
    pub passed: usize,
    pub failed: usize,
    pub stable: usize,
    pub avg_diff_pct: f64,
    pub total_global_diff_pixels: u64,
}

/// `aggregate_report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub timestamp: DateTime<Utc>,
    /// Run ids merged into this report
    #[serde(default)]
    pub runs: Vec<String>,
    pub summary: AggregateSummary,
    pub fix_scoreboard: FixScoreboard,
    pub taxonomy: Vec<TaxonomyBucket>,
    /// Worst first
    pub cases: Vec<CaseSummary>,
}

/// Change of one case between two reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDelta {
    pub case_id: String,
    pub viewport: Viewport,
    pub baseline_diff: f64,
    pub current_diff: f64,
    pub delta: f64,
}

/// A case that fails with no prior result to compare against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFailure {
    pub case_id: String,
    pub viewport: Viewport,
    pub diff_pct: f64,
}

/// Movement of one taxonomy bucket's share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyShift {
    pub bucket: String,
    pub baseline_pct: f64,
    pub current_pct: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    pub compared: usize,
    pub regressions: usize,
    pub improvements: usize,
    pub unchanged: usize,
    pub new_failures: usize,
}

/// `regression_report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub timestamp: DateTime<Utc>,
    pub regression_budget: f64,
    /// Worst delta first
    pub regressions: Vec<CaseDelta>,
    /// Best delta first
    pub improvements: Vec<CaseDelta>,
    pub unchanged: Vec<CaseDelta>,
    pub new_failures: Vec<NewFailure>,
    pub taxonomy_shifts: Vec<TaxonomyShift>,
    pub summary: RegressionSummary,
    pub passed: bool,
}

/// Either report kind, as loaded from disk
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedReport {
    Run(Box<RunReport>),
    Aggregate(Box<AggregateReport>),
}

impl LoadedReport {
    /// Per-(case, viewport) entries
    pub fn cases(&self) -> Vec<CaseSummary> {
        match self {
            LoadedReport::Run(r) => r.results.iter().map(CaseSummary::from).collect(),
            LoadedReport::Aggregate(r) => r.cases.clone(),
        }
    }

    /// Normalized bucket shares (summing to 100 when anything is attributed)
    pub fn taxonomy(&self) -> Taxonomy {
        match self {
            LoadedReport::Run(r) => r.taxonomy.clone(),
            LoadedReport::Aggregate(r) => super::aggregate::normalize(
                r.taxonomy
                    .iter()
                    .map(|b| (b.bucket.clone(), b.total_contribution_pct))
                    .collect(),
            ),
        }
    }

    /// Aggregated results, rebuilt from case summaries for merged reports
    pub fn aggregated(&self) -> Vec<AggregatedResult> {
        match self {
            LoadedReport::Run(r) => r.results.clone(),
            LoadedReport::Aggregate(r) => r
                .cases
                .iter()
                .map(|c| AggregatedResult {
                    case_id: c.case_id.clone(),
                    category: c.category,
                    viewport: c.viewport,
                    threshold: c.threshold,
                    iterations: c.iterations,
                    scored_iterations: c.scored_iterations,
                    diff_pct_median: c.diff_pct,
                    diff_pct_min: c.diff_pct_min,
                    diff_pct_max: c.diff_pct_max,
                    diff_pct_variance: c.variance,
                    stable: c.stable,
                    passed: c.passed,
                    best_iteration: None,
                    best_attribution_path: c.attribution_path.clone(),
                    best_overlay_path: c.overlay_path.clone(),
                    best_taxonomy: c.taxonomy.clone(),
                    best_top_contributors: Some(c.top_contributors.clone())
                        .filter(|v| !v.is_empty()),
                    all_diffs: Vec::new(),
                    errors: c.errors.clone(),
                })
                .collect(),
        }
    }

    /// Run ids this report covers
    pub fn run_ids(&self) -> Vec<String> {
        match self {
            LoadedReport::Run(r) => vec![r.run_id.clone()],
            LoadedReport::Aggregate(r) => r.runs.clone(),
        }
    }
}
