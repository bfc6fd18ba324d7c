//! Regression comparison between two reports

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use super::types::{
    CaseDelta, CaseSummary, LoadedReport, NewFailure, RegressionReport, RegressionSummary,
    TaxonomyShift,
};
use crate::catalog::Viewport;
use crate::exec::Taxonomy;

/// Bucket share movement (percentage points) worth reporting
const TAXONOMY_SHIFT_POINTS: f64 = 5.0;

/// Compare a current report against a baseline report
pub fn compare_reports(
    baseline: &LoadedReport,
    current: &LoadedReport,
    budget: f64,
) -> RegressionReport {
    compare_cases(
        &baseline.cases(),
        &current.cases(),
        &baseline.taxonomy(),
        &current.taxonomy(),
        budget,
    )
}

/// Compare case summaries directly
pub fn compare_cases(
    baseline: &[CaseSummary],
    current: &[CaseSummary],
    baseline_taxonomy: &Taxonomy,
    current_taxonomy: &Taxonomy,
    budget: f64,
) -> RegressionReport {
    let previous: HashMap<(&str, Viewport), &CaseSummary> = baseline
        .iter()
        .map(|c| ((c.case_id.as_str(), c.viewport), c))
        .collect();

    let mut regressions = Vec::new();
    let mut improvements = Vec::new();
    let mut unchanged = Vec::new();
    let mut new_failures = Vec::new();

    for case in current {
        let Some(prev) = previous.get(&(case.case_id.as_str(), case.viewport)) else {
            if !case.passed {
                new_failures.push(NewFailure {
                    case_id: case.case_id.clone(),
                    viewport: case.viewport,
                    diff_pct: case.diff_pct,
                });
            }
            continue;
        };

        let delta = case.diff_pct - prev.diff_pct;
        let entry = CaseDelta {
            case_id: case.case_id.clone(),
            viewport: case.viewport,
            baseline_diff: prev.diff_pct,
            current_diff: case.diff_pct,
            delta,
        };

        if delta > budget {
            regressions.push(entry);
        } else if delta < -budget {
            improvements.push(entry);
        } else {
            unchanged.push(entry);
        }
    }

    let by_delta = |a: &CaseDelta, b: &CaseDelta| a.delta.partial_cmp(&b.delta).unwrap_or(Ordering::Equal);
    regressions.sort_by(|a, b| by_delta(b, a));
    improvements.sort_by(by_delta);

    let taxonomy_shifts = taxonomy_shifts(baseline_taxonomy, current_taxonomy);

    let summary = RegressionSummary {
        compared: regressions.len() + improvements.len() + unchanged.len(),
        regressions: regressions.len(),
        improvements: improvements.len(),
        unchanged: unchanged.len(),
        new_failures: new_failures.len(),
    };
    let passed = regressions.is_empty() && new_failures.is_empty();

    RegressionReport {
        timestamp: Utc::now(),
        regression_budget: budget,
        regressions,
        improvements,
        unchanged,
        new_failures,
        taxonomy_shifts,
        summary,
        passed,
    }
}

fn taxonomy_shifts(baseline: &Taxonomy, current: &Taxonomy) -> Vec<TaxonomyShift> {
    let buckets: BTreeSet<&String> = baseline.keys().chain(current.keys()).collect();
    let mut shifts: Vec<TaxonomyShift> = buckets
        .into_iter()
        .filter_map(|bucket| {
            let before = baseline.get(bucket).copied().unwrap_or(0.0);
            let after = current.get(bucket).copied().unwrap_or(0.0);
            let delta = after - before;
            (delta.abs() > TAXONOMY_SHIFT_POINTS).then(|| TaxonomyShift {
                bucket: bucket.clone(),
                baseline_pct: before,
                current_pct: after,
                delta,
            })
        })
        .collect();
    shifts.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(Ordering::Equal)
    });
    shifts
}
