//! Iteration aggregation
//!
//! Reduces the iterations of each (case, viewport) to one statistic. Errored
//! iterations are kept as evidence but never enter the median.

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::types::{AggregatedResult, RunReport, RunSettings, RunSummary};
use crate::catalog::Viewport;
use crate::common::config::StabilityConfig;
use crate::exec::{CaseResult, Taxonomy};
use crate::schedule::SwarmOutcome;
use crate::work::{RunId, ShardSpec};

/// Aggregate the iterations of one (case, viewport)
///
/// Returns `None` only for an empty slice. A group with no scored iteration
/// still aggregates, to a failed 100% result.
pub fn aggregate_iterations(
    results: &[CaseResult],
    stability: &StabilityConfig,
) -> Option<AggregatedResult> {
    let first = results.first()?;

    let mut errors = Vec::new();
    let mut scored: Vec<&CaseResult> = Vec::new();
    for r in results {
        if r.is_errored() {
            errors.push(
                r.error
                    .clone()
                    .unwrap_or_else(|| format!("iteration {} produced no diff", r.iteration)),
            );
        } else {
            scored.push(r);
        }
    }

    let diffs: Vec<f64> = scored.iter().map(|r| r.diff_pct).collect();

    let mut agg = AggregatedResult {
        case_id: first.case_id.clone(),
        category: first.category,
        viewport: first.viewport,
        threshold: first.threshold,
        iterations: results.len(),
        scored_iterations: diffs.len(),
        diff_pct_median: 100.0,
        diff_pct_min: 100.0,
        diff_pct_max: 100.0,
        diff_pct_variance: 0.0,
        stable: false,
        passed: false,
        best_iteration: None,
        best_attribution_path: None,
        best_overlay_path: None,
        best_taxonomy: None,
        best_top_contributors: None,
        all_diffs: diffs.clone(),
        errors,
    };

    let Some(median) = median(&diffs) else {
        return Some(agg);
    };
    let min = diffs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = diffs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    agg.diff_pct_median = median;
    agg.diff_pct_min = min;
    agg.diff_pct_max = max;
    agg.diff_pct_variance = max - min;
    agg.stable = diffs.len() >= stability.min_iterations
        && agg.diff_pct_variance <= stability.max_variance;
    agg.passed = median <= agg.threshold;

    // Lowest diff wins, earliest iteration on ties
    let best = scored.iter().min_by(|a, b| {
        a.diff_pct
            .partial_cmp(&b.diff_pct)
            .unwrap_or(Ordering::Equal)
            .then(a.iteration.cmp(&b.iteration))
    });
    if let Some(best) = best {
        agg.best_iteration = Some(best.iteration);
        agg.best_attribution_path = best.attribution_path.clone();
        agg.best_overlay_path = best.overlay_path.clone();
        agg.best_taxonomy = best.taxonomy.clone();
        agg.best_top_contributors = best.top_contributors.clone();
    }

    Some(agg)
}

/// Median of a slice; the mean of the middle pair for even lengths
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Group by (case, viewport) and aggregate, worst median first
pub fn aggregate_all(results: &[CaseResult], stability: &StabilityConfig) -> Vec<AggregatedResult> {
    let mut groups: BTreeMap<(String, String), Vec<CaseResult>> = BTreeMap::new();
    for r in results {
        groups
            .entry((r.case_id.clone(), r.viewport.label()))
            .or_default()
            .push(r.clone());
    }

    let mut aggregated: Vec<AggregatedResult> = groups
        .values()
        .filter_map(|group| aggregate_iterations(group, stability))
        .collect();
    sort_worst_first(&mut aggregated);
    aggregated
}

/// Sort by median descending, then case id and viewport
pub fn sort_worst_first(results: &mut [AggregatedResult]) {
    results.sort_by(|a, b| {
        b.diff_pct_median
            .partial_cmp(&a.diff_pct_median)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.case_id.cmp(&b.case_id))
            .then_with(|| a.viewport.label().cmp(&b.viewport.label()))
    });
}

/// Scale bucket values so they sum to 100; all-zero input is returned as is
pub fn normalize(taxonomy: Taxonomy) -> Taxonomy {
    let total: f64 = taxonomy.values().sum();
    if total <= 0.0 {
        return taxonomy;
    }
    taxonomy
        .into_iter()
        .map(|(bucket, value)| (bucket, value / total * 100.0))
        .collect()
}

/// Sum the best-iteration taxonomy of every aggregate, normalized
pub fn global_taxonomy(results: &[AggregatedResult]) -> Taxonomy {
    let mut totals = Taxonomy::new();
    for taxonomy in results.iter().filter_map(|r| r.best_taxonomy.as_ref()) {
        for (bucket, pct) in taxonomy {
            *totals.entry(bucket.clone()).or_insert(0.0) += pct;
        }
    }
    normalize(totals)
}

pub fn summarize(results: &[AggregatedResult], total_units: usize) -> RunSummary {
    let passed = results.iter().filter(|r| r.passed).count();
    let avg_diff_pct = if results.is_empty() {
        100.0
    } else {
        results.iter().map(|r| r.diff_pct_median).sum::<f64>() / results.len() as f64
    };

    RunSummary {
        total_cases: results.len(),
        passed,
        failed: results.len() - passed,
        stable: results.iter().filter(|r| r.stable).count(),
        errored: results.iter().filter(|r| r.is_errored()).count(),
        avg_diff_pct,
        total_units,
    }
}

/// Build the per-run report from a finished swarm
pub fn build_run_report(
    run_id: &RunId,
    settings: RunSettings,
    shard: Option<ShardSpec>,
    outcome: &SwarmOutcome,
    stability: &StabilityConfig,
) -> RunReport {
    let all = outcome.all_results();
    let results = aggregate_all(&all, stability);

    RunReport {
        run_id: run_id.to_string(),
        timestamp: Utc::now(),
        settings,
        shard,
        summary: summarize(&results, all.len()),
        taxonomy: global_taxonomy(&results),
        results,
        scout: outcome.scout.clone(),
        exploit: outcome.exploit.clone(),
        exploit_skipped: outcome.exploit_skipped.as_ref().map(|s| s.to_string()),
        elapsed_secs: outcome.elapsed.as_secs_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::exec::FailureKind;
    use crate::work::WorkUnit;
    use std::path::PathBuf;

    fn unit(case_id: &str, iteration: u32) -> WorkUnit {
        WorkUnit {
            case_id: case_id.to_string(),
            document: PathBuf::from(format!("{case_id}.html")),
            category: Category::Micro,
            viewport: Viewport::new(800, 600),
            iteration,
            threshold: 15.0,
        }
    }

    fn scored(case_id: &str, iteration: u32, diff: f64) -> CaseResult {
        let mut r = CaseResult::pending(&unit(case_id, iteration));
        r.diff_pct = diff;
        r.passed = diff <= 15.0;
        r.overlay_path = Some(PathBuf::from(format!("iter-{iteration}/overlay.png")));
        r
    }

    #[test]
    fn test_alpha_scenario() {
        let results = vec![
            scored("alpha", 1, 4.0),
            scored("alpha", 2, 4.5),
            scored("alpha", 3, 5.0),
        ];
        let stability = StabilityConfig {
            max_variance: 1.0,
            min_iterations: 3,
        };
        let agg = aggregate_iterations(&results, &stability).unwrap();
        assert_eq!(agg.diff_pct_median, 4.5);
        assert_eq!(agg.diff_pct_variance, 1.0);
        assert!(agg.stable);
        assert!(agg.passed);
        assert_eq!(agg.best_iteration, Some(1));
        assert_eq!(agg.best_overlay_path, Some(PathBuf::from("iter-1/overlay.png")));

        // Same spread is unstable under the default 0.10 tolerance
        let agg = aggregate_iterations(&results, &StabilityConfig::default()).unwrap();
        assert!(!agg.stable);
    }

    #[test]
    fn test_even_count_median() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[7.0]), Some(7.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_errors_excluded_from_statistic() {
        let results = vec![
            scored("beta", 1, 2.0),
            CaseResult::failed(&unit("beta", 2), FailureKind::BlankFrame, "BLANK_FRAME"),
            scored("beta", 3, 3.0),
        ];
        let agg = aggregate_iterations(&results, &StabilityConfig::default()).unwrap();
        assert_eq!(agg.iterations, 3);
        assert_eq!(agg.scored_iterations, 2);
        assert_eq!(agg.diff_pct_median, 2.5);
        assert_eq!(agg.errors, vec!["BLANK_FRAME".to_string()]);
        // Two scored iterations cannot be stable
        assert!(!agg.stable);
    }

    #[test]
    fn test_all_errored_group_is_worst_case() {
        let results = vec![
            CaseResult::failed(&unit("gamma", 1), FailureKind::CaptureFailure, "timeout"),
            CaseResult::failed(&unit("gamma", 2), FailureKind::CompareFailure, "bad json"),
        ];
        let agg = aggregate_iterations(&results, &StabilityConfig::default()).unwrap();
        assert_eq!(agg.diff_pct_median, 100.0);
        assert!(!agg.passed);
        assert!(!agg.stable);
        assert!(agg.is_errored());
        assert_eq!(agg.errors.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_iterations(&[], &StabilityConfig::default()).is_none());
    }

    #[test]
    fn test_best_iteration_tie_picks_earliest() {
        let results = vec![scored("d", 3, 1.0), scored("d", 1, 1.0), scored("d", 2, 2.0)];
        let agg = aggregate_iterations(&results, &StabilityConfig::default()).unwrap();
        assert_eq!(agg.best_iteration, Some(1));
    }

    #[test]
    fn test_aggregate_all_sorts_worst_first() {
        let results = vec![
            scored("a", 1, 1.0),
            scored("b", 1, 9.0),
            scored("a", 2, 2.0),
            scored("c", 1, 5.0),
        ];
        let aggs = aggregate_all(&results, &StabilityConfig::default());
        let ids: Vec<&str> = aggs.iter().map(|a| a.case_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(aggs[2].iterations, 2);
    }

    #[test]
    fn test_global_taxonomy_is_normalized() {
        let mut a = scored("a", 1, 1.0);
        a.taxonomy = Some([("text".to_string(), 30.0)].into_iter().collect());
        let mut b = scored("b", 1, 2.0);
        b.taxonomy = Some(
            [("text".to_string(), 10.0), ("box_model".to_string(), 60.0)]
                .into_iter()
                .collect(),
        );
        let aggs = aggregate_all(&[a, b], &StabilityConfig::default());
        let tax = global_taxonomy(&aggs);
        assert!((tax["text"] - 40.0).abs() < 1e-9);
        assert!((tax["box_model"] - 60.0).abs() < 1e-9);
    }
}
