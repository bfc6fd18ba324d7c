//! Cross-run merging and the root-cause scoreboard

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::aggregate::sort_worst_first;
use super::types::{
    AggregateReport, AggregateSummary, AggregatedResult, CaseSummary, FixScoreboard,
    ScoreboardEntry, TaxonomyBucket,
};
use crate::catalog::Viewport;

/// Entries shown on the scoreboard
const SCOREBOARD_SIZE: usize = 20;
/// Selectors considered when linking buckets to selectors
const BUCKET_SELECTOR_POOL: usize = 50;
const SELECTORS_PER_BUCKET: usize = 5;
const CASES_PER_SELECTOR: usize = 5;

/// Deduplicate aggregates by (case, viewport)
///
/// The entry with more iterations wins. On equal counts the first one seen is
/// kept, so callers control precedence through input order.
pub fn merge_results(results: Vec<AggregatedResult>) -> Vec<AggregatedResult> {
    let mut order: Vec<(String, Viewport)> = Vec::new();
    let mut merged: HashMap<(String, Viewport), AggregatedResult> = HashMap::new();

    for result in results {
        let key = result.key();
        match merged.get(&key) {
            None => {
                order.push(key.clone());
                merged.insert(key, result);
            }
            Some(existing) if result.iterations > existing.iterations => {
                tracing::debug!(
                    case = %result.case_id,
                    viewport = %result.viewport,
                    kept = result.iterations,
                    dropped = existing.iterations,
                    "Replacing duplicate aggregate"
                );
                merged.insert(key, result);
            }
            Some(_) => {}
        }
    }

    let mut out: Vec<AggregatedResult> = order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect();
    sort_worst_first(&mut out);
    out
}

#[derive(Debug, Default)]
struct SelectorStats {
    tag: Option<String>,
    total_diff_pixels: u64,
    total_contribution_pct: f64,
    case_count: usize,
    cases: Vec<String>,
    likely_cause: Option<String>,
    avg_corner_ratio: f64,
}

#[derive(Debug, Default)]
struct BucketStats {
    total_contribution_pct: f64,
    case_count: usize,
}

/// Build the merged report for already-deduplicated aggregates
pub fn build_aggregate_report(results: &[AggregatedResult], runs: Vec<String>) -> AggregateReport {
    let mut selectors: BTreeMap<String, SelectorStats> = BTreeMap::new();
    let mut buckets: BTreeMap<String, BucketStats> = BTreeMap::new();
    let mut total_pixels: u64 = 0;

    for r in results {
        for c in r.best_top_contributors.iter().flatten() {
            if c.selector.is_empty() {
                continue;
            }
            total_pixels += c.diff_pixels;

            let stats = selectors.entry(c.selector.clone()).or_default();
            if stats.case_count == 0 {
                stats.tag = c.tag.clone();
            }
            stats.total_diff_pixels += c.diff_pixels;
            stats.total_contribution_pct += c.contribution_percent;
            stats.case_count += 1;
            if !stats.cases.contains(&r.case_id) {
                stats.cases.push(r.case_id.clone());
            }
            if stats.likely_cause.is_none() {
                stats.likely_cause = c.likely_cause.clone();
            }
            let n = stats.case_count as f64;
            stats.avg_corner_ratio = (stats.avg_corner_ratio * (n - 1.0) + c.corner_ratio) / n;
        }

        for (bucket, pct) in r.best_taxonomy.iter().flatten() {
            let stats = buckets.entry(bucket.clone()).or_default();
            stats.total_contribution_pct += pct;
            stats.case_count += 1;
        }
    }

    let mut ranked: Vec<(String, SelectorStats)> = selectors.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.total_diff_pixels
            .cmp(&a.1.total_diff_pixels)
            .then_with(|| a.0.cmp(&b.0))
    });

    let share = |pixels: u64| {
        if total_pixels == 0 {
            0.0
        } else {
            pixels as f64 / total_pixels as f64 * 100.0
        }
    };

    let mut projected_gains = BTreeMap::new();
    let mut cumulative = 0.0;
    for (i, (_, stats)) in ranked.iter().take(SCOREBOARD_SIZE).enumerate() {
        cumulative += share(stats.total_diff_pixels);
        projected_gains.insert(format!("top_{}", i + 1), cumulative);
    }

    let top_contributors: Vec<ScoreboardEntry> = ranked
        .iter()
        .take(SCOREBOARD_SIZE)
        .enumerate()
        .map(|(i, (selector, s))| ScoreboardEntry {
            rank: i + 1,
            selector: selector.clone(),
            tag: s.tag.clone(),
            total_diff_pixels: s.total_diff_pixels,
            contribution_pct: share(s.total_diff_pixels),
            total_contribution_pct: s.total_contribution_pct,
            case_count: s.case_count,
            cases: s.cases.iter().take(CASES_PER_SELECTOR).cloned().collect(),
            likely_cause: s.likely_cause.clone(),
            corner_ratio: s.avg_corner_ratio,
        })
        .collect();

    let mut taxonomy: Vec<TaxonomyBucket> = buckets
        .into_iter()
        .map(|(bucket, stats)| TaxonomyBucket {
            top_selectors: ranked
                .iter()
                .take(BUCKET_SELECTOR_POOL)
                .filter(|(_, s)| s.likely_cause.as_deref() == Some(bucket.as_str()))
                .take(SELECTORS_PER_BUCKET)
                .map(|(selector, _)| selector.clone())
                .collect(),
            bucket,
            total_contribution_pct: stats.total_contribution_pct,
            case_count: stats.case_count,
        })
        .collect();
    taxonomy.sort_by(|a, b| {
        b.total_contribution_pct
            .partial_cmp(&a.total_contribution_pct)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.bucket.cmp(&b.bucket))
    });

    let cases: Vec<CaseSummary> = results.iter().map(CaseSummary::from).collect();
    let passed = cases.iter().filter(|c| c.passed).count();
    let avg_diff_pct = if cases.is_empty() {
        100.0
    } else {
        cases.iter().map(|c| c.diff_pct).sum::<f64>() / cases.len() as f64
    };

    AggregateReport {
        timestamp: Utc::now(),
        runs,
        summary: AggregateSummary {
            total_cases: cases.len(),
            passed,
            failed: cases.len() - passed,
            stable: cases.iter().filter(|c| c.stable).count(),
            avg_diff_pct,
            total_global_diff_pixels: total_pixels,
        },
        fix_scoreboard: FixScoreboard {
            top_contributors,
            projected_gains,
        },
        taxonomy,
        cases,
    }
}
