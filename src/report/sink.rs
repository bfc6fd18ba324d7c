//! Writing and loading report files

use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::types::{AggregateReport, LoadedReport, RunReport};
use crate::common::paths::{
    ensure_dir, run_dir, AGGREGATE_REPORT_FILE, SUMMARY_FILE, SWARM_REPORT_FILE,
};
use crate::common::{Error, Result};

const SUMMARY_BUCKETS: usize = 5;
const SUMMARY_WORST: usize = 10;

/// Write any value as pretty JSON, creating parent directories
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    tracing::debug!(path = %path.display(), "Wrote report");
    Ok(())
}

/// Write `swarm_report.json` and `summary.txt` into the run directory
///
/// Returns the report path.
pub fn save_run_report(results_root: &Path, report: &RunReport) -> Result<PathBuf> {
    let dir = run_dir(results_root, &report.run_id);
    let path = dir.join(SWARM_REPORT_FILE);
    save_json(&path, report)?;
    std::fs::write(dir.join(SUMMARY_FILE), render_summary(report))?;
    tracing::info!(path = %path.display(), "Saved run report");
    Ok(path)
}

pub fn save_aggregate_report(path: &Path, report: &AggregateReport) -> Result<()> {
    save_json(path, report)?;
    tracing::info!(path = %path.display(), cases = report.cases.len(), "Saved aggregate report");
    Ok(())
}

/// Plain-text digest of a run
pub fn render_summary(report: &RunReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Run {}", report.run_id);
    let _ = writeln!(out, "Passed: {}/{}", s.passed, s.total_cases);
    let _ = writeln!(out, "Average diff: {:.2}%", s.avg_diff_pct);
    let _ = writeln!(out, "Stable: {}/{}", s.stable, s.total_cases);
    if s.errored > 0 {
        let _ = writeln!(out, "Errored: {}", s.errored);
    }

    if !report.taxonomy.is_empty() {
        let mut buckets: Vec<(&String, &f64)> = report.taxonomy.iter().collect();
        buckets.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        let _ = writeln!(out, "\nTop root causes:");
        for (bucket, pct) in buckets.into_iter().take(SUMMARY_BUCKETS) {
            let _ = writeln!(out, "  {bucket:<16} {pct:>6.1}%");
        }
    }

    if !report.results.is_empty() {
        let _ = writeln!(out, "\nWorst cases:");
        for r in report.results.iter().take(SUMMARY_WORST) {
            let mark = if r.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(
                out,
                "  {mark} {:<32} {:>9} {:>7.2}% (range {:.2}..{:.2})",
                r.case_id, r.viewport, r.diff_pct_median, r.diff_pct_min, r.diff_pct_max
            );
        }
    }
    out
}

/// Load a report from a path or from a run id under `results_root`
///
/// For a run id the merged `aggregate_report.json` is preferred over the
/// per-run `swarm_report.json`.
pub fn load_report(arg: &str, results_root: &Path) -> Result<LoadedReport> {
    let direct = Path::new(arg);
    if direct.is_file() {
        return read_report(direct);
    }

    let dir = run_dir(results_root, arg);
    for name in [AGGREGATE_REPORT_FILE, SWARM_REPORT_FILE] {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return read_report(&candidate);
        }
    }
    Err(Error::ReportNotFound(arg.to_string()))
}

/// Parse a report file, telling the two kinds apart by shape
pub fn read_report(path: &Path) -> Result<LoadedReport> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    let report = if value.get("fix_scoreboard").is_some() || value.get("cases").is_some() {
        LoadedReport::Aggregate(Box::new(serde_json::from_value(value)?))
    } else if value.get("results").is_some() {
        LoadedReport::Run(Box::new(serde_json::from_value(value)?))
    } else {
        return Err(Error::Internal(format!(
            "'{}' is neither a run report nor an aggregate report",
            path.display()
        )));
    };
    tracing::debug!(path = %path.display(), "Loaded report");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, Scope, Viewport};
    use crate::report::merge::build_aggregate_report;
    use crate::report::types::{AggregatedResult, RunSettings, RunSummary};
    use chrono::Utc;
    use tempfile::TempDir;

    fn agg(case_id: &str, median: f64) -> AggregatedResult {
        AggregatedResult {
            case_id: case_id.to_string(),
            category: Category::Builtins,
            viewport: Viewport::new(1280, 800),
            threshold: 15.0,
            iterations: 2,
            scored_iterations: 2,
            diff_pct_median: median,
            diff_pct_min: median,
            diff_pct_max: median,
            diff_pct_variance: 0.0,
            stable: false,
            passed: median <= 15.0,
            best_iteration: Some(1),
            best_attribution_path: None,
            best_overlay_path: None,
            best_taxonomy: None,
            best_top_contributors: None,
            all_diffs: vec![median, median],
            errors: Vec::new(),
        }
    }

    fn run_report(run_id: &str) -> RunReport {
        RunReport {
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            settings: RunSettings {
                scope: Scope::Builtins,
                iterations: 2,
                jobs: 1,
                ..RunSettings::default()
            },
            shard: None,
            summary: RunSummary {
                total_cases: 2,
                passed: 1,
                failed: 1,
                avg_diff_pct: 12.5,
                total_units: 4,
                ..RunSummary::default()
            },
            taxonomy: [("text".to_string(), 70.0), ("images".to_string(), 30.0)]
                .into_iter()
                .collect(),
            results: vec![agg("hero", 20.0), agg("form", 5.0)],
            scout: Vec::new(),
            exploit: Vec::new(),
            exploit_skipped: Some("disabled".to_string()),
            elapsed_secs: 1.5,
        }
    }

    #[test]
    fn test_run_report_and_summary() {
        let tmp = TempDir::new().unwrap();
        let report = run_report("r1");
        let path = save_run_report(tmp.path(), &report).unwrap();
        assert_eq!(path, tmp.path().join("r1").join(SWARM_REPORT_FILE));

        let summary = std::fs::read_to_string(tmp.path().join("r1").join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("Passed: 1/2"));
        assert!(summary.contains("Average diff: 12.50%"));
        let text_at = summary.find("text").unwrap();
        let images_at = summary.find("images").unwrap();
        assert!(text_at < images_at);
        assert!(summary.contains("FAIL hero"));

        match load_report("r1", tmp.path()).unwrap() {
            LoadedReport::Run(loaded) => assert_eq!(*loaded, report),
            other => panic!("expected run report, got {other:?}"),
        }
    }

    #[test]
    fn test_run_id_prefers_aggregate() {
        let tmp = TempDir::new().unwrap();
        save_run_report(tmp.path(), &run_report("r2")).unwrap();
        let merged = build_aggregate_report(&[agg("hero", 20.0)], vec!["r2".to_string()]);
        save_aggregate_report(&tmp.path().join("r2").join(AGGREGATE_REPORT_FILE), &merged)
            .unwrap();

        let loaded = load_report("r2", tmp.path()).unwrap();
        assert!(matches!(loaded, LoadedReport::Aggregate(_)));
        assert_eq!(loaded.cases().len(), 1);
    }

    #[test]
    fn test_load_by_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("merged.json");
        let merged = build_aggregate_report(&[agg("a", 1.0), agg("b", 2.0)], Vec::new());
        save_aggregate_report(&path, &merged).unwrap();

        let loaded = load_report(path.to_str().unwrap(), Path::new("unused")).unwrap();
        assert_eq!(loaded.cases().len(), 2);
        assert!(loaded.run_ids().is_empty());
    }

    #[test]
    fn test_missing_report() {
        let tmp = TempDir::new().unwrap();
        let err = load_report("no-such-run", tmp.path()).unwrap_err();
        assert!(matches!(err, Error::ReportNotFound(_)));
    }

    #[test]
    fn test_unrecognized_shape() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("other.json");
        std::fs::write(&path, r#"{"hello": 1}"#).unwrap();
        assert!(read_report(&path).is_err());
    }
}
