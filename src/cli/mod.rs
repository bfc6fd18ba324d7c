//! CLI command handling
//!
//! Dispatches CLI commands and formats their output. Reports go to disk as
//! JSON; stdout only carries the human-readable digest (or JSON with `--json`).

use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{validate_identifier, Catalog, Viewport};
use crate::commands::Commands;
use crate::common::config::{Config, StabilityConfig};
use crate::common::paths::AGGREGATE_REPORT_FILE;
use crate::common::{Error, Result};
use crate::exec::{Capability, Executor};
use crate::report::{
    self, build_aggregate_report, build_run_report, compare_reports, merge_results, save_json,
    AggregateReport, GateLevel, GateOutcome, GateOverrides, RegressionReport,
    RunReport, RunSettings,
};
use crate::schedule::{run_swarm, SwarmOptions};
use crate::work::{self, RunId, Selection, ShardSpec};

/// Rows of the scoreboard printed after a merge
const SCOREBOARD_ROWS: usize = 10;

/// Result of a command that completed without a setup error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    fn from_passed(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<Verdict> {
    match command {
        Commands::Run {
            scope,
            cases,
            viewports,
            iterations,
            jobs,
            exploit_top,
            exploit_iterations,
            exploit_viewports,
            shard_index,
            shard_count,
            budget_minutes,
            max_variance,
            output_dir,
            run_id,
            catalog,
            dry_run,
        } => {
            if iterations == 0 {
                return Err(Error::Config("--iterations must be at least 1".to_string()));
            }
            if let Some(ids) = &cases {
                for id in ids {
                    validate_identifier("case id", id)?;
                }
            }

            let catalog_path = catalog.or_else(|| config.paths.catalog.clone());
            let catalog = Catalog::load_or_builtin(catalog_path.as_deref())?;
            let viewports = Viewport::parse_list(&viewports)?;
            let exploit_viewports = Viewport::parse_list(
                exploit_viewports
                    .as_deref()
                    .unwrap_or(config.exploit.viewports.as_slice()),
            )?;
            let shard = ShardSpec::from_parts(shard_index, shard_count)?;
            let run_id = match run_id {
                Some(id) => RunId::parse(&id)?,
                None => RunId::generate(),
            };
            let results_root = results_root_or(config, output_dir);
            let stability = StabilityConfig {
                max_variance: max_variance.unwrap_or(config.stability.max_variance),
                ..config.stability.clone()
            };

            let selection = Selection {
                scope,
                ids: cases.clone(),
            };
            let explicit_viewports = (!viewports.is_empty()).then_some(viewports.as_slice());
            let mut units = work::generate(
                &catalog,
                &selection,
                explicit_viewports,
                iterations,
                &config.thresholds,
            );
            let total = units.len();
            if let Some(spec) = shard {
                units = work::shard(units, spec);
                tracing::info!(shard = %spec, units = units.len(), total, "Sharded work");
            }
            if total == 0 {
                tracing::warn!(?scope, "No cases matched the selection");
                println!("{} no work units to execute", "Note:".yellow());
            }

            let options = SwarmOptions {
                jobs: jobs.unwrap_or(config.pool.jobs).max(1),
                exploit_top: exploit_top.unwrap_or(config.exploit.top),
                exploit_iterations: exploit_iterations.unwrap_or(config.exploit.iterations),
                exploit_viewports: exploit_viewports.clone(),
                budget: budget_minutes.map(|m| Duration::from_secs(m * 60)),
                min_exploit_window: Duration::from_secs(config.exploit.min_window_secs),
                dry_run,
            };

            println!(
                "{} run {} ({} units, {} workers)",
                "Starting".blue().bold(),
                run_id.as_str().bold(),
                units.len(),
                options.jobs
            );

            let executor = Arc::new(Executor::from_config(config, &results_root));
            let outcome = run_swarm(executor, &run_id, units, &options).await;

            if dry_run {
                for unit in &outcome.planned {
                    println!("  {} {}", "·".dimmed(), unit.key());
                }
            }

            let settings = RunSettings {
                scope,
                cases,
                viewports,
                iterations,
                jobs: options.jobs,
                exploit_top: options.exploit_top,
                exploit_iterations: options.exploit_iterations,
                exploit_viewports,
                budget_minutes,
                max_variance: stability.max_variance,
                min_iterations: stability.min_iterations,
            };
            let report = build_run_report(&run_id, settings, shard, &outcome, &stability);
            let path = report::save_run_report(&results_root, &report)?;

            print_run_report(&report);
            println!("\nReport: {}", path.display());

            Ok(Verdict::from_passed(
                report.results.iter().all(|r| r.passed),
            ))
        }

        Commands::Merge {
            runs,
            reports,
            output,
            results_root,
        } => {
            let root = results_root_or(config, results_root);
            let mut sources: Vec<String> = runs;
            sources.extend(reports.iter().map(|p| p.display().to_string()));
            if sources.is_empty() {
                return Err(Error::NothingToAggregate(
                    "pass --runs or at least one report path".to_string(),
                ));
            }

            let mut aggregated = Vec::new();
            let mut run_ids = Vec::new();
            for source in &sources {
                let loaded = report::load_report(source, &root)?;
                for id in loaded.run_ids() {
                    if !run_ids.contains(&id) {
                        run_ids.push(id);
                    }
                }
                aggregated.extend(loaded.aggregated());
            }

            let merged = merge_results(aggregated);
            let report = build_aggregate_report(&merged, run_ids);
            let path = output.unwrap_or_else(|| root.join(AGGREGATE_REPORT_FILE));
            report::save_aggregate_report(&path, &report)?;

            print_aggregate_report(&report);
            println!("\nReport: {}", path.display());
            Ok(Verdict::Pass)
        }

        Commands::Compare {
            baseline,
            current,
            regression_budget,
            output,
            results_root,
        } => {
            let root = results_root_or(config, results_root);
            let baseline = report::load_report(&baseline, &root)?;
            let current = report::load_report(&current, &root)?;

            let regression = compare_reports(&baseline, &current, regression_budget);
            if let Some(path) = &output {
                save_json(path, &regression)?;
            }

            print_regression_report(&regression);
            if let Some(path) = output {
                println!("\nReport: {}", path.display());
            }
            Ok(Verdict::from_passed(regression.passed))
        }

        Commands::Gate {
            report,
            level,
            max_diff,
            require_stable,
            max_variance,
            previous,
            regression_budget,
            json,
            results_root,
        } => {
            let root = results_root_or(config, results_root);
            let loaded = report::load_report(&report, &root)?;
            let previous = previous
                .map(|p| report::load_report(&p, &root))
                .transpose()?;

            let policy = level.policy().with_overrides(GateOverrides {
                max_diff,
                require_stable,
                max_variance,
                regression_budget,
            });
            let outcome = report::evaluate(&loaded, policy, previous.as_ref());

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_gate_outcome(level, &outcome);
            }
            Ok(Verdict::from_passed(outcome.passed))
        }

        Commands::Cases {
            scope,
            catalog,
            json,
        } => {
            let catalog_path = catalog.or_else(|| config.paths.catalog.clone());
            let catalog = Catalog::load_or_builtin(catalog_path.as_deref())?;
            let cases = catalog.select(scope, None);

            if json {
                println!("{}", serde_json::to_string_pretty(&cases)?);
            } else {
                println!("{} cases:", cases.len());
                for case in &cases {
                    println!(
                        "  {:<32} {:<9} {:>9}  {}",
                        case.id,
                        case.category,
                        case.native_viewport(),
                        case.document.display().to_string().dimmed()
                    );
                }
            }
            Ok(Verdict::Pass)
        }

        Commands::Check { json } => {
            let capabilities = [
                Capability::probe("capture", &config.capture.program),
                Capability::probe("compare", &config.compare.program),
            ];
            let all_available = capabilities.iter().all(Capability::is_available);

            if json {
                println!("{}", serde_json::to_string_pretty(&capabilities)?);
            } else {
                for cap in &capabilities {
                    match cap {
                        Capability::Available { tool, path } => {
                            println!("  {} {:<8} {}", "✓".green(), tool, path.display());
                        }
                        Capability::Unavailable { tool, reason } => {
                            println!("  {} {:<8} {}", "✗".red(), tool, reason);
                        }
                    }
                }
                if !config.paths.baselines_root.is_dir() {
                    println!(
                        "  {} baselines root {} does not exist",
                        "!".yellow(),
                        config.paths.baselines_root.display()
                    );
                }
            }
            Ok(Verdict::from_passed(all_available))
        }
    }
}

fn status_mark(passed: bool) -> colored::ColoredString {
    if passed {
        "✓".green()
    } else {
        "✗".red()
    }
}

fn print_run_report(report: &RunReport) {
    let s = &report.summary;
    println!();
    println!(
        "{} {}/{} passed, {}/{} stable, avg diff {:.2}%",
        "Summary:".bold(),
        s.passed,
        s.total_cases,
        s.stable,
        s.total_cases,
        s.avg_diff_pct
    );
    if s.errored > 0 {
        println!("  {} {} cases produced no diff", "!".yellow(), s.errored);
    }
    if let Some(reason) = &report.exploit_skipped {
        println!("  Exploit skipped: {}", reason.dimmed());
    }

    for r in &report.results {
        let stable = if r.stable { "stable" } else { "unstable" };
        println!(
            "  {} {:<32} {:>9} {:>7.2}% (≤ {:.1}%) {}",
            status_mark(r.passed),
            r.case_id,
            r.viewport,
            r.diff_pct_median,
            r.threshold,
            stable.dimmed()
        );
        if let Some(err) = r.errors.first().filter(|_| r.is_errored()) {
            println!("      {}", err.red());
        }
    }
}

fn print_aggregate_report(report: &AggregateReport) {
    let s = &report.summary;
    println!(
        "{} {} runs, {}/{} passed, avg diff {:.2}%",
        "Merged:".bold(),
        report.runs.len(),
        s.passed,
        s.total_cases,
        s.avg_diff_pct
    );

    let board = &report.fix_scoreboard;
    if board.top_contributors.is_empty() {
        println!("No attributed diff pixels.");
        return;
    }

    println!("\n{}", "Fix scoreboard:".bold());
    for entry in board.top_contributors.iter().take(SCOREBOARD_ROWS) {
        println!(
            "  {:>2}. {:<40} {:>6.1}%  {} cases  {}",
            entry.rank,
            entry.selector,
            entry.contribution_pct,
            entry.case_count,
            entry.likely_cause.as_deref().unwrap_or("-").dimmed()
        );
    }
    for n in [1, 5, 10] {
        if let Some(gain) = board.projected_gains.get(&format!("top_{n}")) {
            println!("  Fixing top {n}: {gain:.1}% of diff pixels");
        }
    }
}

fn print_regression_report(report: &RegressionReport) {
    let s = &report.summary;
    println!(
        "{} {} compared: {} regressions, {} improvements, {} unchanged, {} new failures",
        "Regression check:".bold(),
        s.compared,
        s.regressions,
        s.improvements,
        s.unchanged,
        s.new_failures
    );
    for d in &report.regressions {
        println!(
            "  {} {:<32} {:>9} {:.2}% → {:.2}% (+{:.2})",
            "▲".red(),
            d.case_id,
            d.viewport,
            d.baseline_diff,
            d.current_diff,
            d.delta
        );
    }
    for f in &report.new_failures {
        println!(
            "  {} {:<32} {:>9} new failure at {:.2}%",
            "✗".red(),
            f.case_id,
            f.viewport,
            f.diff_pct
        );
    }
    for d in &report.improvements {
        println!(
            "  {} {:<32} {:>9} {:.2}% → {:.2}% ({:.2})",
            "▼".green(),
            d.case_id,
            d.viewport,
            d.baseline_diff,
            d.current_diff,
            d.delta
        );
    }
    for shift in &report.taxonomy_shifts {
        println!(
            "  taxonomy {:<16} {:.1}% → {:.1}%",
            shift.bucket, shift.baseline_pct, shift.current_pct
        );
    }
    println!(
        "\n{} {}",
        status_mark(report.passed),
        if report.passed { "No regressions" } else { "Regressions found" }
    );
}

fn print_gate_outcome(level: GateLevel, outcome: &GateOutcome) {
    let p = &outcome.policy;
    println!(
        "{} {}: max diff {:.2}%, stable {}, max variance {:.2}, budget {:.2}",
        "Gate".bold(),
        level.as_str(),
        p.max_diff,
        if p.require_stable { "required" } else { "optional" },
        p.max_variance,
        p.regression_budget
    );
    for f in &outcome.failures {
        println!(
            "  {} {:<32} {:>9} {:<9} {}",
            "✗".red(),
            f.case_id,
            f.viewport,
            f.reason.to_string(),
            f.detail.as_deref().unwrap_or("").dimmed()
        );
    }
    for d in &outcome.regressions {
        println!(
            "  {} {:<32} {:>9} regression +{:.2}",
            "✗".red(),
            d.case_id,
            d.viewport,
            d.delta
        );
    }
    let failed = outcome.failures.len();
    println!(
        "\n{} {}/{} cases within the gate",
        status_mark(outcome.passed),
        outcome.total - failed.min(outcome.total),
        outcome.total
    );
}

fn results_root_or(config: &Config, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| config.paths.results_root.clone())
}
