//! Reports: aggregation, merging, regression and gating
//!
//! Everything in here is pure data processing over results that have already
//! been produced. Only [`sink`] touches the filesystem.

pub mod aggregate;
pub mod gate;
pub mod merge;
pub mod regression;
pub mod sink;
pub mod types;

pub use aggregate::{aggregate_all, aggregate_iterations, build_run_report, median};
pub use gate::{evaluate, GateLevel, GateOutcome, GateOverrides, GatePolicy, GateReason};
pub use merge::{build_aggregate_report, merge_results};
pub use regression::{compare_cases, compare_reports};
pub use sink::{load_report, save_aggregate_report, save_json, save_run_report};
pub use types::{
    AggregateReport, AggregatedResult, CaseSummary, LoadedReport, RegressionReport, RunReport,
    RunSettings,
};
