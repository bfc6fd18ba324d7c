//! CLI command definitions
//!
//! Defines the clap commands for the parity CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::catalog::Scope;
use crate::report::GateLevel;

#[derive(Subcommand)]
pub enum Commands {
    /// Capture, compare and aggregate a selection of cases
    Run {
        /// Which catalog categories to run
        #[arg(long, value_enum, default_value = "all")]
        scope: Scope,

        /// Explicit case ids (comma separated); overrides --scope
        #[arg(long, value_delimiter = ',')]
        cases: Option<Vec<String>>,

        /// Viewports to run every case at, e.g. 800x600,1280x800
        /// (default: each case's native viewport)
        #[arg(long, value_delimiter = ',')]
        viewports: Vec<String>,

        /// Scout iterations per case and viewport
        #[arg(long, default_value = "1")]
        iterations: u32,

        /// Concurrent workers (default: from config)
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Worst scout cases to revisit (0 disables exploit)
        #[arg(long)]
        exploit_top: Option<usize>,

        /// Iterations per exploit case and viewport
        #[arg(long)]
        exploit_iterations: Option<u32>,

        /// Viewports for the exploit phase
        #[arg(long, value_delimiter = ',')]
        exploit_viewports: Option<Vec<String>>,

        /// This process's shard index (requires --shard-count)
        #[arg(long)]
        shard_index: Option<usize>,

        /// Total number of shards (requires --shard-index)
        #[arg(long)]
        shard_count: Option<usize>,

        /// Wall-clock budget; exploit is skipped when too little remains
        #[arg(long)]
        budget_minutes: Option<u64>,

        /// Stability ceiling for max - min diff (default: from config)
        #[arg(long)]
        max_variance: Option<f64>,

        /// Results root (default: from config)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Run id to use instead of a generated one
        #[arg(long)]
        run_id: Option<String>,

        /// YAML case catalog (default: from config, else built-in)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Plan the work and write the report without invoking any tool
        #[arg(long)]
        dry_run: bool,
    },

    /// Merge several run reports into one aggregate with a fix scoreboard
    Merge {
        /// Run ids under the results root
        #[arg(long, value_delimiter = ',')]
        runs: Vec<String>,

        /// Report files to merge
        reports: Vec<PathBuf>,

        /// Where to write the aggregate report
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Results root used to resolve run ids
        #[arg(long)]
        results_root: Option<PathBuf>,
    },

    /// Compare a current report against a baseline report
    Compare {
        /// Baseline report path or run id
        #[arg(long)]
        baseline: String,

        /// Current report path or run id
        #[arg(long)]
        current: String,

        /// Allowed diff increase in percentage points
        #[arg(long, default_value = "0.5")]
        regression_budget: f64,

        /// Where to write the regression report
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Results root used to resolve run ids
        #[arg(long)]
        results_root: Option<PathBuf>,
    },

    /// Apply a CI gate level to a report
    Gate {
        /// Report path or run id
        #[arg(long)]
        report: String,

        /// Gate strictness
        #[arg(long, value_enum, default_value = "commit")]
        level: GateLevel,

        /// Override the level's maximum median diff
        #[arg(long)]
        max_diff: Option<f64>,

        /// Override whether every case must be stable
        #[arg(long)]
        require_stable: Option<bool>,

        /// Override the level's variance ceiling
        #[arg(long)]
        max_variance: Option<f64>,

        /// Previous report (path or run id) to check for regressions
        #[arg(long)]
        previous: Option<String>,

        /// Override the level's regression budget
        #[arg(long)]
        regression_budget: Option<f64>,

        /// Output the gate outcome as JSON
        #[arg(long)]
        json: bool,

        /// Results root used to resolve run ids
        #[arg(long)]
        results_root: Option<PathBuf>,
    },

    /// List the case catalog
    Cases {
        /// Only cases in this scope
        #[arg(long, value_enum, default_value = "all")]
        scope: Scope,

        /// YAML case catalog (default: from config, else built-in)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the capture and compare tools can be found
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
