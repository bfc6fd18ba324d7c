//! Scout / exploit scheduling
//!
//! Scout runs every selected unit once through the pool. Exploit then revisits
//! the worst-scoring cases at more viewports and iterations, if enough of the
//! wall-clock budget remains. The budget is only checked between phases.

pub mod pool;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::Viewport;
use crate::exec::{CaseResult, Executor};
use crate::work::{RunId, WorkUnit};

pub use pool::run_pool;

/// Scheduler settings for one run
#[derive(Debug, Clone)]
pub struct SwarmOptions {
    pub jobs: usize,
    /// Worst cases to revisit; 0 disables exploit
    pub exploit_top: usize,
    pub exploit_iterations: u32,
    pub exploit_viewports: Vec<Viewport>,
    /// Wall-clock budget for the whole run
    pub budget: Option<Duration>,
    /// Exploit only starts with at least this much budget left
    pub min_exploit_window: Duration,
    pub dry_run: bool,
}

impl Default for SwarmOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            exploit_top: 0,
            exploit_iterations: 3,
            exploit_viewports: crate::catalog::STANDARD_VIEWPORTS.to_vec(),
            budget: None,
            min_exploit_window: Duration::from_secs(60),
            dry_run: false,
        }
    }
}

/// Why the exploit phase did not run
#[derive(Debug, Clone, PartialEq)]
pub enum ExploitSkip {
    Disabled,
    NothingToExploit,
    BudgetExhausted { remaining_secs: f64 },
    DryRun,
}

impl std::fmt::Display for ExploitSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExploitSkip::Disabled => write!(f, "exploit disabled"),
            ExploitSkip::NothingToExploit => write!(f, "no scored cases to exploit"),
            ExploitSkip::BudgetExhausted { remaining_secs } => {
                write!(f, "only {remaining_secs:.0}s of budget remaining")
            }
            ExploitSkip::DryRun => write!(f, "dry run"),
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct SwarmOutcome {
    /// Scout units as planned (executed unless dry run)
    pub planned: Vec<WorkUnit>,
    pub scout: Vec<CaseResult>,
    pub exploit: Vec<CaseResult>,
    pub exploit_skipped: Option<ExploitSkip>,
    pub elapsed: Duration,
}

impl SwarmOutcome {
    /// Scout and exploit results together
    pub fn all_results(&self) -> Vec<CaseResult> {
        self.scout.iter().chain(&self.exploit).cloned().collect()
    }
}

/// Run scout, then exploit when configured and the budget allows
pub async fn run_swarm(
    executor: Arc<Executor>,
    run_id: &RunId,
    units: Vec<WorkUnit>,
    options: &SwarmOptions,
) -> SwarmOutcome {
    let start = Instant::now();

    if options.dry_run {
        tracing::info!(units = units.len(), "Dry run, nothing executed");
        return SwarmOutcome {
            planned: units,
            scout: Vec::new(),
            exploit: Vec::new(),
            exploit_skipped: Some(ExploitSkip::DryRun),
            elapsed: start.elapsed(),
        };
    }

    let scout = run_pool(
        Arc::clone(&executor),
        run_id,
        units.clone(),
        options.jobs,
        "scout",
    )
    .await;
    let scout_elapsed = start.elapsed();
    tracing::info!(
        results = scout.len(),
        elapsed_secs = scout_elapsed.as_secs_f64(),
        "Scout phase complete"
    );

    let (exploit, exploit_skipped) = match exploit_decision(options, scout_elapsed) {
        Some(skip) => (Vec::new(), Some(skip)),
        None => {
            let plan = plan_exploit(&scout, options);
            if plan.is_empty() {
                (Vec::new(), Some(ExploitSkip::NothingToExploit))
            } else {
                tracing::info!(units = plan.len(), "Starting exploit phase");
                (
                    run_pool(executor, run_id, plan, options.jobs, "exploit").await,
                    None,
                )
            }
        }
    };

    if let Some(skip) = &exploit_skipped {
        if *skip != ExploitSkip::Disabled {
            tracing::info!(reason = %skip, "Skipping exploit phase");
        }
    }

    SwarmOutcome {
        planned: units,
        scout,
        exploit,
        exploit_skipped,
        elapsed: start.elapsed(),
    }
}

/// Decide at the phase boundary whether exploit may start
fn exploit_decision(options: &SwarmOptions, scout_elapsed: Duration) -> Option<ExploitSkip> {
    if options.exploit_top == 0 || options.exploit_iterations == 0 {
        return Some(ExploitSkip::Disabled);
    }
    let budget = options.budget?;
    let remaining = budget.saturating_sub(scout_elapsed);
    if scout_elapsed >= budget || remaining < options.min_exploit_window {
        let remaining_secs = budget.as_secs_f64() - scout_elapsed.as_secs_f64();
        return Some(ExploitSkip::BudgetExhausted { remaining_secs });
    }
    None
}

/// Rank cases by their worst scored diff, worst first
///
/// Errored results are ignored; a case with no scored result is not ranked.
pub fn rank_cases(results: &[CaseResult]) -> Vec<(String, f64)> {
    let mut worst: HashMap<&str, f64> = HashMap::new();
    for result in results.iter().filter(|r| !r.is_errored()) {
        let entry = worst.entry(result.case_id.as_str()).or_insert(result.diff_pct);
        if result.diff_pct > *entry {
            *entry = result.diff_pct;
        }
    }

    let mut ranked: Vec<(String, f64)> = worst
        .into_iter()
        .map(|(id, diff)| (id.to_string(), diff))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

/// Exploit units for the top ranked cases
///
/// Iterations continue after the highest scout iteration for each
/// (case, viewport), so exploit never reuses a scout identity.
pub fn plan_exploit(scout: &[CaseResult], options: &SwarmOptions) -> Vec<WorkUnit> {
    let ranked = rank_cases(scout);

    let mut highest: HashMap<(&str, Viewport), u32> = HashMap::new();
    let mut templates: BTreeMap<&str, &CaseResult> = BTreeMap::new();
    for result in scout {
        let entry = highest
            .entry((result.case_id.as_str(), result.viewport))
            .or_insert(0);
        *entry = (*entry).max(result.iteration);
        templates.entry(result.case_id.as_str()).or_insert(result);
    }

    let mut units = Vec::new();
    for (case_id, diff) in ranked.iter().take(options.exploit_top) {
        let Some(template) = templates.get(case_id.as_str()) else {
            continue;
        };
        tracing::info!(case = %case_id, diff, "Exploit target");

        for viewport in &options.exploit_viewports {
            let offset = highest
                .get(&(case_id.as_str(), *viewport))
                .copied()
                .unwrap_or(0);
            for i in 1..=options.exploit_iterations {
                units.push(WorkUnit {
                    case_id: case_id.clone(),
                    document: template.document.clone(),
                    category: template.category,
                    viewport: *viewport,
                    iteration: offset + i,
                    threshold: template.threshold,
                });
            }
        }
    }
    units
}
