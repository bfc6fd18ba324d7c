//! Fixed-size worker pool
//!
//! Workers pull units from a shared queue and send `(UnitKey, CaseResult)`
//! back over a channel. The collector re-associates results by key, so
//! completion order never matters.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::exec::{CaseResult, Executor, FailureKind};
use crate::work::{RunId, UnitKey, WorkUnit};

/// Run every unit through `jobs` concurrent workers
///
/// Returns one result per unit, in input order. A unit that panics gets a
/// capture failure and its worker moves on to the next unit; a unit whose
/// worker died before reporting gets a synthesized one.
pub async fn run_pool(
    executor: Arc<Executor>,
    run_id: &RunId,
    units: Vec<WorkUnit>,
    jobs: usize,
    label: &str,
) -> Vec<CaseResult> {
    if units.is_empty() {
        return Vec::new();
    }

    let workers = jobs.max(1).min(units.len());
    tracing::info!(phase = label, units = units.len(), workers, "Starting worker pool");

    let queue = Arc::new(Mutex::new(units.iter().cloned().collect::<VecDeque<_>>()));
    let (tx, mut rx) = mpsc::channel::<(UnitKey, CaseResult)>(workers * 2);

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let queue = Arc::clone(&queue);
        let executor = Arc::clone(&executor);
        let run_id = run_id.clone();
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            while let Some(unit) = next_unit(&queue) {
                let result = execute_isolated(&executor, &unit, &run_id).await;
                if tx.send((unit.key(), result)).await.is_err() {
                    break;
                }
            }
            tracing::trace!(worker, "Worker drained queue");
        }));
    }
    drop(tx);

    let progress = progress_bar(units.len() as u64, label);
    let mut collected: HashMap<UnitKey, CaseResult> = HashMap::with_capacity(units.len());

    while let Some((key, result)) = rx.recv().await {
        let status = if result.passed { "pass" } else { "fail" };
        tracing::debug!(unit = %key, status, diff = result.diff_pct, "Unit finished");
        progress.set_message(format!("{key} {status}"));
        progress.inc(1);
        collected.insert(key, result);
    }

    for (worker, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            tracing::warn!(worker, error = %e, "Worker terminated abnormally");
        }
    }
    progress.finish_and_clear();

    units
        .iter()
        .map(|unit| {
            collected.remove(&unit.key()).unwrap_or_else(|| {
                CaseResult::failed(unit, FailureKind::CaptureFailure, "worker terminated")
            })
        })
        .collect()
}

/// Run one unit in its own task so a panic fails only that unit
async fn execute_isolated(executor: &Arc<Executor>, unit: &WorkUnit, run_id: &RunId) -> CaseResult {
    let task = {
        let executor = Arc::clone(executor);
        let unit = unit.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move { executor.execute(&unit, &run_id).await })
    };
    match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(unit = %unit.key(), error = %e, "Unit execution panicked");
            CaseResult::failed(unit, FailureKind::CaptureFailure, format!("execution panicked: {e}"))
        }
    }
}

fn next_unit(queue: &Mutex<VecDeque<WorkUnit>>) -> Option<WorkUnit> {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .pop_front()
}

fn progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {prefix:>8} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_prefix(label.to_string());
    pb
}
