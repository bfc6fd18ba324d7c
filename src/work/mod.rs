//! Work generation and sharding
//!
//! Turns a catalog selection into a deterministic, sorted list of work units
//! and splits that list across CI shards by position.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use crate::catalog::{validate_identifier, Catalog, Category, Scope, Viewport};
use crate::common::config::ThresholdConfig;
use crate::common::{Error, Result};

/// One (case, viewport, iteration) to execute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub case_id: String,
    pub document: PathBuf,
    pub category: Category,
    pub viewport: Viewport,
    /// 1-based
    pub iteration: u32,
    /// Max diff % for a pass
    pub threshold: f64,
}

impl WorkUnit {
    pub fn key(&self) -> UnitKey {
        UnitKey {
            case_id: self.case_id.clone(),
            viewport: self.viewport,
            iteration: self.iteration,
        }
    }

    fn sort_key(&self) -> (&str, String, u32) {
        (&self.case_id, self.viewport.label(), self.iteration)
    }
}

impl PartialEq for WorkUnit {
    fn eq(&self, other: &Self) -> bool {
        self.case_id == other.case_id
            && self.viewport == other.viewport
            && self.iteration == other.iteration
    }
}

impl Eq for WorkUnit {}

impl Hash for WorkUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.case_id.hash(state);
        self.viewport.hash(state);
        self.iteration.hash(state);
    }
}

impl PartialOrd for WorkUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorkUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Identity of a work unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitKey {
    pub case_id: String,
    pub viewport: Viewport,
    pub iteration: u32,
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.case_id, self.viewport, self.iteration)
    }
}

/// Which cases to generate work for
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub scope: Scope,
    /// Explicit case ids; when non-empty the scope is ignored
    pub ids: Option<Vec<String>>,
}

impl Selection {
    pub fn scope(scope: Scope) -> Self {
        Self { scope, ids: None }
    }

    pub fn ids(ids: Vec<String>) -> Self {
        Self {
            scope: Scope::All,
            ids: Some(ids),
        }
    }
}

/// Expand a selection into sorted work units
///
/// Each selected case runs at every given viewport, or at its native viewport
/// when none are given, for iterations `1..=iterations`.
pub fn generate(
    catalog: &Catalog,
    selection: &Selection,
    viewports: Option<&[Viewport]>,
    iterations: u32,
    thresholds: &ThresholdConfig,
) -> Vec<WorkUnit> {
    let cases = catalog.select(selection.scope, selection.ids.as_deref());
    let mut units = Vec::new();

    for case in cases {
        let case_viewports: Vec<Viewport> = match viewports {
            Some(list) if !list.is_empty() => list.to_vec(),
            _ => vec![case.native_viewport()],
        };
        let threshold = case.threshold(thresholds);

        for viewport in case_viewports {
            for iteration in 1..=iterations {
                units.push(WorkUnit {
                    case_id: case.id.clone(),
                    document: case.document.clone(),
                    category: case.category,
                    viewport,
                    iteration,
                    threshold,
                });
            }
        }
    }

    units.sort();
    units.dedup();
    units
}

/// A CI shard: this process runs shard `index` of `count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSpec {
    pub index: usize,
    pub count: usize,
}

impl ShardSpec {
    pub fn new(index: usize, count: usize) -> Result<Self> {
        if count == 0 || index >= count {
            return Err(Error::InvalidShard { index, count });
        }
        Ok(Self { index, count })
    }

    /// Build from optional CLI values, which must be given together
    pub fn from_parts(index: Option<usize>, count: Option<usize>) -> Result<Option<Self>> {
        match (index, count) {
            (None, None) => Ok(None),
            (Some(index), Some(count)) => Self::new(index, count).map(Some),
            _ => Err(Error::Config(
                "--shard-index and --shard-count must be given together".to_string(),
            )),
        }
    }
}

impl fmt::Display for ShardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

/// Keep the units at positions `i` where `i mod count == index`
pub fn shard(units: Vec<WorkUnit>, spec: ShardSpec) -> Vec<WorkUnit> {
    units
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % spec.count == spec.index)
        .map(|(_, unit)| unit)
        .collect()
}

/// Identity of one harness session, used as a directory name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Fresh id of the form `YYYYMMDD-HHMMSS-xxxxxxxx`
    pub fn generate() -> Self {
        let now = Local::now();
        let salt = std::process::id().rotate_left(16) ^ now.timestamp_subsec_nanos();
        Self(format!("{}-{:08x}", now.format("%Y%m%d-%H%M%S"), salt))
    }

    /// Accept a caller-supplied id if it is path-safe
    pub fn parse(value: &str) -> Result<Self> {
        validate_identifier("run id", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
