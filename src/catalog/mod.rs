//! Case catalog
//!
//! The catalog is an immutable registry of named cases built once at startup,
//! either from the built-in list or from a YAML file, and handed explicitly to
//! the work generator.

mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::common::config::ThresholdConfig;
use crate::common::{Error, Result};

/// Case category, also the first path segment of the baseline store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Browser chrome and internal pages
    Builtins,
    /// Realistic multi-feature pages
    Websuite,
    /// Single-feature micro tests
    Micro,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Builtins => "builtins",
            Category::Websuite => "websuite",
            Category::Micro => "micro",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the catalog to select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    All,
    Builtins,
    Websuite,
    Micro,
}

impl Scope {
    /// Whether a category falls inside this scope
    pub fn includes(&self, category: Category) -> bool {
        match self {
            Scope::All => true,
            Scope::Builtins => category == Category::Builtins,
            Scope::Websuite => category == Category::Websuite,
            Scope::Micro => category == Category::Micro,
        }
    }
}

/// A render target size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `WxH` label, also used as a path segment
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Parse a comma-separated list of viewport labels
    pub fn parse_list(list: &[String]) -> Result<Vec<Viewport>> {
        list.iter().map(|s| s.parse()).collect()
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.label())
    }
}

impl FromStr for Viewport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (w, h) = trimmed
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::InvalidViewport(s.to_string()))?;
        let width: u32 = w.parse().map_err(|_| Error::InvalidViewport(s.to_string()))?;
        let height: u32 = h.parse().map_err(|_| Error::InvalidViewport(s.to_string()))?;
        if width == 0 || height == 0 {
            return Err(Error::InvalidViewport(s.to_string()));
        }
        Ok(Self { width, height })
    }
}

/// Viewports used for multi-viewport runs
pub const STANDARD_VIEWPORTS: [Viewport; 3] = [
    Viewport::new(800, 600),
    Viewport::new(1280, 800),
    Viewport::new(1920, 1080),
];

/// A named test scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Unique, path-safe identity
    pub id: String,
    /// Source document handed to the renderer
    pub document: PathBuf,
    /// Intrinsic viewport width
    pub width: u32,
    /// Intrinsic viewport height
    pub height: u32,
    pub category: Category,
    /// Explicit max diff %, overriding the keyword rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl Case {
    pub fn native_viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    /// Resolve the pass threshold for this case
    pub fn threshold(&self, rules: &ThresholdConfig) -> f64 {
        self.threshold.unwrap_or_else(|| rules.threshold_for(&self.id))
    }
}

/// On-disk YAML shape of a catalog file
#[derive(Debug, Deserialize)]
struct CatalogFile {
    cases: Vec<Case>,
}

/// Immutable registry of cases, sorted by id
#[derive(Debug, Clone)]
pub struct Catalog {
    cases: Vec<Case>,
}

impl Catalog {
    /// Build a catalog, rejecting unsafe ids and duplicate identities
    pub fn new(mut cases: Vec<Case>) -> Result<Self> {
        let mut seen = HashSet::new();
        for case in &cases {
            validate_identifier("case id", &case.id)?;
            if case.width == 0 || case.height == 0 {
                return Err(Error::CatalogParse(format!(
                    "case '{}' has an empty viewport {}x{}",
                    case.id, case.width, case.height
                )));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(Error::DuplicateCase(case.id.clone()));
            }
        }
        cases.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self { cases })
    }

    /// The catalog compiled into the binary
    pub fn builtin() -> Self {
        let mut cases = builtin::cases();
        cases.sort_by(|a, b| a.id.cmp(&b.id));
        Self { cases }
    }

    /// Load a YAML catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let file: CatalogFile = serde_yaml::from_str(&content)
            .map_err(|e| Error::CatalogParse(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::new(file.cases)?;
        tracing::debug!(path = %path.display(), cases = catalog.len(), "Loaded case catalog");
        Ok(catalog)
    }

    /// Load from a file when given, the built-in list otherwise
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::builtin()),
        }
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Case> {
        self.cases
            .binary_search_by(|c| c.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.cases[i])
    }

    /// Select cases by explicit ids, or by scope when no ids are given
    ///
    /// Unknown ids are skipped with a warning. The result is ordered by id and
    /// may be empty.
    pub fn select(&self, scope: Scope, ids: Option<&[String]>) -> Vec<&Case> {
        match ids {
            Some(ids) if !ids.is_empty() => {
                let mut selected: Vec<&Case> = Vec::new();
                for id in ids {
                    match self.get(id) {
                        Some(case) if !selected.iter().any(|c| c.id == case.id) => {
                            selected.push(case)
                        }
                        Some(_) => {}
                        None => tracing::warn!(case = %id, "Unknown case id, skipping"),
                    }
                }
                selected.sort_by(|a, b| a.id.cmp(&b.id));
                selected
            }
            _ => self
                .cases
                .iter()
                .filter(|c| scope.includes(c.category))
                .collect(),
        }
    }
}

/// Check that an identity is safe to use as a single path segment
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_identifier(kind, value))
    }
}
