//! Read-only reference baseline store

use std::path::{Path, PathBuf};

use crate::catalog::Category;

/// Reference artifacts for one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    pub image: PathBuf,
    pub layout_rects: Option<PathBuf>,
    pub computed_styles: Option<PathBuf>,
}

/// Baselines laid out as `<root>/<category>/<case_id>/baseline.png`
#[derive(Debug, Clone)]
pub struct BaselineStore {
    root: PathBuf,
}

impl BaselineStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the baseline for a case; `None` when no reference image exists
    pub fn lookup(&self, case_id: &str, category: Category) -> Option<Baseline> {
        let dir = self.root.join(category.as_str()).join(case_id);
        let image = dir.join("baseline.png");
        if !image.is_file() {
            return None;
        }

        let side_file = |name: &str| Some(dir.join(name)).filter(|p| p.is_file());

        Some(Baseline {
            image,
            layout_rects: side_file("layout-rects.json"),
            computed_styles: side_file("computed-styles.json"),
        })
    }
}
