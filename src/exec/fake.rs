//! In-process adapters for scheduler and pool tests

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::capture::{CaptureAdapter, CaptureRequest};
use super::compare::{CompareAdapter, CompareOutput, CompareRequest};
use super::{BaselineStore, Executor};
use crate::catalog::Category;
use crate::common::config::Config;
use crate::common::{Error, Result};

/// Behaviour is chosen by the document name: `blank`, `fail` or `crash`
pub struct ScriptedCapture;

#[async_trait]
impl CaptureAdapter for ScriptedCapture {
    async fn capture(&self, request: &CaptureRequest, _timeout: Duration) -> Result<()> {
        let doc = request.document.to_string_lossy();
        if doc.contains("crash") {
            panic!("renderer crashed on {doc}");
        }
        if doc.contains("fail") {
            return Err(Error::CaptureFailed(format!("cannot render {doc}")));
        }

        if let Some(parent) = request.frame.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        if !doc.contains("blank") {
            for y in 0..4 {
                for x in 0..8 {
                    img.put_pixel(x, y, Rgb([(x * 30) as u8, (y * 60) as u8, 120]));
                }
            }
        }
        img.save_with_format(&request.frame, image::ImageFormat::Pnm)
            .map_err(|e| Error::CaptureFailed(e.to_string()))
    }
}

/// Returns a fixed diff per case id, plus `step * (iteration - 1)`
pub struct ScriptedCompare {
    pub diffs: HashMap<String, f64>,
    pub step: f64,
}

#[async_trait]
impl CompareAdapter for ScriptedCompare {
    async fn compare(&self, request: &CompareRequest, _timeout: Duration) -> Result<CompareOutput> {
        // <root>/<run>/<case>/<WxH>/iter-N/capture/frame.ppm
        let iter_dir = request.frame.parent().and_then(Path::parent);
        let iteration: u32 = iter_dir
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("iter-"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        let case_id = iter_dir
            .and_then(Path::parent)
            .and_then(Path::parent)
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let base = self.diffs.get(case_id).copied().unwrap_or(0.0);
        let diff = base + self.step * f64::from(iteration.saturating_sub(1));
        Ok(CompareOutput {
            diff_percent: diff,
            diff_pixels: (diff * 10.0) as u64,
            total_pixels: 1000,
            top_contributors: None,
            taxonomy: None,
        })
    }
}

/// Executor over scripted adapters with a baseline for every listed case
pub fn executor(root: &Path, cases: &[(&str, f64)], step: f64) -> Arc<Executor> {
    let baselines = root.join("baselines");
    for (case_id, _) in cases {
        let dir = baselines.join(Category::Micro.as_str()).join(case_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("baseline.png"), b"png").unwrap();
    }

    let compare = ScriptedCompare {
        diffs: cases.iter().map(|(id, d)| (id.to_string(), *d)).collect(),
        step,
    };

    Arc::new(Executor::new(
        Arc::new(ScriptedCapture),
        Arc::new(compare),
        BaselineStore::new(baselines),
        root.join("results"),
        &Config::default(),
    ))
}
