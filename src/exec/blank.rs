//! Blank-frame gate
//!
//! A frame that is effectively one color must fail before any pixel
//! comparison runs, so an empty render can never score as a close match.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::common::config::BlankFrameConfig;

/// Result of inspecting one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankAnalysis {
    pub is_blank: bool,
    /// Fraction of pixels matching the background color
    pub background_ratio: f64,
    pub unique_colors: usize,
    pub total_pixels: u64,
    /// Why the frame could not be analyzed, if it could not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BlankAnalysis {
    fn unusable(error: String) -> Self {
        Self {
            is_blank: true,
            background_ratio: 1.0,
            unique_colors: 0,
            total_pixels: 0,
            error: Some(error),
        }
    }
}

/// Decode a frame file and analyze it
pub fn analyze_frame(path: &Path, config: &BlankFrameConfig) -> BlankAnalysis {
    match image::open(path) {
        Ok(img) => analyze_image(&img.to_rgb8(), config),
        Err(e) => BlankAnalysis::unusable(format!("unreadable frame {}: {}", path.display(), e)),
    }
}

/// Analyze decoded pixels
pub fn analyze_image(img: &RgbImage, config: &BlankFrameConfig) -> BlankAnalysis {
    let total = u64::from(img.width()) * u64::from(img.height());
    if total == 0 {
        return BlankAnalysis::unusable(format!("empty frame ({}x{})", img.width(), img.height()));
    }

    let [bg_r, bg_g, bg_b] = config.background;
    let tol = config.tolerance;
    let mut background = 0u64;
    let mut colors: HashMap<[u8; 3], u64> = HashMap::new();

    for pixel in img.pixels() {
        let [r, g, b] = pixel.0;
        if r.abs_diff(bg_r) <= tol && g.abs_diff(bg_g) <= tol && b.abs_diff(bg_b) <= tol {
            background += 1;
        }
        *colors.entry(pixel.0).or_insert(0) += 1;
    }

    let background_ratio = background as f64 / total as f64;
    let unique_colors = colors.len();
    let dominant = colors.values().copied().max().unwrap_or(0);
    let dominant_ratio = dominant as f64 / total as f64;

    let is_blank = background_ratio >= config.threshold
        || (unique_colors > 0
            && unique_colors < config.max_unique_colors
            && dominant_ratio >= config.threshold);

    BlankAnalysis {
        is_blank,
        background_ratio,
        unique_colors,
        total_pixels: total,
        error: None,
    }
}
