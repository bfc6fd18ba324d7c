//! Mock renderer and comparator binary for integration testing
//!
//! Stands in for both external tools so the harness can be exercised end to
//! end without a real renderer or diff oracle.
//!
//! ```text
//! mock_renderer capture --html-file DOC --width W --height H --dump-frame OUT [--dump-layout OUT]
//! mock_renderer compare --baseline IMG --candidate FRAME --out DIR [--rects F] [--styles F]
//! ```
//!
//! Capture behavior is keyed on the document's contents: `blank` renders an
//! all-white frame, `fail` exits non-zero, `hang` sleeps past any sane
//! timeout. The comparator reads the diff percentage to report from the
//! baseline file itself (a number, or `error`).

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() {
    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_default();
    let flags = parse_flags(args);

    let code = match mode.as_str() {
        "capture" => capture(&flags),
        "compare" => compare(&flags),
        other => {
            eprintln!("unknown mode '{other}', expected capture or compare");
            2
        }
    };
    std::process::exit(code);
}

/// `--name value` pairs; an empty value is kept as empty
fn parse_flags(args: impl Iterator<Item = String>) -> HashMap<String, String> {
    let mut flags = HashMap::new();
    let mut pending: Option<String> = None;
    for arg in args {
        match pending.take() {
            Some(name) => {
                flags.insert(name, arg);
            }
            None => {
                if let Some(name) = arg.strip_prefix("--") {
                    pending = Some(name.to_string());
                }
            }
        }
    }
    flags
}

fn required<'a>(flags: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    let value = flags.get(name).map(String::as_str).filter(|v| !v.is_empty());
    if value.is_none() {
        eprintln!("missing --{name}");
    }
    value
}

fn capture(flags: &HashMap<String, String>) -> i32 {
    let (Some(document), Some(frame)) = (required(flags, "html-file"), required(flags, "dump-frame"))
    else {
        return 2;
    };
    let width: u32 = flags.get("width").and_then(|w| w.parse().ok()).unwrap_or(64);
    let height: u32 = flags.get("height").and_then(|h| h.parse().ok()).unwrap_or(48);

    let content = match std::fs::read_to_string(document) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cannot read document {document}: {e}");
            return 3;
        }
    };

    if content.contains("hang") {
        std::thread::sleep(Duration::from_secs(60));
        return 0;
    }
    if content.contains("fail") {
        eprintln!("layout engine panicked while rendering {document}");
        return 101;
    }

    // Keep frames small; the harness only inspects their colors
    let (w, h) = (width.min(64), height.min(48));
    let img = if content.contains("blank") {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    } else {
        RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgb([30, 60, 200])
            } else {
                Rgb([255, 255, 255])
            }
        })
    };

    if let Err(e) = img.save_with_format(frame, ImageFormat::Pnm) {
        eprintln!("cannot write frame {frame}: {e}");
        return 4;
    }
    if let Some(layout) = flags.get("dump-layout").filter(|l| !l.is_empty()) {
        let _ = std::fs::write(layout, "[]");
    }
    0
}

fn compare(flags: &HashMap<String, String>) -> i32 {
    let (Some(baseline), Some(candidate), Some(out)) = (
        required(flags, "baseline"),
        required(flags, "candidate"),
        required(flags, "out"),
    ) else {
        return 2;
    };

    if !Path::new(candidate).is_file() {
        println!("{}", json!({ "error": format!("candidate {candidate} not found") }));
        return 0;
    }

    let wanted = std::fs::read_to_string(baseline).unwrap_or_default();
    let wanted = wanted.trim();
    if wanted == "error" {
        println!("{}", json!({ "error": "baseline and candidate sizes differ" }));
        return 0;
    }
    let diff_percent: f64 = wanted.parse().unwrap_or(0.0);

    let total_pixels: u64 = 64 * 48;
    let diff_pixels = (total_pixels as f64 * diff_percent / 100.0).round() as u64;
    let taxonomy = json!({ "box_model": 60.0, "text": 40.0 });
    let contributors = json!([
        {
            "selector": "div.card",
            "tag": "div",
            "diff_pixels": diff_pixels * 6 / 10,
            "contribution_percent": 60.0,
            "likely_cause": "box_model",
            "corner_ratio": 0.4
        },
        {
            "selector": "h1.title",
            "tag": "h1",
            "diff_pixels": diff_pixels - diff_pixels * 6 / 10,
            "contribution_percent": 40.0,
            "likely_cause": "text",
            "corner_ratio": 0.1
        }
    ]);

    let out_dir = PathBuf::from(out);
    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!("cannot create {out}: {e}");
        return 4;
    }
    let attribution = json!({ "taxonomy": taxonomy, "topContributors": contributors });
    let _ = std::fs::write(out_dir.join("attribution.json"), attribution.to_string());
    let overlay = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
    let _ = overlay.save_with_format(out_dir.join("overlay.png"), ImageFormat::Png);

    println!("comparing {candidate} against {baseline}");
    println!(
        "{}",
        json!({
            "diffPercent": diff_percent,
            "diffPixels": diff_pixels,
            "totalPixels": total_pixels,
            "taxonomy": taxonomy,
            "topContributors": contributors,
        })
    );
    0
}
