//! Configuration file handling
//!
//! The configuration is read once at startup into an immutable [`Config`]
//! value that is passed down explicitly. Every section is optional and falls
//! back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Renderer capture tool
    #[serde(default = "ToolConfig::default_capture")]
    pub capture: ToolConfig,

    /// Baseline comparison tool
    #[serde(default = "ToolConfig::default_compare")]
    pub compare: ToolConfig,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Iteration stability settings
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Blank-frame gate settings
    #[serde(default)]
    pub blank: BlankFrameConfig,

    /// Per-case pass thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Exploit phase settings
    #[serde(default)]
    pub exploit: ExploitConfig,

    /// Worker pool settings
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: ToolConfig::default_capture(),
            compare: ToolConfig::default_compare(),
            paths: PathsConfig::default(),
            stability: StabilityConfig::default(),
            blank: BlankFrameConfig::default(),
            thresholds: ThresholdConfig::default(),
            exploit: ExploitConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

/// An external tool invoked once per work unit
///
/// Arguments are templates: `{name}` placeholders are substituted per
/// invocation (see the capture and compare adapters for the names).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    /// Program name (looked up in PATH) or path to the executable
    pub program: String,

    /// Argument templates
    #[serde(default)]
    pub args: Vec<String>,

    /// Hard timeout for one invocation
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

impl ToolConfig {
    fn default_capture() -> Self {
        Self {
            program: "parity-capture".to_string(),
            args: [
                "--html-file",
                "{document}",
                "--width",
                "{width}",
                "--height",
                "{height}",
                "--dump-frame",
                "{frame}",
                "--dump-layout",
                "{layout}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout_secs: default_tool_timeout(),
        }
    }

    fn default_compare() -> Self {
        Self {
            program: "node".to_string(),
            args: [
                "tools/parity_oracle/compare_cli.mjs",
                "--baseline",
                "{baseline}",
                "--candidate",
                "{frame}",
                "--out",
                "{out_dir}",
                "--rects",
                "{rects}",
                "--styles",
                "{styles}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

fn default_tool_timeout() -> u64 {
    60
}

/// Filesystem locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Root under which every run directory is created
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,

    /// Root of the reference baselines (`<category>/<case_id>/baseline.png`)
    #[serde(default = "default_baselines_root")]
    pub baselines_root: PathBuf,

    /// Optional YAML case catalog; the built-in catalog is used otherwise
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            results_root: default_results_root(),
            baselines_root: default_baselines_root(),
            catalog: None,
        }
    }
}

fn default_results_root() -> PathBuf {
    PathBuf::from("parity-results")
}

fn default_baselines_root() -> PathBuf {
    PathBuf::from("baselines").join("chrome-120")
}

/// Iteration stability settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StabilityConfig {
    /// Maximum tolerated spread (max - min diff %) for a stable verdict
    #[serde(default = "default_max_variance")]
    pub max_variance: f64,

    /// Minimum scored iterations before a result can be called stable
    #[serde(default = "default_min_iterations")]
    pub min_iterations: usize,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            max_variance: default_max_variance(),
            min_iterations: default_min_iterations(),
        }
    }
}

fn default_max_variance() -> f64 {
    0.10
}
fn default_min_iterations() -> usize {
    3
}

/// Blank-frame gate settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlankFrameConfig {
    /// Fraction of background (or dominant color) pixels that makes a frame blank
    #[serde(default = "default_blank_threshold")]
    pub threshold: f64,

    /// Expected page background color
    #[serde(default = "default_background")]
    pub background: [u8; 3],

    /// Per-channel tolerance when matching the background
    #[serde(default = "default_tolerance")]
    pub tolerance: u8,

    /// Frames with fewer distinct colors than this are checked for a dominant color
    #[serde(default = "default_max_unique_colors")]
    pub max_unique_colors: usize,
}

impl Default for BlankFrameConfig {
    fn default() -> Self {
        Self {
            threshold: default_blank_threshold(),
            background: default_background(),
            tolerance: default_tolerance(),
            max_unique_colors: default_max_unique_colors(),
        }
    }
}

fn default_blank_threshold() -> f64 {
    0.999
}
fn default_background() -> [u8; 3] {
    [255, 255, 255]
}
fn default_tolerance() -> u8 {
    2
}
fn default_max_unique_colors() -> usize {
    10
}

/// Pass thresholds (max diff %) derived from the case id
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThresholdConfig {
    /// Threshold when no rule matches
    #[serde(default = "default_threshold")]
    pub default: f64,

    /// Keyword rules, first match wins
    #[serde(default = "default_threshold_rules")]
    pub rules: Vec<ThresholdRule>,
}

/// A keyword rule: applies when the case id contains any keyword
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ThresholdRule {
    pub contains: Vec<String>,
    pub threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            default: default_threshold(),
            rules: default_threshold_rules(),
        }
    }
}

impl ThresholdConfig {
    /// Threshold for a case without an explicit one
    pub fn threshold_for(&self, case_id: &str) -> f64 {
        self.rules
            .iter()
            .find(|rule| rule.contains.iter().any(|k| case_id.contains(k.as_str())))
            .map(|rule| rule.threshold)
            .unwrap_or(self.default)
    }
}

fn default_threshold() -> f64 {
    15.0
}

fn default_threshold_rules() -> Vec<ThresholdRule> {
    let rule = |keys: &[&str], threshold: f64| ThresholdRule {
        contains: keys.iter().map(|k| k.to_string()).collect(),
        threshold,
    };
    vec![
        rule(&["form"], 12.0),
        rule(&["image", "gallery"], 10.0),
        rule(&["gradient"], 15.0),
        rule(&["sticky", "scroll"], 25.0),
        rule(&["typography", "text"], 20.0),
    ]
}

/// Exploit phase settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExploitConfig {
    /// Number of worst scout cases to revisit (0 disables the phase)
    #[serde(default)]
    pub top: usize,

    /// Iterations per exploit case and viewport
    #[serde(default = "default_exploit_iterations")]
    pub iterations: u32,

    /// Viewport labels (`WxH`) to run exploit cases at
    #[serde(default = "default_exploit_viewports")]
    pub viewports: Vec<String>,

    /// Minimum budget that must remain after scout for exploit to start
    #[serde(default = "default_min_window")]
    pub min_window_secs: u64,
}

impl Default for ExploitConfig {
    fn default() -> Self {
        Self {
            top: 0,
            iterations: default_exploit_iterations(),
            viewports: default_exploit_viewports(),
            min_window_secs: default_min_window(),
        }
    }
}

fn default_exploit_iterations() -> u32 {
    3
}
fn default_exploit_viewports() -> Vec<String> {
    vec![
        "800x600".to_string(),
        "1280x800".to_string(),
        "1920x1080".to_string(),
    ]
}
fn default_min_window() -> u64 {
    60
}

/// Worker pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Number of concurrent workers
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
        }
    }
}

fn default_jobs() -> usize {
    1
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default config file is
    /// used if present, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
