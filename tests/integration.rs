//! End-to-end integration tests for the parity CLI
//!
//! These tests drive the `parity` binary against the `mock_renderer` binary,
//! which plays both the renderer and the comparator:
//! 1. Writing a config, a YAML catalog, documents and baselines to a temp dir
//! 2. Running `parity run` / `merge` / `compare` / `gate`
//! 3. Checking exit codes and the JSON reports left on disk

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A case in the generated catalog
struct CaseDef {
    id: &'static str,
    /// Document contents; `blank`, `fail` and `hang` change the mock's behavior
    document: &'static str,
    /// Diff the mock comparator reports (`None` leaves the case without a baseline)
    baseline: Option<&'static str>,
    threshold: f64,
}

const fn case(id: &'static str, baseline: &'static str, threshold: f64) -> CaseDef {
    CaseDef {
        id,
        document: "<p>content</p>",
        baseline: Some(baseline),
        threshold,
    }
}

/// Test context with an isolated results tree
struct TestContext {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestContext {
    fn new(cases: &[CaseDef]) -> Self {
        Self::with_timeout(cases, 10)
    }

    fn with_timeout(cases: &[CaseDef], timeout_secs: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        let docs = root.join("docs");
        let baselines = root.join("baselines");
        fs::create_dir_all(&docs).expect("Failed to create docs dir");

        let mut catalog = String::from("cases:\n");
        for c in cases {
            let doc = docs.join(format!("{}.html", c.id));
            fs::write(&doc, c.document).expect("Failed to write document");
            catalog.push_str(&format!(
                "  - id: {}\n    document: {}\n    width: 64\n    height: 48\n    category: micro\n    threshold: {}\n",
                c.id,
                doc.display(),
                c.threshold
            ));
            if let Some(diff) = c.baseline {
                let dir = baselines.join("micro").join(c.id);
                fs::create_dir_all(&dir).expect("Failed to create baseline dir");
                fs::write(dir.join("baseline.png"), diff).expect("Failed to write baseline");
            }
        }
        let catalog_path = root.join("catalog.yaml");
        fs::write(&catalog_path, catalog).expect("Failed to write catalog");

        let mock = env!("CARGO_BIN_EXE_mock_renderer");
        let config = format!(
            r#"
[capture]
program = "{mock}"
args = ["capture", "--html-file", "{{document}}", "--width", "{{width}}", "--height", "{{height}}", "--dump-frame", "{{frame}}", "--dump-layout", "{{layout}}"]
timeout_secs = {timeout_secs}

[compare]
program = "{mock}"
args = ["compare", "--baseline", "{{baseline}}", "--candidate", "{{frame}}", "--out", "{{out_dir}}", "--rects", "{{rects}}", "--styles", "{{styles}}"]
timeout_secs = {timeout_secs}

[paths]
results_root = "{results}"
baselines_root = "{baselines}"
catalog = "{catalog}"

[pool]
jobs = 2
"#,
            mock = toml_path(Path::new(mock)),
            results = toml_path(&root.join("results")),
            baselines = toml_path(&baselines),
            catalog = toml_path(&catalog_path),
        );
        let config_path = root.join("config.toml");
        fs::write(&config_path, config).expect("Failed to write config");

        Self {
            temp_dir,
            config_path,
        }
    }

    fn results(&self) -> PathBuf {
        self.temp_dir.path().join("results")
    }

    /// Run a parity command
    fn run_parity(&self, args: &[&str]) -> ParityOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_parity"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .env("RUST_LOG", "parity=debug")
            .output()
            .expect("Failed to run parity");

        ParityOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        }
    }

    fn run_expect(&self, args: &[&str], code: i32) -> ParityOutput {
        let output = self.run_parity(args);
        assert_eq!(
            output.code,
            Some(code),
            "parity {:?} exited with {:?}:\nstdout: {}\nstderr: {}",
            args,
            output.code,
            output.stdout,
            output.stderr
        );
        output
    }

    fn read_json(&self, path: &Path) -> Value {
        let content = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
        serde_json::from_str(&content).expect("Report is not valid JSON")
    }

    fn run_report(&self, run_id: &str) -> Value {
        self.read_json(&self.results().join(run_id).join("swarm_report.json"))
    }
}

/// Output from a parity command
#[derive(Debug)]
struct ParityOutput {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

/// Paths inside TOML basic strings need escaped backslashes on Windows
fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}

fn result<'a>(report: &'a Value, case_id: &str) -> &'a Value {
    report["results"]
        .as_array()
        .expect("results array")
        .iter()
        .find(|r| r["case_id"] == case_id)
        .unwrap_or_else(|| panic!("no result for {case_id}"))
}

// ============== Tests ==============

#[test]
fn test_passing_run_exits_zero() {
    let ctx = TestContext::new(&[case("alpha", "4.5", 15.0), case("beta", "1.0", 15.0)]);
    let out = ctx.run_expect(&["run", "--iterations", "3", "--run-id", "pass-run"], 0);
    assert!(out.stdout.contains("2/2 passed"), "stdout: {}", out.stdout);

    let report = ctx.run_report("pass-run");
    assert_eq!(report["summary"]["total_cases"], 2);
    assert_eq!(report["summary"]["total_units"], 6);

    let alpha = result(&report, "alpha");
    assert_eq!(alpha["diff_pct_median"], 4.5);
    assert_eq!(alpha["iterations"], 3);
    assert_eq!(alpha["stable"], true);
    assert_eq!(alpha["passed"], true);
    assert_eq!(alpha["best_iteration"], 1);
    assert_eq!(alpha["best_taxonomy"]["box_model"], 60.0);

    // Artifacts are run scoped
    let iter = ctx.results().join("pass-run").join("alpha").join("64x48").join("iter-2");
    assert!(iter.join("capture").join("frame.ppm").is_file());
    assert!(iter.join("diff").join("overlay.png").is_file());
    assert!(ctx.results().join("pass-run").join("summary.txt").is_file());

    // Worst median first
    assert_eq!(report["results"][0]["case_id"], "alpha");
}

#[test]
fn test_failures_are_data_and_exit_one() {
    let ctx = TestContext::new(&[
        case("good", "2.0", 15.0),
        case("over", "40.0", 15.0),
        CaseDef {
            id: "empty-page",
            document: "blank",
            baseline: Some("1.0"),
            threshold: 15.0,
        },
        CaseDef {
            id: "crashes",
            document: "fail",
            baseline: Some("1.0"),
            threshold: 15.0,
        },
        CaseDef {
            id: "no-baseline",
            document: "<p>x</p>",
            baseline: None,
            threshold: 15.0,
        },
        case("bad-size", "error", 15.0),
    ]);
    ctx.run_expect(&["run", "--run-id", "mixed"], 1);

    let report = ctx.run_report("mixed");
    assert_eq!(report["summary"]["total_cases"], 6);
    assert_eq!(report["summary"]["passed"], 1);
    assert_eq!(report["summary"]["errored"], 4);

    assert_eq!(result(&report, "over")["diff_pct_median"], 40.0);
    assert_eq!(result(&report, "over")["scored_iterations"], 1);

    let scout = report["scout"].as_array().unwrap();
    let failure_of = |id: &str| {
        scout
            .iter()
            .find(|r| r["case_id"] == id)
            .map(|r| r["failure"].clone())
            .unwrap()
    };
    assert_eq!(failure_of("empty-page"), "blank_frame");
    assert_eq!(failure_of("crashes"), "capture_failure");
    assert_eq!(failure_of("no-baseline"), "missing_baseline");
    assert_eq!(failure_of("bad-size"), "compare_failure");
    assert_eq!(failure_of("over"), "threshold_fail");

    let blank = result(&report, "empty-page");
    assert_eq!(blank["diff_pct_median"], 100.0);
    assert!(blank["errors"][0].as_str().unwrap().starts_with("BLANK_FRAME"));
}

#[test]
fn test_capture_timeout_is_recorded() {
    let ctx = TestContext::with_timeout(
        &[CaseDef {
            id: "stuck",
            document: "hang",
            baseline: Some("1.0"),
            threshold: 15.0,
        }],
        1,
    );
    ctx.run_expect(&["run", "--run-id", "slow"], 1);
    let report = ctx.run_report("slow");
    let stuck = result(&report, "stuck");
    assert_eq!(stuck["scored_iterations"], 0);
    assert!(stuck["errors"][0].as_str().unwrap().contains("timed out"));
}

#[test]
fn test_exploit_revisits_worst_cases() {
    let ctx = TestContext::new(&[
        case("worst", "9.0", 15.0),
        case("middle", "5.0", 15.0),
        case("best", "0.5", 15.0),
    ]);
    ctx.run_expect(
        &[
            "run",
            "--run-id",
            "swarm",
            "--exploit-top",
            "1",
            "--exploit-iterations",
            "2",
            "--exploit-viewports",
            "64x48,32x24",
        ],
        0,
    );

    let report = ctx.run_report("swarm");
    let exploit = report["exploit"].as_array().unwrap();
    assert_eq!(exploit.len(), 4);
    assert!(exploit.iter().all(|r| r["case_id"] == "worst"));
    // At the scout viewport, exploit iterations continue after the scout one
    let mut native: Vec<u64> = exploit
        .iter()
        .filter(|r| r["viewport"]["width"] == 64)
        .map(|r| r["iteration"].as_u64().unwrap())
        .collect();
    native.sort();
    assert_eq!(native, vec![2, 3]);

    let worst = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["case_id"] == "worst" && r["viewport"]["width"] == 64)
        .unwrap();
    assert_eq!(worst["iterations"], 3);
}

#[test]
fn test_shards_partition_the_work() {
    let ctx = TestContext::new(&[
        case("a", "1.0", 15.0),
        case("b", "1.0", 15.0),
        case("c", "1.0", 15.0),
    ]);
    let mut seen = Vec::new();
    for index in 0..2 {
        let run_id = format!("shard-{index}");
        let index = index.to_string();
        ctx.run_expect(
            &[
                "run", "--run-id", &run_id, "--shard-index", &index, "--shard-count", "2",
            ],
            0,
        );
        let report = ctx.run_report(&run_id);
        for r in report["results"].as_array().unwrap() {
            seen.push(r["case_id"].as_str().unwrap().to_string());
        }
    }
    seen.sort();
    assert_eq!(seen, vec!["a", "b", "c"]);
}

#[test]
fn test_invalid_arguments_are_errors() {
    let ctx = TestContext::new(&[case("a", "1.0", 15.0)]);

    let out = ctx.run_expect(&["run", "--shard-index", "0"], 1);
    assert!(out.stderr.contains("Error:"));

    let out = ctx.run_expect(&["run", "--viewports", "wide"], 1);
    assert!(out.stderr.contains("Invalid viewport"));

    let out = ctx.run_expect(&["run", "--cases", "../etc"], 1);
    assert!(out.stderr.contains("Invalid case id"));

    ctx.run_expect(&["gate", "--report", "never-ran"], 1);
}

#[test]
fn test_unknown_only_selection_is_an_empty_pass() {
    let ctx = TestContext::new(&[case("a", "1.0", 15.0)]);
    let out = ctx.run_expect(&["run", "--cases", "no-such-case", "--run-id", "nothing"], 0);
    assert!(!out.stderr.contains("Error:"), "stderr: {}", out.stderr);

    let report = ctx.run_report("nothing");
    assert_eq!(report["summary"]["total_cases"], 0);
    assert_eq!(report["summary"]["total_units"], 0);
    assert!(report["results"].as_array().expect("results array").is_empty());
    assert!(!ctx.results().join("nothing").join("a").exists());
}

#[test]
fn test_dry_run_plans_without_tools() {
    let ctx = TestContext::new(&[case("a", "1.0", 15.0), case("b", "1.0", 15.0)]);
    let out = ctx.run_expect(
        &["run", "--run-id", "plan", "--dry-run", "--iterations", "2"],
        0,
    );
    assert!(out.stdout.contains("a@64x48#2"), "stdout: {}", out.stdout);
    assert!(!ctx.results().join("plan").join("a").exists());

    let report = ctx.run_report("plan");
    assert_eq!(report["exploit_skipped"], "dry run");
}

#[test]
fn test_merge_compare_and_gate() {
    let ctx = TestContext::new(&[case("alpha", "10.0", 15.0), case("beta", "2.0", 15.0)]);
    ctx.run_expect(&["run", "--run-id", "before", "--iterations", "3"], 0);

    // Same cases, worse renderer
    let baseline = ctx.temp_dir.path().join("baselines/micro/alpha/baseline.png");
    fs::write(&baseline, "10.6").unwrap();
    ctx.run_expect(&["run", "--run-id", "after", "--iterations", "3"], 0);

    // Merge keeps one entry per (case, viewport)
    let merged = ctx.temp_dir.path().join("merged.json");
    let out = ctx.run_expect(
        &["merge", "--runs", "before,after", "--output", merged.to_str().unwrap()],
        0,
    );
    assert!(out.stdout.contains("div.card"));
    let aggregate = ctx.read_json(&merged);
    assert_eq!(aggregate["cases"].as_array().unwrap().len(), 2);
    assert_eq!(aggregate["runs"], serde_json::json!(["before", "after"]));
    assert_eq!(aggregate["fix_scoreboard"]["top_contributors"][0]["selector"], "div.card");

    // 0.6 points worse: fails a 0.5 budget, passes a 1.0 budget
    let regression = ctx.temp_dir.path().join("regression.json");
    ctx.run_expect(
        &[
            "compare",
            "--baseline",
            "before",
            "--current",
            "after",
            "--regression-budget",
            "0.5",
            "--output",
            regression.to_str().unwrap(),
        ],
        1,
    );
    let report = ctx.read_json(&regression);
    assert_eq!(report["summary"]["regressions"], 1);
    assert_eq!(report["regressions"][0]["case_id"], "alpha");

    ctx.run_expect(
        &["compare", "--baseline", "before", "--current", "after", "--regression-budget", "1.0"],
        0,
    );

    // Commit level allows 1%; every case here is above that
    ctx.run_expect(&["gate", "--report", "after", "--level", "commit"], 1);
    ctx.run_expect(
        &["gate", "--report", "after", "--level", "commit", "--max-diff", "15"],
        0,
    );
    let out = ctx.run_expect(
        &[
            "gate",
            "--report",
            "after",
            "--max-diff",
            "15",
            "--previous",
            "before",
            "--json",
        ],
        1,
    );
    let outcome: Value = serde_json::from_str(&out.stdout).expect("gate JSON");
    assert_eq!(outcome["regressions"][0]["case_id"], "alpha");
    assert_eq!(outcome["passed"], false);
}

#[test]
fn test_cases_and_check() {
    let ctx = TestContext::new(&[case("alpha", "1.0", 15.0), case("beta", "1.0", 15.0)]);

    let out = ctx.run_expect(&["cases", "--json"], 0);
    let cases: Value = serde_json::from_str(&out.stdout).expect("cases JSON");
    assert_eq!(cases.as_array().unwrap().len(), 2);
    assert_eq!(cases[0]["id"], "alpha");

    // Configuration can also come from the environment
    let out = Command::new(env!("CARGO_BIN_EXE_parity"))
        .args(["cases", "--scope", "micro"])
        .env("PARITY_CONFIG", &ctx.config_path)
        .output()
        .expect("Failed to run parity");
    assert!(out.status.success());

    let out = ctx.run_expect(&["check", "--json"], 0);
    let caps: Value = serde_json::from_str(&out.stdout).expect("check JSON");
    assert_eq!(caps[0]["status"], "available");
    assert_eq!(caps[1]["tool"], "compare");
}

#[test]
fn test_missing_config_file_is_an_error() {
    let out = Command::new(env!("CARGO_BIN_EXE_parity"))
        .args(["--config", "/nonexistent/parity.toml", "cases"])
        .output()
        .expect("Failed to run parity");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Error:"));
}
