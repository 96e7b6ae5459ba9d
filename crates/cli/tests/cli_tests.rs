// Integration tests for the `larder` binary: --json stdout contract,
// exit codes, and what gets written to disk.
//
// Run with: cargo test -p larder-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn larder() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_larder"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("LARDER_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn family_corpus() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../dedup/tests/fixtures/family.json")
}

fn run(args: &[&str]) -> Output {
    larder().args(args).output().expect("run larder")
}

fn path_str(p: &Path) -> &str {
    p.to_str().expect("utf-8 temp path")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &str) -> serde_json::Value {
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");

    let val: serde_json::Value = serde_json::from_str(trimmed).unwrap_or_else(|e| {
        panic!("stdout must be valid JSON.\nParse error: {}\nstdout:\n{}", e, trimmed)
    });

    let re_serialized = serde_json::to_string(&val).unwrap();
    let re_parsed: serde_json::Value = serde_json::from_str(&re_serialized).unwrap();
    assert_eq!(val, re_parsed, "JSON round-trip should be stable");

    val
}

/// Analyze the family fixture into `dir/report.json`.
fn write_report(dir: &TempDir) -> PathBuf {
    let report = dir.path().join("report.json");
    let corpus = family_corpus();
    let output = run(&["analyze", path_str(&corpus), "--output", path_str(&report)]);
    assert!(output.status.success(), "analyze failed: {}", stderr(&output));
    report
}

// ===========================================================================
// larder analyze
// ===========================================================================

#[test]
fn analyze_json_produces_report() {
    let corpus = family_corpus();
    let output = run(&["analyze", path_str(&corpus), "--json"]);

    assert!(output.status.success(), "exit code: {:?}\nstderr: {}", output.status, stderr(&output));

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    let obj = val.as_object().expect("report should be a JSON object");
    let keys: Vec<_> = obj.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["meta", "summary", "groups"]);

    assert_eq!(val["summary"]["total_recipes"], 11);
    assert_eq!(val["summary"]["total_recipes_to_merge"], 2);
    assert_eq!(val["summary"]["total_variants_to_link"], 2);

    let groups = val["groups"].as_array().expect("groups must be array");
    assert_eq!(groups.len(), 4);
    assert_eq!(groups[0]["title_key"], "apple-pie");
    assert_eq!(groups[0]["canonical"]["id"], "ap-grandma");
    assert_eq!(groups[0]["merge_into_canonical"][0]["id"], "ap-bhg");

    assert!(stderr(&output).contains("analyzed 11 recipes"), "stderr: {}", stderr(&output));
}

#[test]
fn analyze_without_json_keeps_stdout_empty() {
    let dir = TempDir::new().unwrap();
    let report = write_report(&dir);

    let written = std::fs::read_to_string(&report).unwrap();
    let val: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(val["groups"].as_array().unwrap().len(), 4);

    let corpus = family_corpus();
    let output = run(&["analyze", path_str(&corpus)]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "stdout: {}", String::from_utf8_lossy(&output.stdout));
}

#[test]
fn analyze_suppresses_duplicates_across_files() {
    let corpus = family_corpus();
    let output = run(&["analyze", path_str(&corpus), path_str(&corpus), "--json"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["summary"]["total_recipes"], 11);
    assert!(stderr(&output).contains("suppressed 11 exact duplicate(s)"));
}

#[test]
fn analyze_empty_corpus_exits_4_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let corpus = dir.path().join("empty.json");
    std::fs::write(&corpus, "[]").unwrap();
    let report = dir.path().join("report.json");

    let output = run(&["analyze", path_str(&corpus), "--output", path_str(&report), "--json"]);

    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));
    assert!(output.stdout.is_empty());
    assert!(!report.exists(), "no report may be written for an empty corpus");
}

#[test]
fn analyze_malformed_corpus_exits_4() {
    let dir = TempDir::new().unwrap();
    let corpus = dir.path().join("broken.json");
    std::fs::write(&corpus, r#"{"recipes": [{"title": "no id"}"#).unwrap();

    let output = run(&["analyze", path_str(&corpus)]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).starts_with("error:"), "stderr: {}", stderr(&output));
}

#[test]
fn analyze_with_invalid_config_exits_3() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[normalize]\ntitle_suffixes = [\"(unclosed\"]\n").unwrap();

    let corpus = family_corpus();
    let output = run(&["analyze", path_str(&corpus), "--config", path_str(&config)]);
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));
}

#[test]
fn analyze_reads_config_from_env() {
    let config = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../dedup/tests/fixtures/merge-only.dedup.toml");
    let corpus = family_corpus();
    let output = larder()
        .env("LARDER_CONFIG", &config)
        .args(["analyze", path_str(&corpus), "--json"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["meta"]["config_name"], "merge-only");
    assert_eq!(val["summary"]["total_variants_to_link"], 0);
}

// ===========================================================================
// larder execute
// ===========================================================================

#[test]
fn execute_writes_corpus_and_log() {
    let dir = TempDir::new().unwrap();
    let report = write_report(&dir);
    let merged = dir.path().join("merged.json");
    let log = dir.path().join("merge-log.json");
    let corpus = family_corpus();

    let output = run(&[
        "execute",
        path_str(&corpus),
        "--report",
        path_str(&report),
        "--output",
        path_str(&merged),
        "--log",
        path_str(&log),
        "--json",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["dry_run"], false);
    assert_eq!(val["summary"]["recipes_before"], 11);
    assert_eq!(val["summary"]["recipes_after"], 9);
    assert_eq!(val["summary"]["errors"], 0);

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&log).unwrap()).unwrap();
    assert_eq!(on_disk["summary"], val["summary"]);

    let recipes: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&merged).unwrap()).unwrap();
    let recipes = recipes.as_array().expect("corpus is written as an array");
    assert_eq!(recipes.len(), 9);
    let pie = recipes.iter().find(|r| r["id"] == "ap-grandma").unwrap();
    assert_eq!(pie["sources"], serde_json::json!(["grandma-baker", "bhg"]));
    assert_eq!(pie["servings"], "8");
    assert_eq!(pie["ingredients"][0]["prep_note"], serde_json::Value::Null);

    // records execution did not touch are written back byte-for-byte in value
    let fixture: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(family_corpus()).unwrap()).unwrap();
    let original = fixture["recipes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == "lemon-bars")
        .unwrap();
    let written = recipes.iter().find(|r| r["id"] == "lemon-bars").unwrap();
    assert_eq!(written, original);
}

#[test]
fn execute_dry_run_writes_no_corpus() {
    let dir = TempDir::new().unwrap();
    let report = write_report(&dir);
    let merged = dir.path().join("merged.json");
    let corpus = family_corpus();

    let output = run(&[
        "execute",
        path_str(&corpus),
        "--report",
        path_str(&report),
        "--dry-run",
        "--output",
        path_str(&merged),
        "--json",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["dry_run"], true);
    assert_eq!(val["summary"]["merged"], 2);
    assert!(!merged.exists(), "dry run must not write the corpus");
    assert!(stderr(&output).contains("dry run: 11 → 9 recipes"), "stderr: {}", stderr(&output));
}

#[test]
fn execute_without_output_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let report = write_report(&dir);
    let corpus = family_corpus();

    let output = run(&["execute", path_str(&corpus), "--report", path_str(&report)]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("hint:"), "stderr: {}", stderr(&output));
}

#[test]
fn execute_stale_report_fails_only_when_strict() {
    let dir = TempDir::new().unwrap();
    let report = write_report(&dir);

    let full: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(family_corpus()).unwrap()).unwrap();
    let pruned: Vec<_> = full["recipes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["id"] != "brownies-ocr")
        .cloned()
        .collect();
    let corpus = dir.path().join("pruned.json");
    std::fs::write(&corpus, serde_json::to_string(&pruned).unwrap()).unwrap();
    let merged = dir.path().join("merged.json");

    let lenient = run(&[
        "execute",
        path_str(&corpus),
        "--report",
        path_str(&report),
        "--output",
        path_str(&merged),
    ]);
    assert!(lenient.status.success(), "stderr: {}", stderr(&lenient));
    assert!(stderr(&lenient).contains("candidate_not_found"), "stderr: {}", stderr(&lenient));

    let strict = run(&[
        "execute",
        path_str(&corpus),
        "--report",
        path_str(&report),
        "--output",
        path_str(&merged),
        "--strict",
    ]);
    assert_eq!(strict.status.code(), Some(7), "stderr: {}", stderr(&strict));
}

#[test]
fn execute_rejects_invalid_report() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.json");
    std::fs::write(&report, r#"{"meta": {}}"#).unwrap();
    let corpus = family_corpus();

    let output = run(&["execute", path_str(&corpus), "--report", path_str(&report), "--dry-run"]);
    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr(&output));
}

// ===========================================================================
// larder config
// ===========================================================================

#[test]
fn config_show_prints_builtin_tables() {
    let output = run(&["config", "show"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[[classifier.rules]]"), "stdout: {}", stdout);
    assert!(stdout.contains("cross-source variant"));
}

#[test]
fn config_validate_reports_rule_count() {
    let config = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../dedup/tests/fixtures/merge-only.dedup.toml");
    let output = run(&["config", "validate", path_str(&config)]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(
        stderr(&output).contains("valid: config 'merge-only' with 1 classifier rule(s)"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn config_validate_rejects_out_of_range_threshold() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(
        &config,
        "[[classifier.rules]]\nverdict = \"merge\"\nreason = \"x\"\nmin_item = 1.5\n",
    )
    .unwrap();

    let output = run(&["config", "validate", path_str(&config)]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("min_item"), "stderr: {}", stderr(&output));
}
