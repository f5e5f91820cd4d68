//! Integration tests for the PBT CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to get a pbt command
fn pbt() -> Command {
    Command::cargo_bin("pbt").unwrap()
}

fn write_netlist(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// A 3.3 V rail feeding a load switch and a constant-power load
fn demo_netlist(tmp: &TempDir) -> PathBuf {
    write_netlist(
        tmp,
        "demo.yaml",
        r#"
sources:
  - id: 1
    name: rail_3v3
    kind: smps
    vin: 12.0
    vout: 3.3
    max_current: 2.0
    efficiency: 0.9
    loads:
      - switch:
          id: 2
          name: Q1
          switch_resistance: 0.05
          children:
            - load: {id: 3, name: sensor_array, kind: constant_current, value: 0.15}
      - load: {id: 4, name: mcu, kind: constant_power, value: 0.25}
"#,
    )
}

/// A rail whose output voltage is sampled, for Monte Carlo runs
fn sampled_netlist(tmp: &TempDir) -> PathBuf {
    write_netlist(
        tmp,
        "sampled.yaml",
        r#"
sources:
  - id: 1
    name: rail_5v0
    kind: smps
    vin: 12.0
    vout:
      nominal: 5.0
      distribution: uniform
      bound_kind: percent
      low: -5.0
      high: 5.0
    max_current: 1.0
    efficiency: 0.9
    loads:
      - load: {id: 2, name: heater, kind: resistive, value: 10.0}
"#,
    )
}

/// A sampled rail that declares monte_carlo as its own evaluation mode
fn declared_mc_netlist(tmp: &TempDir) -> PathBuf {
    write_netlist(
        tmp,
        "declared.yaml",
        r#"
sources:
  - id: 1
    name: rail_5v0
    kind: smps
    vin: 12.0
    vout:
      nominal: 5.0
      distribution: uniform
      bound_kind: percent
      low: -5.0
      high: 5.0
    max_current: 1.0
    efficiency: 0.9
    mode: monte_carlo
    loads:
      - load: {id: 2, name: heater, kind: resistive, value: 10.0}
"#,
    )
}

/// A rail rated far below what its subtree demands
fn overloaded_netlist(tmp: &TempDir) -> PathBuf {
    write_netlist(
        tmp,
        "overloaded.yaml",
        r#"
sources:
  - id: 1
    name: rail_3v3
    kind: smps
    vin: 12.0
    vout: 3.3
    max_current: 0.1
    efficiency: 0.9
    loads:
      - load: {id: 2, name: heater, kind: resistive, value: 10.0}
"#,
    )
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    pbt()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("power-budget"));
}

#[test]
fn test_version_displays() {
    pbt()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pbt"));
}

#[test]
fn test_unknown_command_fails() {
    pbt()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// ============================================================================
// Analyze Command Tests
// ============================================================================

#[test]
fn test_analyze_reports_every_source() {
    let tmp = TempDir::new().unwrap();
    let netlist = demo_netlist(&tmp);

    pbt()
        .args(["analyze", netlist.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("rail_3v3"))
        .stdout(predicate::str::contains("Total Current"))
        .stdout(predicate::str::contains("sensor_array"));
}

#[test]
fn test_analyze_json_is_machine_readable() {
    let tmp = TempDir::new().unwrap();
    let netlist = demo_netlist(&tmp);

    let output = pbt()
        .args(["analyze", netlist.to_str().unwrap(), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let budgets: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let budget = &budgets[0];
    assert_eq!(budget["source_id"], 1);
    assert_eq!(budget["source_name"], "rail_3v3");
    assert_eq!(budget["mode"], "nominal");

    // 0.15 A fixed draw plus 0.25 W / 3.3 V from the constant-power load
    let total = budget["total_current"].as_f64().unwrap();
    assert!((total - (0.15 + 0.25 / 3.3)).abs() < 1e-6);
    assert!(budget.get("overload").is_none());
    assert_eq!(budget["branches"].as_array().unwrap().len(), 3);
}

#[test]
fn test_analyze_csv_has_header() {
    let tmp = TempDir::new().unwrap();
    let netlist = demo_netlist(&tmp);

    pbt()
        .args(["analyze", netlist.to_str().unwrap(), "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "source_id,source_name,mode,vout_v",
        ));
}

#[test]
fn test_analyze_md_renders_table() {
    let tmp = TempDir::new().unwrap();
    let netlist = demo_netlist(&tmp);

    pbt()
        .args(["analyze", netlist.to_str().unwrap(), "--format", "md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| ID "))
        .stdout(predicate::str::contains("rail_3v3"));
}

#[test]
fn test_analyze_sampled_mode_is_seed_reproducible() {
    let tmp = TempDir::new().unwrap();
    let netlist = sampled_netlist(&tmp);

    let run = || {
        let output = pbt()
            .args([
                "analyze",
                netlist.to_str().unwrap(),
                "--mode",
                "mc",
                "--seed",
                "42",
                "--format",
                "json",
            ])
            .output()
            .unwrap();
        assert!(output.status.success());
        let budgets: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        budgets[0]["total_current"].as_f64().unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    // vout is sampled within 5% of 5.0 V into a 10 Ohm load
    assert!(first >= 0.475 && first <= 0.525);
}

#[test]
fn test_analyze_defaults_to_declared_mode() {
    let tmp = TempDir::new().unwrap();
    let netlist = declared_mc_netlist(&tmp);

    // No --mode flag: the source's own monte_carlo declaration applies
    let output = pbt()
        .args([
            "analyze",
            netlist.to_str().unwrap(),
            "--seed",
            "3",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let budgets: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(budgets[0]["mode"], "monte_carlo");
    let vout = budgets[0]["vout"].as_f64().unwrap();
    assert!((4.75..=5.25).contains(&vout));

    // An explicit --mode still overrides the declaration
    let output = pbt()
        .args([
            "analyze",
            netlist.to_str().unwrap(),
            "--mode",
            "nominal",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let budgets: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(budgets[0]["mode"], "nominal");
    assert_eq!(budgets[0]["vout"].as_f64().unwrap(), 5.0);
}

#[test]
fn test_analyze_missing_file_fails() {
    pbt()
        .args(["analyze", "no-such-netlist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read netlist"));
}

#[test]
fn test_analyze_malformed_netlist_fails() {
    let tmp = TempDir::new().unwrap();
    let netlist = write_netlist(&tmp, "broken.yaml", "sources: [{id: not_a_number}]");

    pbt()
        .args(["analyze", netlist.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse netlist"));
}

#[test]
fn test_analyze_unknown_source_id_fails() {
    let tmp = TempDir::new().unwrap();
    let netlist = demo_netlist(&tmp);

    pbt()
        .args(["analyze", netlist.to_str().unwrap(), "--source", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No source with id 99"));
}

// ============================================================================
// Monte Carlo Command Tests
// ============================================================================

#[test]
fn test_mc_summarizes_sampled_current() {
    let tmp = TempDir::new().unwrap();
    let netlist = sampled_netlist(&tmp);

    let output = pbt()
        .args([
            "mc",
            netlist.to_str().unwrap(),
            "--iterations",
            "200",
            "--seed",
            "7",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let summary = &summaries[0];
    assert_eq!(summary["iterations"], 200);
    assert_eq!(summary["within_rating_percent"], 100.0);

    let mean = summary["total_current"]["mean"].as_f64().unwrap();
    assert!(mean >= 0.475 && mean <= 0.525);
    let min = summary["total_current"]["min"].as_f64().unwrap();
    let max = summary["total_current"]["max"].as_f64().unwrap();
    assert!(min >= 0.475 && max <= 0.525 && min < max);
}

#[test]
fn test_mc_seed_makes_runs_identical() {
    let tmp = TempDir::new().unwrap();
    let netlist = sampled_netlist(&tmp);

    let run = || {
        let output = pbt()
            .args([
                "mc",
                netlist.to_str().unwrap(),
                "--iterations",
                "50",
                "--seed",
                "11",
                "--format",
                "json",
            ])
            .output()
            .unwrap();
        assert!(output.status.success());
        let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        summaries[0]["total_current"]["mean"].as_f64().unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_mc_human_output_shows_stats() {
    let tmp = TempDir::new().unwrap();
    let netlist = sampled_netlist(&tmp);

    pbt()
        .args(["mc", netlist.to_str().unwrap(), "-n", "50", "--seed", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Current"))
        .stdout(predicate::str::contains("95% CI"))
        .stdout(predicate::str::contains("Within Rating"));
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_check_passes_within_rating() {
    let tmp = TempDir::new().unwrap();
    let netlist = demo_netlist(&tmp);

    pbt()
        .args(["check", netlist.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("All sources within rating"));
}

#[test]
fn test_check_fails_on_overload() {
    let tmp = TempDir::new().unwrap();
    let netlist = overloaded_netlist(&tmp);

    pbt()
        .args(["check", netlist.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("exceeds"))
        .stderr(predicate::str::contains("1 source is overloaded"));
}

#[test]
fn test_check_quiet_suppresses_passing_lines() {
    let tmp = TempDir::new().unwrap();
    let netlist = demo_netlist(&tmp);

    pbt()
        .args(["check", netlist.to_str().unwrap(), "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demanded").not())
        .stdout(predicate::str::contains("All sources within rating"));
}

// ============================================================================
// Completions Command Tests
// ============================================================================

#[test]
fn test_completions_generates_bash_script() {
    pbt()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pbt"));
}
