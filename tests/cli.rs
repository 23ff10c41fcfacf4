//! End-to-end tests for the officebatch binary
#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn script(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn officebatch() -> Command {
    let mut cmd = Command::cargo_bin("officebatch").unwrap();
    cmd.env_remove("OFFICEBATCH_CLI").env_remove("RUST_LOG");
    cmd
}

#[test]
fn echo_and_summary() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "hello.batch", "# greeting\n@set NAME = world\n@echo hello ${NAME}\ntrue\n");

    officebatch()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("hello world"))
        .stdout(predicate::str::contains("Status:    SUCCESS"))
        .stdout(predicate::str::contains("Executed:  3"))
        .stdout(predicate::str::contains("Skipped:   1"));
}

#[test]
fn failing_command_aborts_and_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "fail.batch", "true\nfalse\n@echo unreachable\n");

    officebatch()
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Status:    FAILED"))
        .stdout(predicate::str::contains("exited with status 1"))
        .stdout(predicate::str::contains("unreachable").not());
}

#[test]
fn continue_on_error_runs_remaining_lines() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "cont.batch", "false\n@echo after\n");

    officebatch()
        .args(["run", "--continue-on-error"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("after"));
}

#[test]
fn try_catch_recovers() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "try.batch",
        "@try\nfalse\n@catch\n@echo recovered\n@finally\n@echo cleanup\n@endtry\n",
    );

    officebatch()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("recovered"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn var_flag_seeds_variables() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "vars.batch",
        "@if DEPT == \"finance\"\n@echo Dept=${DEPT}\n@else\n@echo other\n@endif\n",
    );

    officebatch()
        .args(["run", "--var", "DEPT=finance"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dept=finance"))
        .stdout(predicate::str::contains("other").not());
}

#[test]
fn foreach_over_json_list() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "loop.batch",
        "@foreach x in [\"a\",\"b\",\"c\"]\n@echo item ${x} at ${__LOOP_INDEX__}\n@endforeach\n",
    );

    officebatch()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("item a at 0"))
        .stdout(predicate::str::contains("item c at 2"));
}

#[test]
fn dry_run_dispatches_nothing() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("marker.txt");
    let path = script(
        &dir,
        "dry.batch",
        &format!("@set TARGET = {}\ntouch ${{TARGET}}\n", marker.display()),
    );

    officebatch()
        .args(["--dry-run", "run"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("touch {}", marker.display())))
        .stdout(predicate::str::contains("DRY RUN"));

    assert!(!marker.exists());
}

#[test]
fn unbalanced_script_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("marker.txt");
    let path = script(
        &dir,
        "broken.batch",
        &format!("touch {}\n@if true\n@echo inside\n", marker.display()),
    );

    officebatch()
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Parse error (line 2)"))
        .stderr(predicate::str::contains("no @endif found"));

    assert!(!marker.exists());
}

#[test]
fn json_output() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "json.batch", "true\ntrue\n");

    let output = officebatch()
        .args(["--json", "run"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["executed_count"], 2);
    assert_eq!(value["log"][1]["line_number"], 2);
}

#[test]
fn json_output_stays_parseable_with_echo() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "echo.batch", "@echo progress note\ntrue\n");

    let output = officebatch()
        .args(["--json", "-v", "run"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["log"][0]["output"], "progress note");
    assert!(String::from_utf8_lossy(&output.stderr).contains("progress note"));
}

#[test]
fn braced_reference_in_condition_and_hash_argument() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.log");
    let path = script(
        &dir,
        "color.batch",
        "@set STATUS = ready\n@if ${STATUS} == \"ready\"\necho set-color A1 #FF0000 --bold\n@endif\n",
    );

    officebatch()
        .arg("run")
        .arg(&path)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("    set-color A1 #FF0000 --bold"));
}

#[test]
fn log_file_and_exported_environment() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("logs").join("run.log");
    let path = script(
        &dir,
        "env.batch",
        "@export OFFICEBATCH_CLI_TEST = exported-value\nprintenv OFFICEBATCH_CLI_TEST\n",
    );

    officebatch()
        .arg("run")
        .arg(&path)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("Command: printenv OFFICEBATCH_CLI_TEST"));
    assert!(text.contains("    exported-value"));
    assert!(text.contains("Summary: executed=2 skipped=0 failed=0"));
}

#[test]
fn cli_program_prefixes_commands() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.log");
    let path = script(&dir, "office.batch", "excel open \"Q1 Report.xlsx\"\n");

    officebatch()
        .arg("run")
        .arg(&path)
        .args(["--cli", "echo", "--log-file"])
        .arg(&log)
        .assert()
        .success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("    excel open Q1 Report.xlsx"));
}

#[test]
fn while_guard_stops_runaway_loop() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "spin.batch", "@while true\ntrue\n@endwhile\n");

    officebatch()
        .args(["run", "--max-loop-iterations", "3"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("exceeded 3 iterations"));
}

#[test]
fn check_reports_outline() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "ok.batch",
        "@foreach f in a b\n@if f == \"a\"\n@echo first\n@endif\n@endforeach\n",
    );

    officebatch()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("@foreach lines 1-5"))
        .stdout(predicate::str::contains("  @if lines 2-4"))
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn check_rejects_unbalanced_blocks() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "bad.batch", "@try\nfalse\n@endif\n");

    officebatch()
        .arg("check")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ERROR (line 3)"))
        .stdout(predicate::str::contains("unmatched @try on line 1"));
}

#[test]
fn missing_script_is_an_error() {
    officebatch()
        .args(["run", "/definitely/not/here.batch"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to run"));
}
