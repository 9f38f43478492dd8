//! End-to-end tests driving the compiled `tis100` binary as a subprocess.

use std::io::Write;
use std::process::Command;

fn write_program(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn echo_program_matches_expected_output() {
    let program = write_program("@0\nMOV UP, DOWN\n");

    let output = Command::new(env!("CARGO_BIN_EXE_tis100"))
        .arg(program.path())
        .arg("--input")
        .arg("0:1,2,3")
        .arg("--output")
        .arg("0:1,2,3")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("expected 1, got 1"));
    assert!(stdout.contains("expected 2, got 2"));
    assert!(stdout.contains("expected 3, got 3"));
}

#[test]
fn mismatched_expectation_reports_failure_exit_code() {
    let program = write_program("@0\nMOV UP, DOWN\n");

    let output = Command::new(env!("CARGO_BIN_EXE_tis100"))
        .arg(program.path())
        .arg("--input")
        .arg("0:1")
        .arg("--output")
        .arg("0:99")
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn missing_file_is_a_driver_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_tis100"))
        .arg("/nonexistent/path/does/not/exist.tis")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not read"));
}
