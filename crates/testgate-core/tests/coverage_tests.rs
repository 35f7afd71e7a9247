//! Integration tests for the coverage gate and case files

use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use testgate_core::{
    assemble, CaseFile, CommandOutput, CommandRunner, CoverageGate, CoverageRequest,
    ExternalCommand, GateError, GateResult, RunConfiguration, SystemRunner, TestClass,
    UnitRunner, UnitSource,
};

/// Coverage tool stand-in returning a canned report
struct CannedReport(&'static str);

impl CommandRunner for CannedReport {
    fn run(&self, command: &ExternalCommand) -> GateResult<CommandOutput> {
        let stdout = if command.arguments() == ["report"] {
            self.0.to_string()
        } else {
            // The test run itself may fail; only the report counts
            String::new()
        };
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
            status: if command.arguments() == ["report"] { 0 } else { 1 },
        })
    }
}

const REPORT: &str = "\
Name                                Stmts   Miss  Cover
-------------------------------------------------------
tools/binman/etype/blob.py             40      0   100%
tools/binman/etype/fill.py             12      0   100%
tools/binman/ftest.py                2000      0   100%
-------------------------------------------------------
TOTAL                                2052      0   100%
";

#[test]
fn test_complete_report_passes_with_failed_test_run() {
    let gate = CoverageGate::with_runner("python3-coverage", CannedReport(REPORT));
    let request = CoverageRequest::new("tools/binman/binman")
        .with_required(vec!["blob".to_string(), "fill".to_string(), "__init__".to_string()]);

    let report = gate.verify_to(&mut Vec::new(), &request).unwrap();
    assert_eq!(report.total, "100%");
}

#[test]
fn test_violation_names_missing_module_and_prints_report() {
    let gate = CoverageGate::with_runner("python3-coverage", CannedReport(REPORT));
    let request = CoverageRequest::new("tools/binman/binman")
        .with_required(vec!["blob".to_string(), "section".to_string()]);

    let mut out = Vec::new();
    let err = gate.verify_to(&mut out, &request).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Test coverage failure: missing tests for section"
    );
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("tools/binman/ftest.py"));
}

#[test]
fn test_report_command_failure_is_command_error() {
    struct BrokenTool;
    impl CommandRunner for BrokenTool {
        fn run(&self, command: &ExternalCommand) -> GateResult<CommandOutput> {
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: "No data to report.".to_string(),
                status: if command.arguments() == ["report"] { 1 } else { 0 },
            })
        }
    }

    let gate = CoverageGate::with_runner("python3-coverage", BrokenTool);
    let err = gate
        .verify_to(&mut Vec::new(), &CoverageRequest::new("tools/dtoc/dtoc"))
        .unwrap_err();
    match err {
        GateError::CommandFailed { command, stderr, .. } => {
            assert_eq!(command, "python3-coverage report");
            assert_eq!(stderr, "No data to report.");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[cfg(unix)]
#[test]
fn test_case_file_runs_real_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shell.toml");
    fs::write(
        &path,
        r#"
name = "shell.TestShell"

[[case]]
name = "test_echo"
description = "Echo prints its argument"
command = ["sh", "-c", "echo hello"]
expect_stdout = "hello"

[[case]]
name = "test_verbosity_env"
command = ["sh", "-c", "test \"$TESTGATE_VERBOSITY\" = 3"]

[[case]]
name = "test_stdin"
command = ["cat"]
stdin = "piped"
expect_stdout = "piped"

[[case]]
name = "test_exit"
command = ["sh", "-c", "exit 4"]
expect_status = 4
"#,
    )
    .unwrap();

    let class = CaseFile::load(&path, Arc::new(SystemRunner)).unwrap();
    assert_eq!(class.name(), "shell.TestShell");

    let config = RunConfiguration::new().with_verbosity(3).with_processes(Some(1));
    let suite = assemble(&config, &[UnitSource::class(class)]).unwrap();
    let result = UnitRunner::with_sinks(
        &config,
        testgate_core::OutputSinks::new(Box::new(std::io::sink()), Box::new(std::io::sink())),
    )
    .run_all(suite.units());

    assert_eq!(result.tests_run, 4);
    assert!(result.was_successful(), "{:?}", result);
}
