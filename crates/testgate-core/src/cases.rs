//! Test classes described in TOML files
//!
//! ```toml
//! name = "cli"
//! description = "Command-line behaviour"
//!
//! [[case]]
//! name = "test_version"
//! description = "Prints the version"
//! command = ["mytool", "--version"]
//! expect_stdout = "mytool 1."
//! ```

use crate::command::{CommandOutput, CommandRunner, ExternalCommand};
use crate::config::TestArgs;
use crate::error::{GateError, GateResult};
use crate::source::TestClass;
use crate::unit::{Outcome, TestUnit, UnitContext};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File-level layout of a case file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseFileDef {
    name: Option<String>,
    #[allow(dead_code)]
    description: Option<String>,
    #[serde(default, rename = "case")]
    cases: Vec<CaseDef>,
}

/// One `[[case]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseDef {
    name: String,
    description: Option<String>,
    command: Vec<String>,
    stdin: Option<String>,
    #[serde(default)]
    expect_status: i32,
    expect_stdout: Option<String>,
    expect_stderr: Option<String>,
    skip: Option<String>,
}

/// A test class loaded from a TOML case file
pub struct CaseFile {
    name: String,
    dir: PathBuf,
    cases: Vec<CaseDef>,
    runner: Arc<dyn CommandRunner>,
    args: Arc<RwLock<TestArgs>>,
}

impl CaseFile {
    /// Load and validate a case file; the class is named after the file stem
    /// unless the file sets `name`
    pub fn load(path: &Path, runner: Arc<dyn CommandRunner>) -> GateResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| GateError::io(path, e))?;
        let def: CaseFileDef =
            toml::from_str(&text).map_err(|e| GateError::invalid_source(path, e))?;

        let name = match def.name {
            Some(name) => name,
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        if name.trim().is_empty() {
            return Err(GateError::invalid_source(path, "class name cannot be empty"));
        }

        let mut seen = HashSet::new();
        for case in &def.cases {
            if case.name.is_empty() || case.name.contains('.') {
                return Err(GateError::invalid_source(
                    path,
                    format!("invalid case name '{}'", case.name),
                ));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(GateError::invalid_source(
                    path,
                    format!("duplicate case '{}'", case.name),
                ));
            }
            if case.command.is_empty() {
                return Err(GateError::invalid_source(
                    path,
                    format!("case '{}' has an empty command", case.name),
                ));
            }
        }

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            name,
            dir,
            cases: def.cases,
            runner,
            args: Arc::new(RwLock::new(TestArgs::default())),
        })
    }

    /// Arguments most recently injected by `setup_test_args`
    pub fn test_args(&self) -> TestArgs {
        self.args.read().clone()
    }

    fn unit_for(&self, case: &CaseDef) -> TestUnit {
        let id = format!("{}.{}", self.name, case.name);
        let case_def = case.clone();
        let runner = Arc::clone(&self.runner);
        let args = Arc::clone(&self.args);
        let dir = self.dir.clone();

        let unit = TestUnit::case(id, move |ctx| {
            let args = args.read().clone();
            run_case(&case_def, runner.as_ref(), &args, &dir, ctx)
        });
        match &case.description {
            Some(description) => unit.with_description(description.as_str()),
            None => unit,
        }
    }
}

impl TestClass for CaseFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_test_args(&self, args: &TestArgs) {
        *self.args.write() = args.clone();
    }

    fn cases(&self) -> GateResult<Vec<TestUnit>> {
        Ok(self.cases.iter().map(|case| self.unit_for(case)).collect())
    }
}

fn run_case(
    case: &CaseDef,
    runner: &dyn CommandRunner,
    args: &TestArgs,
    dir: &Path,
    ctx: &mut UnitContext<'_>,
) -> Outcome {
    if let Some(reason) = &case.skip {
        return Outcome::Skip(reason.clone());
    }

    let Some(mut command) = ExternalCommand::from_argv(&case.command) else {
        return Outcome::Error(format!("case '{}' has an empty command", case.name));
    };
    command = command
        .current_dir(dir)
        .env("TESTGATE_PRESERVE_INDIR", flag(args.preserve_indir))
        .env("TESTGATE_PRESERVE_OUTDIRS", flag(args.preserve_outdirs))
        .env("TESTGATE_VERBOSITY", args.verbosity.to_string());
    if let Some(path) = search_path(&args.toolpath) {
        command = command.env("PATH", path.to_string_lossy().into_owned());
    }
    if let Some(input) = &case.stdin {
        command = command.stdin(input.as_str());
    }

    let output = match runner.run(&command) {
        Ok(output) => output,
        Err(e) => return Outcome::Error(e.to_string()),
    };

    let _ = ctx.out().write_all(output.stdout.as_bytes());
    let _ = ctx.err().write_all(output.stderr.as_bytes());

    if output.status != case.expect_status {
        return Outcome::Fail(with_output(
            format!(
                "{}: expected exit status {}, got {}",
                command.command_line(),
                case.expect_status,
                output.status
            ),
            &output,
        ));
    }
    if let Some(expected) = &case.expect_stdout {
        if !output.stdout.contains(expected.as_str()) {
            return Outcome::Fail(with_output(
                format!("stdout does not contain {:?}", expected),
                &output,
            ));
        }
    }
    if let Some(expected) = &case.expect_stderr {
        if !output.stderr.contains(expected.as_str()) {
            return Outcome::Fail(with_output(
                format!("stderr does not contain {:?}", expected),
                &output,
            ));
        }
    }
    Outcome::Pass
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// PATH with the tool search paths in front, or None when there are none
fn search_path(toolpath: &[PathBuf]) -> Option<OsString> {
    if toolpath.is_empty() {
        return None;
    }
    let existing = env::var_os("PATH").unwrap_or_default();
    let paths = toolpath
        .iter()
        .cloned()
        .chain(env::split_paths(&existing));
    env::join_paths(paths).ok()
}

fn with_output(mut message: String, output: &CommandOutput) -> String {
    if !output.stdout.is_empty() {
        message.push_str("\nStdout:\n");
        message.push_str(output.stdout.trim_end());
    }
    if !output.stderr.is_empty() {
        message.push_str("\nStderr:\n");
        message.push_str(output.stderr.trim_end());
    }
    message
}
