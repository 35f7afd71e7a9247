//! Coverage gate
//!
//! Runs a program's tests under an external coverage tool, reads the tool's
//! summary report and fails unless coverage is complete. The report is
//! treated as opaque text:
//!
//! ```text
//! Name                              Stmts   Miss  Cover
//! -----------------------------------------------------
//! tools/binman/etype/blob.py           40      0   100%
//! tools/binman/control.py             120      0   100%
//! -----------------------------------------------------
//! TOTAL                               160      0   100%
//! ```

use crate::command::{CommandRunner, ExternalCommand, SystemRunner};
use crate::error::{GateError, GateResult};
use crate::files::list_files;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The only aggregate percentage accepted
pub const FULL_COVERAGE: &str = "100%";

/// Omit patterns always added to the coverage run
pub const DEFAULT_OMIT: [&str; 4] = [
    "*libfdt.py",
    "*site-packages*",
    "*dist-packages*",
    "*concurrencytest*",
];

/// Path segment marking rows of required modules
const REQUIRED_SEGMENT: &str = "/etype/";

/// Parsed summary report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    /// Base names of modules on `/etype/` rows
    pub modules: BTreeSet<String>,
    /// Aggregate percentage, verbatim (last token of the last line)
    pub total: String,
    /// The raw report
    pub text: String,
}

impl CoverageReport {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();

        let modules = lines
            .iter()
            .filter(|line| line.contains(REQUIRED_SEGMENT))
            .filter_map(|line| line.split_whitespace().next())
            .map(module_name)
            .collect();

        let total = lines
            .last()
            .and_then(|line| line.split_whitespace().last())
            .unwrap_or_default()
            .to_string();

        Self {
            modules,
            total,
            text: text.to_string(),
        }
    }

    /// True when the aggregate is exactly 100%
    pub fn is_complete(&self) -> bool {
        self.total == FULL_COVERAGE
    }

    /// Required modules that have no row in the report (`__init__` never counts)
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|name| *name != "__init__" && !self.modules.contains(*name))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// `/path/to/name.py` -> `name`
fn module_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// What to measure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRequest {
    program: PathBuf,
    filter: Option<String>,
    exclude: Vec<String>,
    build_dir: Option<PathBuf>,
    required: Vec<String>,
    extra_args: Option<String>,
}

impl CoverageRequest {
    /// Measure the tests of `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            filter: None,
            exclude: Vec::new(),
            build_dir: None,
            required: Vec::new(),
            extra_args: None,
        }
    }

    /// Omit the program's own files whose path contains `filter`
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }

    /// Extra omit patterns
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Build directory holding `sandbox_spl/tools`
    pub fn with_build_dir(mut self, build_dir: Option<PathBuf>) -> Self {
        self.build_dir = build_dir;
        self
    }

    /// Modules that must appear in the report
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }

    /// Arguments placed before the test command
    pub fn with_extra_args(mut self, extra_args: Option<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Omit list: filtered program files, then excludes, then the fixed shims
    pub fn omit_patterns(&self) -> GateResult<Vec<String>> {
        let mut omit = Vec::new();
        if let Some(filter) = &self.filter {
            let dir = self.program.parent().unwrap_or_else(|| Path::new(""));
            let pattern = if dir.as_os_str().is_empty() {
                "*.py".to_string()
            } else {
                format!("{}/*.py", dir.display())
            };
            omit.extend(
                list_files(&pattern)?
                    .into_iter()
                    .map(|p| p.display().to_string())
                    .filter(|p| p.contains(filter.as_str())),
            );
        }
        omit.extend(self.exclude.iter().cloned());
        omit.extend(DEFAULT_OMIT.iter().map(|s| s.to_string()));
        Ok(omit)
    }

    /// Test subcommand understood by the program
    pub fn test_command(&self) -> &'static str {
        let program = self.program.to_string_lossy();
        if program.contains("binman") || program.contains("patman") {
            "test"
        } else {
            "-t"
        }
    }

    /// Shell line running the program's tests under `tool`
    pub fn command_line(&self, tool: &str, omit: &[String]) -> String {
        let prefix = match &self.build_dir {
            Some(dir) => format!("PYTHONPATH=$PYTHONPATH:{}/sandbox_spl/tools ", dir.display()),
            None => String::new(),
        };
        format!(
            "{}{} run --omit \"{}\" {} {} {} -P1",
            prefix,
            tool,
            omit.join(","),
            self.program.display(),
            self.extra_args.as_deref().unwrap_or(""),
            self.test_command()
        )
    }
}

/// Drives the coverage tool and enforces the policy
pub struct CoverageGate<R = SystemRunner> {
    tool: String,
    runner: R,
}

impl CoverageGate<SystemRunner> {
    pub fn new(tool: impl Into<String>) -> Self {
        Self::with_runner(tool, SystemRunner)
    }
}

impl<R: CommandRunner> CoverageGate<R> {
    pub fn with_runner(tool: impl Into<String>, runner: R) -> Self {
        Self {
            tool: tool.into(),
            runner,
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Verify coverage, printing diagnostics to stdout
    pub fn verify(&self, request: &CoverageRequest) -> GateResult<CoverageReport> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.verify_to(&mut out, request)
    }

    /// Verify coverage, printing diagnostics to `out`
    ///
    /// The test run's own exit status is not checked; only the report counts.
    pub fn verify_to(
        &self,
        out: &mut dyn Write,
        request: &CoverageRequest,
    ) -> GateResult<CoverageReport> {
        let omit = request.omit_patterns()?;
        let line = request.command_line(&self.tool, &omit);
        info!(command = %line, "running tests under coverage");

        let run = self.runner.run(&ExternalCommand::shell(line))?;
        if !run.success() {
            info!(status = run.status, "test run exited with non-zero status");
        }

        let text = self
            .runner
            .output(&ExternalCommand::new(self.tool.as_str()).arg("report"))?;
        let report = CoverageReport::parse(&text);

        let missing = if request.required().is_empty() {
            Vec::new()
        } else {
            report.missing(request.required().iter().map(String::as_str))
        };

        writeln!(out, "{}", report.total)?;
        if missing.is_empty() && report.is_complete() {
            return Ok(report);
        }

        if !missing.is_empty() {
            writeln!(out, "Missing tests for {}", missing.join(", "))?;
        }
        writeln!(out, "{}", report.text.trim_end())?;
        if !report.is_complete() {
            writeln!(
                out,
                "Type '{} html' to get a report in htmlcov/index.html",
                self.tool
            )?;
            writeln!(out, "Coverage error: {}, but should be 100%", report.total)?;
        }

        warn!(coverage = %report.total, missing = ?missing, "coverage policy violated");
        Err(GateError::CoveragePolicyViolation {
            coverage: report.total,
            missing,
        })
    }
}
