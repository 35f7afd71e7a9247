//! Test reporter - render a run result and compute the exit status

use crate::reconcile::reconcile;
use crate::result::{RunResult, UnitReport};
use colored::*;
use std::borrow::Cow;
use std::io::{self, Write};

const RULE_WIDTH: usize = 70;

/// Renders results in a fixed layout
///
/// ```text
/// ======================================================================
/// FAIL: testBlob (ftest.TestFunctional)
/// Test that a blob is packed
/// ----------------------------------------------------------------------
/// boom
///
/// ----------------------------------------------------------------------
/// Ran 3 tests.
///
/// binman tests FAILED (failures=1)
/// ```
pub struct TestReporter {
    tool_name: String,
    no_color: bool,
}

impl TestReporter {
    /// Create a reporter for the named tool
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            no_color: false,
        }
    }

    /// Disable colored output
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Print the report to stdout and return the exit status
    pub fn report(&self, filter: Option<&str>, result: &RunResult) -> i32 {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match self.report_to(&mut out, filter, result) {
            Ok(status) => status,
            Err(_) => exit_status(result, filter),
        }
    }

    /// Write the report and return the exit status: 0 when nothing errored or
    /// failed, 1 otherwise
    ///
    /// The result itself is left untouched; synthetic lookup errors for
    /// `filter` are dropped from the rendered view only.
    pub fn report_to<W: Write>(
        &self,
        out: &mut W,
        filter: Option<&str>,
        result: &RunResult,
    ) -> io::Result<i32> {
        let view = reconciled(result, filter);
        let view: &RunResult = &view;

        for entry in &view.errors {
            self.print_block(out, "ERROR", entry)?;
        }
        for entry in &view.failures {
            self.print_block(out, "FAIL", entry)?;
        }
        for entry in &view.skipped {
            self.print_block(out, "SKIP", entry)?;
        }
        if view.has_reports() {
            writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        }

        writeln!(out, "Ran {} tests.", view.tests_run)?;
        writeln!(out)?;
        writeln!(out, "{} tests {}", self.tool_name, self.summary(view))?;

        Ok(if view.was_successful() { 0 } else { 1 })
    }

    fn print_block<W: Write>(&self, out: &mut W, status: &str, entry: &UnitReport) -> io::Result<()> {
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(
            out,
            "{}: {} ({})",
            self.paint_status(status),
            entry.name(),
            entry.module()
        )?;
        writeln!(out, "{}", entry.description.as_deref().unwrap_or(""))?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        writeln!(out, "{}", entry.text.trim_end_matches('\n'))?;
        writeln!(out)
    }

    fn summary(&self, result: &RunResult) -> String {
        let mut counts = Vec::new();
        if !result.failures.is_empty() {
            counts.push(format!("failures={}", result.failures.len()));
        }
        if !result.errors.is_empty() {
            counts.push(format!("errors={}", result.errors.len()));
        }
        if !result.skipped.is_empty() {
            counts.push(format!("skipped={}", result.skipped.len()));
        }

        let status = if result.was_successful() {
            self.paint("OK", |s| s.green().bold())
        } else {
            self.paint("FAILED", |s| s.red().bold())
        };
        if counts.is_empty() {
            status
        } else {
            format!("{} ({})", status, counts.join(", "))
        }
    }

    fn paint_status(&self, status: &str) -> String {
        match status {
            "ERROR" | "FAIL" => self.paint(status, |s| s.red().bold()),
            _ => self.paint(status, |s| s.yellow().bold()),
        }
    }

    fn paint(&self, text: &str, style: impl Fn(&str) -> ColoredString) -> String {
        if self.no_color {
            text.to_string()
        } else {
            style(text).to_string()
        }
    }
}

fn reconciled<'a>(result: &'a RunResult, filter: Option<&str>) -> Cow<'a, RunResult> {
    match filter {
        Some(name) if !name.is_empty() => {
            let mut view = result.clone();
            reconcile(&mut view, Some(name));
            Cow::Owned(view)
        }
        _ => Cow::Borrowed(result),
    }
}

/// Exit status for a result: 0 iff it has no errors and no failures
pub fn exit_status(result: &RunResult, filter: Option<&str>) -> i32 {
    if reconciled(result, filter).was_successful() {
        0
    } else {
        1
    }
}
