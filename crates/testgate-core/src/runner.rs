//! Serial unit runner - executes units one after another in this thread

use crate::capture::{with_captured_output, Captured, OutputSinks};
use crate::config::RunConfiguration;
use crate::result::RunResult;
use crate::unit::{Outcome, TestUnit, UnitContext};
use std::any::Any;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::debug;

/// Runs units serially against one pair of output sinks
pub struct UnitRunner<'a> {
    config: &'a RunConfiguration,
    sinks: OutputSinks,
}

impl<'a> UnitRunner<'a> {
    /// Runner writing to the process stdout and stderr
    pub fn new(config: &'a RunConfiguration) -> Self {
        Self::with_sinks(config, OutputSinks::stdio())
    }

    /// Runner writing to the given sinks
    pub fn with_sinks(config: &'a RunConfiguration, sinks: OutputSinks) -> Self {
        Self { config, sinks }
    }

    /// Run every unit in order and collect the outcomes
    pub fn run_all(&mut self, units: &[TestUnit]) -> RunResult {
        let mut result = RunResult::new();
        for unit in units {
            let outcome = self.run_unit(unit);
            result.record(unit, outcome);
        }
        result
    }

    /// Run one unit
    ///
    /// Unless debug is set the unit's output is buffered and only shown as
    /// part of a failure or error. A panicking body is recorded as an error.
    pub fn run_unit(&mut self, unit: &TestUnit) -> Outcome {
        let start = Instant::now();
        let config = self.config;

        let outcome = if config.debug() {
            guarded(unit, &mut self.sinks, config)
        } else {
            let (outcome, captured) =
                with_captured_output(&mut self.sinks, |sinks| guarded(unit, sinks, config));
            attach_output(outcome, &captured)
        };

        debug!(unit = unit.id(), elapsed = ?start.elapsed(), outcome = label(&outcome), "unit finished");
        if config.verbosity() >= 2 {
            let _ = writeln!(self.sinks.err(), "{} ... {}", unit.id(), verbose_label(&outcome));
        }
        outcome
    }
}

/// Run `units` serially against the process streams
pub fn run_serial(units: &[TestUnit], config: &RunConfiguration) -> RunResult {
    UnitRunner::new(config).run_all(units)
}

fn guarded(unit: &TestUnit, sinks: &mut OutputSinks, config: &RunConfiguration) -> Outcome {
    catch_unwind(AssertUnwindSafe(|| unit.run(&mut UnitContext::new(sinks, config))))
        .unwrap_or_else(|payload| Outcome::Error(format!("panicked: {}", panic_message(&*payload))))
}

/// Text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn attach_output(outcome: Outcome, captured: &Captured) -> Outcome {
    let append = |mut text: String| {
        if !captured.stdout.is_empty() {
            text.push_str("\n\nStdout:\n");
            text.push_str(captured.stdout.trim_end());
        }
        if !captured.stderr.is_empty() {
            text.push_str("\n\nStderr:\n");
            text.push_str(captured.stderr.trim_end());
        }
        text
    };
    match outcome {
        Outcome::Fail(text) => Outcome::Fail(append(text)),
        Outcome::Error(text) => Outcome::Error(append(text)),
        other => other,
    }
}

fn label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Pass => "pass",
        Outcome::Fail(_) => "fail",
        Outcome::Error(_) => "error",
        Outcome::Skip(_) => "skip",
    }
}

fn verbose_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Pass => "ok".to_string(),
        Outcome::Fail(_) => "FAIL".to_string(),
        Outcome::Error(_) => "ERROR".to_string(),
        Outcome::Skip(reason) => format!("skipped '{}'", reason),
    }
}
