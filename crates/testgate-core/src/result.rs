//! Aggregate results of a test run

use crate::unit::{split_identity, Outcome, TestUnit};
use serde::{Deserialize, Serialize};

/// One reported (non-passing) unit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitReport {
    /// Module-qualified identity
    pub id: String,
    /// Short description, if the unit has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Error, failure or skip text
    pub text: String,
}

impl UnitReport {
    pub fn new(id: impl Into<String>, description: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description,
            text: text.into(),
        }
    }

    /// Module part of the identity
    pub fn module(&self) -> &str {
        split_identity(&self.id).0
    }

    /// Unit name part of the identity
    pub fn name(&self) -> &str {
        split_identity(&self.id).1
    }
}

/// Status of a unit as recorded in a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnitStatus {
    Error,
    Failure,
    Skipped,
}

/// Aggregate result of a run (or of one worker's partition)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Units executed
    pub tests_run: usize,
    /// Units that errored, in recording order
    #[serde(default)]
    pub errors: Vec<UnitReport>,
    /// Units that failed, in recording order
    #[serde(default)]
    pub failures: Vec<UnitReport>,
    /// Units that were skipped, in recording order
    #[serde(default)]
    pub skipped: Vec<UnitReport>,
}

impl RunResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one executed unit
    pub fn record(&mut self, unit: &TestUnit, outcome: Outcome) {
        self.tests_run += 1;
        let report = |text: String| {
            UnitReport::new(unit.id(), unit.description().map(str::to_string), text)
        };
        match outcome {
            Outcome::Pass => {}
            Outcome::Fail(text) => self.failures.push(report(text)),
            Outcome::Error(text) => self.errors.push(report(text)),
            Outcome::Skip(text) => self.skipped.push(report(text)),
        }
    }

    /// Record an error that is not tied to an executed unit (e.g. a crashed worker)
    pub fn add_error(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.errors.push(UnitReport::new(id, None, text));
    }

    /// Fold a partial result into this one: lists are appended, counts summed
    pub fn merge(&mut self, other: RunResult) {
        self.tests_run += other.tests_run;
        self.errors.extend(other.errors);
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }

    /// True when no unit errored or failed (skips do not count)
    pub fn was_successful(&self) -> bool {
        self.errors.is_empty() && self.failures.is_empty()
    }

    /// True when at least one list has an entry
    pub fn has_reports(&self) -> bool {
        !(self.errors.is_empty() && self.failures.is_empty() && self.skipped.is_empty())
    }

    /// All (identity, status) pairs, sorted; independent of merge order
    pub fn statuses(&self) -> Vec<(String, UnitStatus)> {
        let mut statuses: Vec<_> = self
            .errors
            .iter()
            .map(|r| (r.id.clone(), UnitStatus::Error))
            .chain(self.failures.iter().map(|r| (r.id.clone(), UnitStatus::Failure)))
            .chain(self.skipped.iter().map(|r| (r.id.clone(), UnitStatus::Skipped)))
            .collect();
        statuses.sort();
        statuses
    }
}
