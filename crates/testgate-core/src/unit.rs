//! Test units - the atomic checks a suite is made of

use crate::capture::OutputSinks;
use crate::config::RunConfiguration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Where a unit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    /// Examples embedded in a module's documentation
    DocExample,
    /// A named case of a test class
    Case,
}

/// Outcome of running one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum Outcome {
    /// Check held
    Pass,
    /// Check did not hold
    Fail(String),
    /// Unit could not run to completion
    Error(String),
    /// Unit chose not to run
    Skip(String),
}

impl Outcome {
    /// Pass when `condition` holds, otherwise fail with `message`
    pub fn check(condition: bool, message: impl Into<String>) -> Self {
        if condition {
            Self::Pass
        } else {
            Self::Fail(message.into())
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// What a running unit can see
pub struct UnitContext<'a> {
    sinks: &'a mut OutputSinks,
    config: &'a RunConfiguration,
}

impl<'a> UnitContext<'a> {
    pub fn new(sinks: &'a mut OutputSinks, config: &'a RunConfiguration) -> Self {
        Self { sinks, config }
    }

    /// Standard output for the unit
    pub fn out(&mut self) -> &mut dyn Write {
        self.sinks.out()
    }

    /// Standard error for the unit
    pub fn err(&mut self) -> &mut dyn Write {
        self.sinks.err()
    }

    /// Configuration of the current run
    pub fn config(&self) -> &RunConfiguration {
        self.config
    }
}

/// Executable body of a unit
pub type UnitBody = Arc<dyn Fn(&mut UnitContext<'_>) -> Outcome + Send + Sync>;

/// An atomic executable check
///
/// The identity is module-qualified (`module.Class.case` or `module.item`);
/// everything after the last `.` is the unit's own name.
#[derive(Clone)]
pub struct TestUnit {
    id: String,
    description: Option<String>,
    kind: UnitKind,
    body: UnitBody,
}

impl TestUnit {
    /// Create a unit from an identity and a body
    pub fn new<F>(kind: UnitKind, id: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut UnitContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            description: None,
            kind,
            body: Arc::new(body),
        }
    }

    /// Create a structured test case unit
    pub fn case<F>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut UnitContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        Self::new(UnitKind::Case, id, body)
    }

    /// Create a documentation example unit
    pub fn doc_example<F>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut UnitContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        Self::new(UnitKind::DocExample, id, body)
    }

    /// Attach a one-line description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = short_description(&description);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Unit name (last identity segment)
    pub fn name(&self) -> &str {
        split_identity(&self.id).1
    }

    /// Run the body
    pub fn run(&self, ctx: &mut UnitContext<'_>) -> Outcome {
        (self.body)(ctx)
    }
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Split an identity at its last `.` into (module, name)
pub fn split_identity(id: &str) -> (&str, &str) {
    id.rsplit_once('.').unwrap_or(("", id))
}

/// First non-empty line of a description, trimmed
fn short_description(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_split() {
        assert_eq!(split_identity("ftest.TestFunctional.testBlob"), ("ftest.TestFunctional", "testBlob"));
        assert_eq!(split_identity("lone"), ("", "lone"));
    }

    #[test]
    fn test_description_uses_first_line() {
        let unit = TestUnit::case("m.C.t", |_| Outcome::Pass)
            .with_description("\n  Test that a blob is packed  \n more detail");
        assert_eq!(unit.description(), Some("Test that a blob is packed"));
        assert_eq!(unit.name(), "t");
        assert_eq!(unit.kind(), UnitKind::Case);
    }

    #[test]
    fn test_run_body_writes_to_context() {
        let unit = TestUnit::doc_example("mod.item", |ctx| {
            writeln!(ctx.out(), "hello").unwrap();
            Outcome::check(ctx.config().verbosity() == 0, "verbose")
        });

        let buffer = crate::capture::SharedBuffer::new();
        let mut sinks = OutputSinks::new(Box::new(buffer.clone()), Box::new(std::io::sink()));
        let config = RunConfiguration::new();
        let outcome = unit.run(&mut UnitContext::new(&mut sinks, &config));

        assert!(outcome.is_pass());
        assert_eq!(buffer.contents(), "hello\n");
    }

    #[test]
    fn test_outcome_check() {
        assert_eq!(Outcome::check(false, "boom"), Outcome::Fail("boom".to_string()));
        assert_eq!(Outcome::check(true, "boom"), Outcome::Pass);
    }
}
