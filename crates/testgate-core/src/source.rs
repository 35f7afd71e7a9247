//! Unit sources - documentation modules and test classes

use crate::config::TestArgs;
use crate::error::{GateError, GateResult};
use crate::unit::{Outcome, TestUnit, UnitContext};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A module whose documentation carries runnable examples
pub trait DocModule: Send + Sync {
    /// Module name, matched exactly against a test-name filter
    fn name(&self) -> &str;

    /// One unit per documented item that has examples
    fn units(&self) -> GateResult<Vec<TestUnit>>;
}

/// A class of structured test cases
pub trait TestClass: Send + Sync {
    /// Class name; case identities are `<name>.<case>`
    fn name(&self) -> &str;

    /// Receive run arguments before cases are enumerated
    fn setup_test_args(&self, _args: &TestArgs) {}

    /// Every case of the class
    fn cases(&self) -> GateResult<Vec<TestUnit>>;

    /// Cases selected by `name`, given as `case` or `Class.case`
    fn resolve(&self, name: &str) -> Result<Vec<TestUnit>, ResolveError> {
        let class_prefix = format!("{}.", self.name());
        let wanted = name.strip_prefix(&class_prefix).unwrap_or(name);

        let matched: Vec<TestUnit> = self
            .cases()
            .map_err(ResolveError::Source)?
            .into_iter()
            .filter(|unit| unit.name() == wanted)
            .collect();

        if matched.is_empty() {
            return Err(ResolveError::NotFound {
                class: self.name().to_string(),
                name: name.to_string(),
            });
        }
        Ok(matched)
    }
}

/// Why a name could not be resolved against a class
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The class has no such case; the name may belong to another source
    #[error("{class} has no attribute '{name}'")]
    NotFound { class: String, name: String },

    /// The class could not enumerate its cases
    #[error(transparent)]
    Source(GateError),
}

/// One entry of the list a suite is assembled from
#[derive(Clone)]
pub enum UnitSource {
    Module(Arc<dyn DocModule>),
    Class(Arc<dyn TestClass>),
}

impl UnitSource {
    pub fn module(module: impl DocModule + 'static) -> Self {
        Self::Module(Arc::new(module))
    }

    pub fn class(class: impl TestClass + 'static) -> Self {
        Self::Class(Arc::new(class))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Module(m) => m.name(),
            Self::Class(c) => c.name(),
        }
    }
}

impl fmt::Debug for UnitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(m) => f.debug_tuple("Module").field(&m.name()).finish(),
            Self::Class(c) => f.debug_tuple("Class").field(&c.name()).finish(),
        }
    }
}

type ArgsHook = Box<dyn Fn(&TestArgs) + Send + Sync>;

/// A test class defined in code
pub struct StaticClass {
    name: String,
    cases: Vec<TestUnit>,
    hook: Option<ArgsHook>,
}

impl StaticClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
            hook: None,
        }
    }

    /// Add a case; its identity becomes `<class>.<case>`
    pub fn case<F>(mut self, case: &str, description: &str, body: F) -> Self
    where
        F: Fn(&mut UnitContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        let id = format!("{}.{}", self.name, case);
        self.cases
            .push(TestUnit::case(id, body).with_description(description));
        self
    }

    /// Install a `setup_test_args` hook
    pub fn on_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TestArgs) + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl TestClass for StaticClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_test_args(&self, args: &TestArgs) {
        if let Some(hook) = &self.hook {
            hook(args);
        }
    }

    fn cases(&self) -> GateResult<Vec<TestUnit>> {
        Ok(self.cases.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class() -> StaticClass {
        StaticClass::new("ftest.TestFunctional")
            .case("testBlob", "Blob test", |_| Outcome::Pass)
            .case("testFill", "Fill test", |_| Outcome::Pass)
    }

    #[test]
    fn test_resolve_by_case_name() {
        let units = class().resolve("testFill").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id(), "ftest.TestFunctional.testFill");
    }

    #[test]
    fn test_resolve_by_qualified_name() {
        let units = class().resolve("ftest.TestFunctional.testBlob").unwrap();
        assert_eq!(units[0].name(), "testBlob");
    }

    #[test]
    fn test_resolve_missing_is_typed() {
        let err = class().resolve("testMissing").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            "ftest.TestFunctional has no attribute 'testMissing'"
        );
    }

    #[test]
    fn test_source_name() {
        let source = UnitSource::class(class());
        assert_eq!(source.name(), "ftest.TestFunctional");
        assert_eq!(format!("{:?}", source), "Class(\"ftest.TestFunctional\")");
    }
}
