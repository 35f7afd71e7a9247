//! Suite assembly
//!
//! Combines documentation modules and test classes into one ordered suite,
//! honouring the optional single-test filter of the run configuration.

use crate::config::RunConfiguration;
use crate::error::GateResult;
use crate::source::{ResolveError, UnitSource};
use crate::unit::TestUnit;
use tracing::debug;

/// Ordered collection of units; insertion order is kept
#[derive(Debug, Clone, Default)]
pub struct TestSuite {
    units: Vec<TestUnit>,
}

impl TestSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: TestUnit) {
        self.units.push(unit);
    }

    pub fn extend(&mut self, units: impl IntoIterator<Item = TestUnit>) {
        self.units.extend(units);
    }

    pub fn units(&self) -> &[TestUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units of partition `index` out of `count`; unit `k` belongs to `k mod count`
    pub fn units_for_partition(&self, index: usize, count: usize) -> Vec<TestUnit> {
        if count == 0 {
            return Vec::new();
        }
        self.units
            .iter()
            .enumerate()
            .filter(|(k, _)| k % count == index)
            .map(|(_, unit)| unit.clone())
            .collect()
    }

    /// Split into `count` round-robin partitions (some may be empty)
    pub fn partition(&self, count: usize) -> Vec<Vec<TestUnit>> {
        let mut partitions = vec![Vec::new(); count];
        if count == 0 {
            return partitions;
        }
        for (k, unit) in self.units.iter().enumerate() {
            partitions[k % count].push(unit.clone());
        }
        partitions
    }
}

impl FromIterator<TestUnit> for TestSuite {
    fn from_iter<I: IntoIterator<Item = TestUnit>>(iter: I) -> Self {
        Self {
            units: iter.into_iter().collect(),
        }
    }
}

/// Build the suite for a run from an ordered list of sources
///
/// A filter that matches nothing yields an empty suite.
pub fn assemble(config: &RunConfiguration, sources: &[UnitSource]) -> GateResult<TestSuite> {
    let filter = config.test_name();
    let mut suite = TestSuite::new();

    for source in sources {
        match source {
            UnitSource::Module(module) => {
                if filter.map_or(true, |name| name == module.name()) {
                    let units = module.units()?;
                    debug!(module = module.name(), count = units.len(), "adding doc examples");
                    suite.extend(units);
                }
            }
            UnitSource::Class(class) => {
                class.setup_test_args(&config.test_args());
                let units = match filter {
                    Some(name) => match class.resolve(name) {
                        Ok(units) => units,
                        Err(ResolveError::NotFound { .. }) => {
                            debug!(class = class.name(), name, "name not in class");
                            continue;
                        }
                        Err(ResolveError::Source(e)) => return Err(e),
                    },
                    None => class.cases()?,
                };
                debug!(class = class.name(), count = units.len(), "adding cases");
                suite.extend(units);
            }
        }
    }

    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestArgs;
    use crate::doc::StaticModule;
    use crate::source::StaticClass;
    use crate::unit::Outcome;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn ids(suite: &TestSuite) -> Vec<&str> {
        suite.units().iter().map(TestUnit::id).collect()
    }

    fn sources() -> Vec<UnitSource> {
        let evaluator = |_: &str| -> Result<String, String> { Ok(String::new()) };
        vec![
            UnitSource::module(
                StaticModule::new("fdt_util", evaluator).item("get_int", "$ get\n"),
            ),
            UnitSource::class(
                StaticClass::new("ftest.TestFunctional")
                    .case("testBlob", "", |_| Outcome::Pass)
                    .case("testFill", "", |_| Outcome::Pass),
            ),
            UnitSource::class(
                StaticClass::new("entry_test.TestEntry").case("testFill", "", |_| Outcome::Pass),
            ),
        ]
    }

    #[test]
    fn test_no_filter_takes_everything_in_order() {
        let suite = assemble(&RunConfiguration::new(), &sources()).unwrap();
        assert_eq!(
            ids(&suite),
            vec![
                "fdt_util.get_int",
                "ftest.TestFunctional.testBlob",
                "ftest.TestFunctional.testFill",
                "entry_test.TestEntry.testFill",
            ]
        );
    }

    #[test]
    fn test_filter_by_case_name_spans_classes() {
        let config = RunConfiguration::new().with_test_name(Some("testFill".to_string()));
        let suite = assemble(&config, &sources()).unwrap();
        assert_eq!(
            ids(&suite),
            vec!["ftest.TestFunctional.testFill", "entry_test.TestEntry.testFill"]
        );
    }

    #[test]
    fn test_filter_by_module_name() {
        let config = RunConfiguration::new().with_test_name(Some("fdt_util".to_string()));
        let suite = assemble(&config, &sources()).unwrap();
        assert_eq!(ids(&suite), vec!["fdt_util.get_int"]);
    }

    #[test]
    fn test_filter_matching_nothing_is_empty() {
        let config = RunConfiguration::new().with_test_name(Some("testNothing".to_string()));
        assert!(assemble(&config, &sources()).unwrap().is_empty());
    }

    #[test]
    fn test_hook_receives_args_even_when_name_missing() {
        let seen: Arc<Mutex<Option<TestArgs>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let class = StaticClass::new("ftest.TestFunctional")
            .case("testBlob", "", |_| Outcome::Pass)
            .on_setup(move |args| *sink.lock() = Some(args.clone()));

        let config = RunConfiguration::new()
            .with_preserve_dirs(true)
            .with_verbosity(2)
            .with_toolpath(vec![PathBuf::from("/opt/bin")])
            .with_test_name(Some("testOther".to_string()));
        let suite = assemble(&config, &[UnitSource::class(class)]).unwrap();

        assert!(suite.is_empty());
        assert_eq!(
            seen.lock().clone(),
            Some(TestArgs {
                preserve_indir: true,
                preserve_outdirs: true,
                toolpath: vec![PathBuf::from("/opt/bin")],
                verbosity: 2,
            })
        );
    }

    #[test]
    fn test_partition_is_total_and_round_robin() {
        let suite: TestSuite = (0..7)
            .map(|i| TestUnit::case(format!("m.C.t{}", i), |_| Outcome::Pass))
            .collect();

        let partitions = suite.partition(3);
        let sizes: Vec<_> = partitions.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        assert_eq!(partitions[1][1].id(), "m.C.t4");

        let total: usize = (0..3).map(|i| suite.units_for_partition(i, 3).len()).sum();
        assert_eq!(total, 7);
        assert_eq!(suite.partition(10).iter().filter(|p| p.is_empty()).count(), 3);
    }
}
