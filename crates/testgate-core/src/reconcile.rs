//! Result reconciliation for filtered runs
//!
//! When a single test name is requested, sources that do not contain it may
//! still report a synthetic "has no attribute '<name>'" error (for example a
//! worker that resolved the name itself). Those entries are not real errors.

use crate::result::RunResult;
use tracing::debug;

/// Text marking an error as a synthetic lookup failure for `name`
pub fn missing_attribute_marker(name: &str) -> String {
    format!("has no attribute '{}'", name)
}

/// Remove synthetic lookup errors for `filter` and adjust the run count
///
/// Does nothing without a filter. Applying it twice changes nothing more.
pub fn reconcile(result: &mut RunResult, filter: Option<&str>) {
    let Some(name) = filter.filter(|n| !n.is_empty()) else {
        return;
    };

    let marker = missing_attribute_marker(name);
    let before = result.errors.len();
    result.errors.retain(|entry| !entry.text.contains(&marker));
    let removed = before - result.errors.len();

    if removed > 0 {
        debug!(removed, name, "dropped synthetic lookup errors");
        result.tests_run = result.tests_run.saturating_sub(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::UnitReport;

    fn result_with_lookup_errors() -> RunResult {
        RunResult {
            tests_run: 3,
            errors: vec![
                UnitReport::new(
                    "unittest.loader._FailedTest.testFill",
                    None,
                    "AttributeError: module 'ftest' has no attribute 'testFill'",
                ),
                UnitReport::new("ftest.TestFunctional.testBlob", None, "real error"),
            ],
            failures: vec![UnitReport::new("ftest.TestFunctional.testFill", None, "boom")],
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_removes_only_matching_errors() {
        let mut result = result_with_lookup_errors();
        reconcile(&mut result, Some("testFill"));

        assert_eq!(result.tests_run, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].text, "real error");
        assert_eq!(result.failures.len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let mut once = result_with_lookup_errors();
        reconcile(&mut once, Some("testFill"));
        let mut twice = once.clone();
        reconcile(&mut twice, Some("testFill"));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_filter_is_noop() {
        let mut result = result_with_lookup_errors();
        reconcile(&mut result, None);
        reconcile(&mut result, Some(""));
        assert_eq!(result, result_with_lookup_errors());
    }

    #[test]
    fn test_other_name_untouched() {
        let mut result = result_with_lookup_errors();
        reconcile(&mut result, Some("testBlob"));
        assert_eq!(result, result_with_lookup_errors());
    }

    #[test]
    fn test_count_saturates() {
        let mut result = result_with_lookup_errors();
        result.tests_run = 0;
        reconcile(&mut result, Some("testFill"));
        assert_eq!(result.tests_run, 0);
    }
}
