//! Worker side of process-based fan-out
//!
//! A worker process runs one partition serially and reports its partial
//! result as a single marker line on stdout:
//!
//! ```text
//! testgate-result: {"tests_run":2,"errors":[],"failures":[],"skipped":[]}
//! ```

use crate::capture::OutputSinks;
use crate::config::RunConfiguration;
use crate::error::{GateError, GateResult};
use crate::result::RunResult;
use crate::runner::UnitRunner;
use crate::suite::TestSuite;
use std::io::{self, Write};
use tracing::debug;

/// Prefix of the line carrying a worker's result
pub const RESULT_PREFIX: &str = "testgate-result: ";

/// Render a result as a marker line (without the trailing newline)
pub fn encode_result(result: &RunResult) -> GateResult<String> {
    let json = serde_json::to_string(result)
        .map_err(|e| GateError::WorkerProtocol(format!("cannot encode result: {}", e)))?;
    Ok(format!("{}{}", RESULT_PREFIX, json))
}

/// Find the last marker line in a worker's stdout and decode it
pub fn decode_result(stdout: &str) -> GateResult<RunResult> {
    let payload = stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_PREFIX))
        .ok_or_else(|| GateError::WorkerProtocol("no result line in worker output".to_string()))?;
    serde_json::from_str(payload)
        .map_err(|e| GateError::WorkerProtocol(format!("garbled result line: {}", e)))
}

/// Run partition `index` of `count` and write the marker line to `out`
///
/// Unit output goes to stderr so that stdout only carries the result.
pub fn run_worker(
    suite: &TestSuite,
    index: usize,
    count: usize,
    config: &RunConfiguration,
    out: &mut dyn Write,
) -> GateResult<RunResult> {
    if count == 0 || index >= count {
        return Err(GateError::WorkerProtocol(format!(
            "partition {} out of range for {} partitions",
            index, count
        )));
    }

    let units = suite.units_for_partition(index, count);
    debug!(index, count, units = units.len(), "worker starting");

    let sinks = OutputSinks::new(Box::new(io::stderr()), Box::new(io::stderr()));
    let result = UnitRunner::with_sinks(config, sinks).run_all(&units);

    writeln!(out, "{}", encode_result(&result)?)?;
    out.flush()?;
    Ok(result)
}
