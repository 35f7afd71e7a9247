//! Worker command implementation
//!
//! Runs one partition of the suite and prints the result marker line on
//! stdout. Everything except the sources arrives as flags from the parent,
//! so TESTGATE_* variables and config run defaults are ignored here.

use anyhow::{Context, Result};
use std::io;
use testgate_core::{assemble, run_worker, RunConfiguration};
use tracing::debug;

use super::{load_config, sources::load_sources};
use crate::RunOptions;

/// Arguments for the worker command
pub struct WorkerArgs {
    pub partition: usize,
    pub partitions: usize,
    pub run: RunOptions,
}

pub fn run(args: WorkerArgs) -> Result<()> {
    let config = load_config(args.run.sources.config.as_deref(), false)?;
    let run_config = forwarded_configuration(&args.run);

    let sources = load_sources(&config, &args.run.sources)?;
    let suite = assemble(&run_config, &sources).context("Failed to assemble test suite")?;
    debug!(
        partition = args.partition,
        partitions = args.partitions,
        units = suite.len(),
        "worker suite assembled"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_worker(&suite, args.partition, args.partitions, &run_config, &mut out)?;
    Ok(())
}

/// Rebuild the parent's run configuration from forwarded flags alone
fn forwarded_configuration(options: &RunOptions) -> RunConfiguration {
    RunConfiguration::new()
        .with_processes(Some(1))
        .with_verbosity(options.verbosity.unwrap_or(0))
        .with_debug(options.debug)
        .with_preserve_dirs(options.preserve_dirs)
        .with_toolpath(options.toolpath.clone())
        .with_test_name(options.test_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_forwarded_configuration_round_trips_parent_flags() {
        let parent = RunConfiguration::new()
            .with_verbosity(2)
            .with_debug(true)
            .with_preserve_dirs(true)
            .with_toolpath(vec![PathBuf::from("/opt/tools")])
            .with_test_name(Some("testFill".to_string()));

        let options = RunOptions {
            test_name: Some("testFill".to_string()),
            verbosity: Some(2),
            debug: true,
            preserve_dirs: true,
            toolpath: vec![PathBuf::from("/opt/tools")],
            ..RunOptions::default()
        };
        let worker = forwarded_configuration(&options);

        assert_eq!(worker.forwarded_args(), parent.forwarded_args());
        assert!(worker.is_serial());
    }
}
