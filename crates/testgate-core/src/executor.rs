//! Worker pool executor
//!
//! Runs a suite serially, or splits it round-robin across workers and merges
//! the partial results on the coordinating thread as they complete.

use crate::capture::OutputSinks;
use crate::command::{CommandRunner, ExternalCommand, SystemRunner};
use crate::config::RunConfiguration;
use crate::result::RunResult;
use crate::runner::{panic_message, run_serial, UnitRunner};
use crate::suite::TestSuite;
use crate::unit::TestUnit;
use crate::worker::decode_result;
use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use thiserror::Error;
use tracing::{debug, info, warn};

/// One partition handed to a worker
#[derive(Debug, Clone)]
pub struct WorkerJob {
    /// Partition index
    pub index: usize,
    /// Total number of partitions
    pub count: usize,
    /// Units of this partition, in suite order
    pub units: Vec<TestUnit>,
}

/// A worker that did not deliver a result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}{}{}", status_suffix(.status), stderr_suffix(.stderr))]
pub struct WorkerCrash {
    /// What went wrong
    pub reason: String,
    /// Exit status, when the worker was a process that exited
    pub status: Option<i32>,
    /// Captured standard error of the worker
    pub stderr: String,
}

impl WorkerCrash {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            status: None,
            stderr: String::new(),
        }
    }
}

fn status_suffix(status: &Option<i32>) -> String {
    status
        .map(|s| format!(" (exit status {})", s))
        .unwrap_or_default()
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\nStderr:\n{}", stderr)
    }
}

/// Runs one partition in an isolated context
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, job: &WorkerJob, config: &RunConfiguration) -> Result<RunResult, WorkerCrash>;
}

impl<L: WorkerLauncher + ?Sized> WorkerLauncher for Arc<L> {
    fn launch(&self, job: &WorkerJob, config: &RunConfiguration) -> Result<RunResult, WorkerCrash> {
        (**self).launch(job, config)
    }
}

/// Runs each partition on a pool thread of this process
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessLauncher;

impl WorkerLauncher for InProcessLauncher {
    fn launch(&self, job: &WorkerJob, config: &RunConfiguration) -> Result<RunResult, WorkerCrash> {
        Ok(UnitRunner::with_sinks(config, OutputSinks::stdio()).run_all(&job.units))
    }
}

/// Re-executes a worker binary for each partition
///
/// The child is started as
/// `<program> <leading args> --partition <i> --partitions <n> <forwarded args>`
/// and must print a result marker line on stdout.
pub struct ProcessLauncher {
    program: String,
    leading_args: Vec<String>,
    runner: Arc<dyn CommandRunner>,
    forward_stderr: bool,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
            runner: Arc::new(SystemRunner),
            forward_stderr: true,
        }
    }

    /// Launcher re-running the current executable with a `worker` subcommand
    pub fn current_exe() -> Option<Self> {
        let exe = std::env::current_exe().ok()?;
        Some(Self::new(
            exe.to_string_lossy().into_owned(),
            vec!["worker".to_string()],
        ))
    }

    /// Append arguments placed before the partition flags
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.leading_args.extend(args);
        self
    }

    /// Use a different command runner
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Copy a successful worker's stderr to this process's stderr
    pub fn with_forward_stderr(mut self, forward: bool) -> Self {
        self.forward_stderr = forward;
        self
    }

    /// Command line for one partition
    pub fn command(&self, job: &WorkerJob, config: &RunConfiguration) -> ExternalCommand {
        ExternalCommand::new(self.program.as_str())
            .args(self.leading_args.iter().cloned())
            .arg("--partition")
            .arg(job.index.to_string())
            .arg("--partitions")
            .arg(job.count.to_string())
            .args(config.forwarded_args())
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, job: &WorkerJob, config: &RunConfiguration) -> Result<RunResult, WorkerCrash> {
        let command = self.command(job, config);
        let output = self
            .runner
            .run(&command)
            .map_err(|e| WorkerCrash::new(e.to_string()))?;

        if !output.success() {
            return Err(WorkerCrash {
                reason: "worker process failed".to_string(),
                status: Some(output.status),
                stderr: output.stderr,
            });
        }

        let result = decode_result(&output.stdout).map_err(|e| WorkerCrash {
            reason: e.to_string(),
            status: Some(output.status),
            stderr: output.stderr.clone(),
        })?;

        if self.forward_stderr && !output.stderr.is_empty() {
            let _ = io::stderr().write_all(output.stderr.as_bytes());
        }
        Ok(result)
    }
}

/// Executes suites serially or across a worker pool
pub struct Executor<L> {
    launcher: L,
    parallelism_available: bool,
}

impl<L: WorkerLauncher> Executor<L> {
    /// `parallelism_available` is decided once by the caller (e.g. whether a
    /// worker binary could be located)
    pub fn new(launcher: L, parallelism_available: bool) -> Self {
        Self {
            launcher,
            parallelism_available,
        }
    }

    pub fn parallelism_available(&self) -> bool {
        self.parallelism_available
    }

    /// Run the suite and return the merged result
    pub fn execute(&self, suite: &TestSuite, config: &RunConfiguration) -> RunResult {
        if !self.parallelism_available || config.is_serial() {
            info!(units = suite.len(), "running serially");
            return run_serial(suite.units(), config);
        }

        let count = config.worker_count();
        let jobs: Vec<WorkerJob> = suite
            .partition(count)
            .into_iter()
            .enumerate()
            .filter(|(_, units)| !units.is_empty())
            .map(|(index, units)| WorkerJob {
                index,
                count,
                units,
            })
            .collect();

        if jobs.is_empty() {
            return RunResult::new();
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.len())
            .thread_name(|i| format!("testgate-worker-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "cannot start worker pool, running serially");
                return run_serial(suite.units(), config);
            }
        };

        info!(units = suite.len(), workers = jobs.len(), "running in parallel");
        let launcher = &self.launcher;
        let (tx, rx) = mpsc::channel();

        pool.in_place_scope(|scope| {
            for job in &jobs {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    debug!(partition = job.index, units = job.units.len(), "worker launched");
                    let outcome = catch_unwind(AssertUnwindSafe(|| launcher.launch(job, config)))
                        .unwrap_or_else(|payload| {
                            Err(WorkerCrash::new(format!(
                                "worker panicked: {}",
                                panic_message(&*payload)
                            )))
                        });
                    let _ = tx.send((job.index, outcome));
                });
            }
            drop(tx);

            let mut merged = RunResult::new();
            for (index, outcome) in rx {
                match outcome {
                    Ok(partial) => {
                        debug!(partition = index, tests_run = partial.tests_run, "merging worker result");
                        merged.merge(partial);
                    }
                    Err(crash) => {
                        warn!(partition = index, %crash, "worker crashed");
                        merged.add_error(crash_id(index), crash.to_string());
                    }
                }
            }
            merged
        })
    }
}

/// Identity of the error entry recorded for a crashed partition
pub fn crash_id(index: usize) -> String {
    format!("worker-partition-{}", index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::error::GateResult;
    use crate::unit::Outcome;
    use crate::worker::encode_result;
    use parking_lot::Mutex;

    fn suite(n: usize) -> TestSuite {
        (0..n)
            .map(|i| {
                TestUnit::case(format!("m.C.t{}", i), move |_| {
                    Outcome::check(i % 3 != 0, format!("t{} failed", i))
                })
            })
            .collect()
    }

    #[test]
    fn test_serial_when_parallelism_unavailable() {
        let executor = Executor::new(InProcessLauncher, false);
        let config = RunConfiguration::new().with_processes(Some(4));
        let result = executor.execute(&suite(5), &config);
        assert_eq!(result.tests_run, 5);
        assert_eq!(result.failures.len(), 2);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let serial = Executor::new(InProcessLauncher, true)
            .execute(&suite(10), &RunConfiguration::new().with_processes(Some(1)));
        for workers in [2, 3, 16] {
            let parallel = Executor::new(InProcessLauncher, true)
                .execute(&suite(10), &RunConfiguration::new().with_processes(Some(workers)));
            assert_eq!(parallel.tests_run, serial.tests_run);
            assert_eq!(parallel.statuses(), serial.statuses());
        }
    }

    struct PanicsOnFirst;

    impl WorkerLauncher for PanicsOnFirst {
        fn launch(&self, job: &WorkerJob, config: &RunConfiguration) -> Result<RunResult, WorkerCrash> {
            if job.index == 0 {
                panic!("launcher exploded");
            }
            InProcessLauncher.launch(job, config)
        }
    }

    #[test]
    fn test_launcher_panic_is_one_error() {
        let result = Executor::new(PanicsOnFirst, true)
            .execute(&suite(4), &RunConfiguration::new().with_processes(Some(2)));

        assert_eq!(result.tests_run, 2);
        let crashes: Vec<_> = result
            .errors
            .iter()
            .filter(|r| r.id == "worker-partition-0")
            .collect();
        assert_eq!(crashes.len(), 1);
        assert_eq!(crashes[0].text, "worker panicked: launcher exploded");
    }

    /// Plays worker processes: partition 1 dies, the others report
    struct FakeWorkers {
        suite: TestSuite,
        commands: Mutex<Vec<ExternalCommand>>,
    }

    impl CommandRunner for FakeWorkers {
        fn run(&self, command: &ExternalCommand) -> GateResult<CommandOutput> {
            self.commands.lock().push(command.clone());
            let args = command.arguments();
            let index: usize = args[2].parse().unwrap();
            let count: usize = args[4].parse().unwrap();
            if index == 1 {
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: "segfault\n".to_string(),
                    status: 139,
                });
            }
            let units = self.suite.units_for_partition(index, count);
            let result = UnitRunner::with_sinks(
                &RunConfiguration::new(),
                OutputSinks::new(Box::new(io::sink()), Box::new(io::sink())),
            )
            .run_all(&units);
            Ok(CommandOutput {
                stdout: format!("{}\n", encode_result(&result)?),
                stderr: String::new(),
                status: 0,
            })
        }
    }

    #[test]
    fn test_process_worker_crash_is_isolated() {
        let fake = Arc::new(FakeWorkers {
            suite: suite(6),
            commands: Mutex::new(Vec::new()),
        });
        let launcher = ProcessLauncher::new("testgate", vec!["worker".to_string()])
            .with_runner(fake.clone())
            .with_forward_stderr(false);
        let config = RunConfiguration::new()
            .with_processes(Some(3))
            .with_verbosity(1);

        let result = Executor::new(launcher, true).execute(&suite(6), &config);

        assert_eq!(result.tests_run, 4);
        let crashes: Vec<_> = result.errors.iter().filter(|r| r.id.starts_with("worker-")).collect();
        assert_eq!(crashes.len(), 1);
        assert_eq!(crashes[0].id, "worker-partition-1");
        assert_eq!(
            crashes[0].text,
            "worker process failed (exit status 139)\nStderr:\nsegfault"
        );

        let mut argvs: Vec<_> = fake.commands.lock().iter().map(|c| c.command_line()).collect();
        argvs.sort();
        assert_eq!(
            argvs[0],
            "testgate worker --partition 0 --partitions 3 -v1"
        );
    }

    #[test]
    fn test_empty_partitions_not_launched() {
        let fake = Arc::new(FakeWorkers {
            suite: suite(2),
            commands: Mutex::new(Vec::new()),
        });
        let launcher = ProcessLauncher::new("testgate", vec!["worker".to_string()])
            .with_runner(fake.clone())
            .with_forward_stderr(false);

        let result = Executor::new(launcher, true)
            .execute(&suite(2), &RunConfiguration::new().with_processes(Some(8)));

        assert_eq!(fake.commands.lock().len(), 2);
        // partition 1 is the crashing one in the fake
        assert_eq!(result.tests_run, 1);
        assert_eq!(result.errors.len(), 1);
    }
}
