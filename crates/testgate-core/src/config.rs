//! Run configuration shared by every stage of a test run

use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Highest supported verbosity level
pub const MAX_VERBOSITY: u8 = 4;

/// Settings for one test run
///
/// Built once before execution and only ever borrowed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfiguration {
    debug: bool,
    verbosity: u8,
    preserve_dirs: bool,
    processes: Option<usize>,
    test_name: Option<String>,
    toolpath: Vec<PathBuf>,
}

/// Arguments handed to a test class's `setup_test_args` hook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestArgs {
    /// Keep the input directory used by tests
    pub preserve_indir: bool,
    /// Keep output directories (only with a single selected test)
    pub preserve_outdirs: bool,
    /// Extra tool search paths
    pub toolpath: Vec<PathBuf>,
    /// Verbosity level (0-4)
    pub verbosity: u8,
}

impl RunConfiguration {
    /// Create a configuration with defaults (serial unless overridden, no filter)
    pub fn new() -> Self {
        Self::default()
    }

    /// Show full detail on errors and run units without output capture
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the verbosity level, clamped to 0-4
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity.min(MAX_VERBOSITY);
        self
    }

    /// Preserve test directories for inspection
    pub fn with_preserve_dirs(mut self, preserve: bool) -> Self {
        self.preserve_dirs = preserve;
        self
    }

    /// Number of workers (None or 0 = one per CPU, 1 = serial)
    pub fn with_processes(mut self, processes: Option<usize>) -> Self {
        self.processes = processes;
        self
    }

    /// Run only the named test
    pub fn with_test_name(mut self, name: Option<String>) -> Self {
        self.test_name = name.filter(|n| !n.is_empty());
        self
    }

    /// Tool search paths
    pub fn with_toolpath(mut self, toolpath: Vec<PathBuf>) -> Self {
        self.toolpath = toolpath;
        self
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn processes(&self) -> Option<usize> {
        self.processes
    }

    pub fn test_name(&self) -> Option<&str> {
        self.test_name.as_deref()
    }

    pub fn toolpath(&self) -> &[PathBuf] {
        &self.toolpath
    }

    /// Whether the input directory is kept
    pub fn preserve_indir(&self) -> bool {
        self.preserve_dirs
    }

    /// Whether output directories are kept; needs a single selected test
    pub fn preserve_outdirs(&self) -> bool {
        self.preserve_dirs && self.test_name.is_some()
    }

    /// True when the run must stay in the current process
    pub fn is_serial(&self) -> bool {
        self.processes == Some(1)
    }

    /// Resolve the worker count, falling back to the host's parallelism
    pub fn worker_count(&self) -> usize {
        match self.processes {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    /// Values for the `setup_test_args` hook
    pub fn test_args(&self) -> TestArgs {
        TestArgs {
            preserve_indir: self.preserve_indir(),
            preserve_outdirs: self.preserve_outdirs(),
            toolpath: self.toolpath.clone(),
            verbosity: self.verbosity,
        }
    }

    /// Command-line flags that recreate this configuration in a worker process
    ///
    /// The worker count is not forwarded: a worker always runs serially.
    pub fn forwarded_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.debug {
            args.push("-D".to_string());
        }
        if self.verbosity > 0 {
            args.push(format!("-v{}", self.verbosity));
        }
        for path in &self.toolpath {
            args.push("--toolpath".to_string());
            args.push(path.display().to_string());
        }
        if self.preserve_dirs {
            args.push("-X".to_string());
        }
        if let Some(name) = &self.test_name {
            args.push(name.clone());
        }
        args
    }
}
