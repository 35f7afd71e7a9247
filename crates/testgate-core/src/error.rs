/// Error types for suite loading, external commands and the coverage gate
use std::path::PathBuf;
use thiserror::Error;

pub type GateResult<T> = Result<T, GateError>;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Failed to start '{command}': {error}")]
    CommandSpawn { command: String, error: String },

    #[error("Command '{command}' exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Invalid test source {path}: {reason}")]
    InvalidSource { path: PathBuf, reason: String },

    #[error("Invalid file pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: String },

    #[error("Worker protocol error: {0}")]
    WorkerProtocol(String),

    #[error("Test coverage failure: {}", describe_violation(.coverage, .missing))]
    CoveragePolicyViolation {
        coverage: String,
        missing: Vec<String>,
    },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create an invalid source error
    pub fn invalid_source(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, error: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            error: error.to_string(),
        }
    }
}

fn describe_violation(coverage: &str, missing: &[String]) -> String {
    let mut parts = Vec::new();
    if coverage != crate::coverage::FULL_COVERAGE {
        parts.push(format!("coverage is {}, but should be 100%", display_coverage(coverage)));
    }
    if !missing.is_empty() {
        parts.push(format!("missing tests for {}", missing.join(", ")));
    }
    if parts.is_empty() {
        parts.push(format!("coverage is {}", display_coverage(coverage)));
    }
    parts.join("; ")
}

fn display_coverage(coverage: &str) -> &str {
    if coverage.is_empty() {
        "unknown"
    } else {
        coverage
    }
}
