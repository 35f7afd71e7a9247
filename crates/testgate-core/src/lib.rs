//! Testgate test orchestration engine
//!
//! Provides the pieces of a test run:
//! - Output capture scopes for per-unit buffering
//! - Suite assembly from documentation modules and test classes
//! - Serial or worker-pool execution with result merging
//! - Reconciliation of filtered runs and deterministic reporting
//! - A coverage gate enforcing complete line coverage
//! - An adapter for the `futility` firmware-signing tool

pub mod capture;
pub mod cases;
pub mod command;
pub mod config;
pub mod coverage;
pub mod doc;
pub mod error;
pub mod executor;
pub mod files;
pub mod futility;
pub mod reconcile;
pub mod reporter;
pub mod result;
pub mod runner;
pub mod source;
pub mod suite;
pub mod unit;
pub mod worker;

// Re-export main types
pub use capture::{with_captured_output, CaptureGuard, Captured, OutputSinks, SharedBuffer};
pub use cases::CaseFile;
pub use command::{CommandOutput, CommandRunner, ExternalCommand, SystemRunner};
pub use config::{RunConfiguration, TestArgs, MAX_VERBOSITY};
pub use coverage::{CoverageGate, CoverageReport, CoverageRequest, FULL_COVERAGE};
pub use doc::{MarkdownModule, StaticModule};
pub use error::{GateError, GateResult};
pub use executor::{Executor, InProcessLauncher, ProcessLauncher, WorkerCrash, WorkerJob, WorkerLauncher};
pub use files::list_files;
pub use futility::{FirmwareSigning, Futility, GbbSettings, GbbSizes, KernelPack};
pub use reconcile::reconcile;
pub use reporter::{exit_status, TestReporter};
pub use result::{RunResult, UnitReport, UnitStatus};
pub use runner::{run_serial, UnitRunner};
pub use source::{DocModule, ResolveError, StaticClass, TestClass, UnitSource};
pub use suite::{assemble, TestSuite};
pub use unit::{Outcome, TestUnit, UnitContext, UnitKind};
pub use worker::{decode_result, encode_result, run_worker, RESULT_PREFIX};
