//! Coverage command implementation

use anyhow::{bail, Result};
use std::path::PathBuf;
use testgate_config::Config;
use testgate_core::{CoverageGate, CoverageRequest, GateError};
use tracing::info;

use super::load_config;

/// Arguments for the coverage command
pub struct CoverageArgs {
    pub config: Option<PathBuf>,
    pub program: Option<PathBuf>,
    pub filter: Option<String>,
    pub exclude: Vec<String>,
    pub build_dir: Option<PathBuf>,
    pub required: Vec<String>,
    pub extra_args: Option<String>,
    pub tool: Option<String>,
}

/// Run the coverage gate; returns the process exit status
pub fn run(args: CoverageArgs) -> Result<i32> {
    let config = load_config(args.config.as_deref(), true)?;
    let tool = args
        .tool
        .clone()
        .unwrap_or_else(|| config.project.coverage_tool().to_string());
    let request = build_request(&config, args)?;

    info!(tool = %tool, program = %request.program().display(), "checking coverage");
    match CoverageGate::new(tool).verify(&request) {
        Ok(_) => Ok(0),
        Err(e @ GateError::CoveragePolicyViolation { .. }) => {
            eprintln!("{}", e);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

/// Flags override the `[coverage]` table; lists from both accumulate
fn build_request(config: &Config, args: CoverageArgs) -> Result<CoverageRequest> {
    let settings = config.project.coverage.clone().unwrap_or_default();
    let resolve = |path: PathBuf| PathBuf::from(config.resolve(&path.to_string_lossy()));

    let program = match args.program.or_else(|| settings.program.map(resolve)) {
        Some(program) => program,
        None => bail!("No program to measure: pass --program or set coverage.program"),
    };

    let mut exclude = settings.exclude;
    exclude.extend(args.exclude);

    let mut required = settings.required;
    required.extend(args.required);

    Ok(CoverageRequest::new(program)
        .with_filter(args.filter.or(settings.filter))
        .with_exclude(exclude)
        .with_build_dir(args.build_dir.or_else(|| settings.build_dir.map(resolve)))
        .with_required(required)
        .with_extra_args(args.extra_args.or(settings.extra_args)))
}
