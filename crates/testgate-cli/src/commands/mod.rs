//! Command implementations

pub mod coverage;
pub mod sources;
pub mod worker;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use testgate_config::{Config, ConfigLoader};
use testgate_core::RunConfiguration;

use crate::RunOptions;

/// Load the project config from an explicit file or by searching upwards
pub fn load_config(path: Option<&Path>, use_env: bool) -> Result<Config> {
    let loader = if use_env {
        ConfigLoader::new()
    } else {
        ConfigLoader::new().without_env()
    };

    match path {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            loader
                .load_from_directory(&cwd)
                .context("Failed to load project configuration")
        }
    }
}

/// Merge command-line flags over the loaded configuration
///
/// Flags win over config (and TESTGATE_* variables); toolpaths accumulate.
pub fn run_configuration(config: &Config, options: &RunOptions) -> RunConfiguration {
    let run = &config.project.run;

    let mut toolpath: Vec<PathBuf> = run
        .toolpath
        .iter()
        .map(|path| PathBuf::from(config.resolve(&path.to_string_lossy())))
        .collect();
    toolpath.extend(options.toolpath.iter().cloned());

    RunConfiguration::new()
        .with_processes(options.processes.or(run.processes))
        .with_verbosity(options.verbosity.or(run.verbosity).unwrap_or(0))
        .with_debug(options.debug || run.debug.unwrap_or(false))
        .with_preserve_dirs(options.preserve_dirs || run.preserve_dirs.unwrap_or(false))
        .with_toolpath(toolpath)
        .with_test_name(options.test_name.clone())
}
