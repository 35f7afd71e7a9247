//! Project Configuration (testgate.toml)
//!
//! Handles project-level configuration stored in `testgate.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Highest verbosity level accepted by the runner
pub const MAX_VERBOSITY: u8 = 4;

/// Coverage tool used when none is configured
pub const DEFAULT_COVERAGE_TOOL: &str = "python3-coverage";

/// Project configuration from testgate.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Test run defaults
    #[serde(default)]
    pub run: RunConfig,

    /// Where test units come from
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Coverage gate settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageConfig>,
}

/// Test run defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of worker processes (0 or unset = one per CPU, 1 = serial)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<usize>,

    /// Verbosity level (0-4)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<u8>,

    /// Run units without output capture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// Keep test input (and, for a single test, output) directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_dirs: Option<bool>,

    /// Extra search paths for tools used by tests
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub toolpath: Vec<PathBuf>,

    /// Name printed in the summary line ("<tool> tests OK")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// Unit sources, as glob patterns relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    /// Markdown documents holding runnable examples
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,

    /// TOML files describing test classes
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<String>,
}

/// Coverage gate settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CoverageConfig {
    /// Coverage tool executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Program whose test run is measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,

    /// Omit files next to the program whose path contains this text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Extra omit patterns
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Build directory holding auxiliary libraries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,

    /// Modules that must appear in the report
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Extra arguments passed to the program before the test subcommand
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<String>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(verbosity) = self.run.verbosity {
            if verbosity > MAX_VERBOSITY {
                return Err(ConfigError::invalid(
                    "run.verbosity",
                    format!("must be between 0 and {}, got {}", MAX_VERBOSITY, verbosity),
                ));
            }
        }

        if let Some(name) = &self.run.tool_name {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("run.tool_name", "name cannot be empty"));
            }
        }

        for (field, patterns) in [
            ("sources.docs", &self.sources.docs),
            ("sources.cases", &self.sources.cases),
        ] {
            if patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::invalid(field, "patterns cannot be empty"));
            }
        }

        if let Some(coverage) = &self.coverage {
            if matches!(&coverage.tool, Some(tool) if tool.trim().is_empty()) {
                return Err(ConfigError::invalid("coverage.tool", "tool cannot be empty"));
            }
        }

        Ok(())
    }

    /// Summary-line tool name, if configured
    pub fn tool_name(&self) -> Option<&str> {
        self.run.tool_name.as_deref()
    }

    /// Coverage tool executable (configured or default)
    pub fn coverage_tool(&self) -> &str {
        self.coverage
            .as_ref()
            .and_then(|c| c.tool.as_deref())
            .unwrap_or(DEFAULT_COVERAGE_TOOL)
    }

    /// Coverage section, creating it when absent
    pub fn coverage_mut(&mut self) -> &mut CoverageConfig {
        self.coverage.get_or_insert_with(CoverageConfig::default)
    }
}
