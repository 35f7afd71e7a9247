//! Configuration Loader
//!
//! Handles loading configuration and applying overrides with proper precedence.

use crate::project::{ProjectConfig, MAX_VERBOSITY};
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Project config (./testgate.toml) - lowest priority
/// 2. Environment variables (TESTGATE_*) - overrides project
/// 3. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip environment overrides (used when the caller forwards everything explicitly)
    ignore_env: bool,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Project root directory (where testgate.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not apply TESTGATE_* environment overrides
    pub fn without_env(mut self) -> Self {
        self.ignore_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find testgate.toml. A missing file is not
    /// an error: defaults are used and the start directory is not a project.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        let project = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let project = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project,
            project_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognised variables: TESTGATE_PROCESSES, TESTGATE_VERBOSITY,
    /// TESTGATE_DEBUG, TESTGATE_TOOLPATH, TESTGATE_COVERAGE_TOOL
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(processes) = env::var("TESTGATE_PROCESSES") {
            let parsed = processes.trim().parse::<usize>().map_err(|_| {
                ConfigError::invalid(
                    "TESTGATE_PROCESSES",
                    format!("'{}' is not a process count", processes),
                )
            })?;
            config.run.processes = Some(parsed);
        }

        if let Ok(verbosity) = env::var("TESTGATE_VERBOSITY") {
            let parsed = verbosity
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|v| *v <= MAX_VERBOSITY)
                .ok_or_else(|| {
                    ConfigError::invalid(
                        "TESTGATE_VERBOSITY",
                        format!("'{}' is not a level between 0 and {}", verbosity, MAX_VERBOSITY),
                    )
                })?;
            config.run.verbosity = Some(parsed);
        }

        if let Ok(debug) = env::var("TESTGATE_DEBUG") {
            config.run.debug = Some(matches!(
                debug.to_lowercase().as_str(),
                "true" | "1" | "yes"
            ));
        }

        if let Some(toolpath) = env::var_os("TESTGATE_TOOLPATH") {
            config
                .run
                .toolpath
                .extend(env::split_paths(&toolpath).filter(|p| !p.as_os_str().is_empty()));
        }

        if let Ok(tool) = env::var("TESTGATE_COVERAGE_TOOL") {
            if !tool.trim().is_empty() {
                config.coverage_mut().tool = Some(tool);
            }
        }

        Ok(config)
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has testgate.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Resolve a configured (relative) pattern or path against the project root
    pub fn resolve(&self, relative: &str) -> String {
        match self.project_root() {
            Some(root) if !Path::new(relative).is_absolute() => {
                root.join(relative).to_string_lossy().into_owned()
            }
            _ => relative.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[run]
tool_name = "patman"
"#,
        );

        let config = ConfigLoader::new()
            .without_env()
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert_eq!(config.project.tool_name(), Some("patman"));
        assert!(config.is_project());
    }

    #[test]
    fn test_no_project_config() {
        let temp_dir = TempDir::new().unwrap();

        let config = ConfigLoader::new()
            .without_env()
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert!(!config.is_project());
        assert_eq!(config.project, ProjectConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_override_processes() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[run]
processes = 8
"#,
        );

        env::set_var("TESTGATE_PROCESSES", "1");
        let config = ConfigLoader::new().load_from_directory(temp_dir.path());
        env::remove_var("TESTGATE_PROCESSES");

        assert_eq!(config.unwrap().project.run.processes, Some(1));
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_bad_verbosity() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("TESTGATE_VERBOSITY", "9");
        let result = ConfigLoader::new().load_from_directory(temp_dir.path());
        env::remove_var("TESTGATE_VERBOSITY");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_resolve_relative_to_root() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            project: ProjectConfig::default(),
            project_root: Some(temp_dir.path().to_path_buf()),
        };

        let resolved = config.resolve("docs/*.md");
        assert!(resolved.starts_with(temp_dir.path().to_str().unwrap()));
        assert_eq!(config.resolve("/abs/*.md"), "/abs/*.md");
    }
}
