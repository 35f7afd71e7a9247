//! Unit source discovery
//!
//! Expands the configured and command-line glob patterns into loaded
//! documentation modules and case files.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use testgate_config::Config;
use testgate_core::{list_files, CaseFile, CommandRunner, MarkdownModule, SystemRunner, UnitSource};
use tracing::{debug, warn};

use crate::SourceOptions;

/// Load every documentation module, then every case file
pub fn load_sources(config: &Config, options: &SourceOptions) -> Result<Vec<UnitSource>> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let mut sources = Vec::new();

    for path in expand(config, &config.project.sources.docs, &options.docs)? {
        debug!(path = %path.display(), "loading document");
        let module = MarkdownModule::load(&path, Arc::clone(&runner))
            .with_context(|| format!("Failed to load document: {}", path.display()))?;
        sources.push(UnitSource::module(module));
    }

    for path in expand(config, &config.project.sources.cases, &options.cases)? {
        debug!(path = %path.display(), "loading case file");
        let class = CaseFile::load(&path, Arc::clone(&runner))
            .with_context(|| format!("Failed to load case file: {}", path.display()))?;
        sources.push(UnitSource::class(class));
    }

    Ok(sources)
}

/// Configured patterns (resolved against the project root) followed by flag patterns
fn expand(config: &Config, configured: &[String], extra: &[String]) -> Result<Vec<PathBuf>> {
    let patterns = configured
        .iter()
        .map(|pattern| config.resolve(pattern))
        .chain(extra.iter().cloned());

    let mut seen = BTreeSet::new();
    let mut paths = Vec::new();
    for pattern in patterns {
        let matched = list_files(&pattern)?;
        if matched.is_empty() {
            warn!(pattern = %pattern, "pattern matched no files");
        }
        for path in matched {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }
    Ok(paths)
}
