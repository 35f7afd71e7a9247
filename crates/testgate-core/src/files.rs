//! File listing by glob pattern

use crate::error::{GateError, GateResult};
use globset::GlobBuilder;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// List files matching a glob pattern, sorted by path
///
/// `*` does not cross directory separators; `**` does. A pattern without
/// wildcards matches the named file if it exists.
pub fn list_files(pattern: &str) -> GateResult<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| GateError::invalid_pattern(pattern, e))?
        .compile_matcher();

    let (base, depth) = split_pattern(Path::new(pattern));
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(&base).follow_links(true);
    if let Some(depth) = depth {
        walker = walker.max_depth(depth);
    }

    // Relative patterns walk from "." but match without the "./" prefix
    let implicit_cwd = !pattern.starts_with("./") && base == Path::new(".");

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let path = entry.into_path();
            match path.strip_prefix(".") {
                Ok(stripped) if implicit_cwd => stripped.to_path_buf(),
                _ => path,
            }
        })
        .filter(|path| matcher.is_match(path))
        .collect();

    files.sort();
    Ok(files)
}

/// Split a pattern into its literal leading directory and the walk depth
/// needed below it (`None` when `**` makes it unbounded)
fn split_pattern(pattern: &Path) -> (PathBuf, Option<usize>) {
    let mut base = PathBuf::new();
    let mut rest = Vec::new();

    for component in pattern.components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !text.contains(GLOB_META) {
            base.push(component);
        } else {
            rest.push(component);
        }
    }

    if rest.is_empty() {
        // Literal path: walk only the entry itself
        return (base, Some(0));
    }

    if base.as_os_str().is_empty() {
        base.push(Component::CurDir);
    }

    let unbounded = rest
        .iter()
        .any(|c| c.as_os_str().to_string_lossy().contains("**"));
    (base, if unbounded { None } else { Some(rest.len()) })
}
