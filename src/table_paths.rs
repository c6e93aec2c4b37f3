//! Purpose: Shared data-directory and table-name path resolution helpers.
//! Exports: `default_cache_dir` and `resolve_table_path`.
//! Role: Keep library loader and CLI path semantics aligned from one source.
//! Invariants: Default cache directory remains `~/.jsonquery/cache`.
//! Invariants: Table names must not contain path separators or parent references.

use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum TableNameResolveError {
    Empty,
    ContainsPathSeparator,
}

pub(crate) fn default_cache_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".jsonquery").join("cache")
}

pub(crate) fn resolve_table_path(
    name: &str,
    data_dir: &Path,
) -> Result<PathBuf, TableNameResolveError> {
    if name.is_empty() {
        return Err(TableNameResolveError::Empty);
    }
    if name.contains('/') || name.contains('\\') || name == ".." {
        return Err(TableNameResolveError::ContainsPathSeparator);
    }
    if name.ends_with(".json") {
        return Ok(data_dir.join(name));
    }
    Ok(data_dir.join(format!("{name}.json")))
}
