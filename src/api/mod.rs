//! Purpose: Define the stable public Rust API boundary for jsonquery.
//! Exports: `Engine`, `Query`, loaders, caches, and the value and error types they use.
//! Role: Public, additive-only surface; the CLI uses nothing else.
//! Invariants: Everything a caller needs to build, run, and inspect queries is re-exported here.

mod engine;
mod loader;

use std::path::PathBuf;

pub use crate::core::cache::{CacheStore, DEFAULT_PERMISSIONS, FileCache, MemoryCache};
pub use crate::core::cache_key::{canonical_encoding, derive_key};
pub use crate::core::coerce::{ColumnType, ColumnTypes};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::predicate::{Operator, WhereClause};
pub use crate::core::query::{IntoColumns, QuerySpec};
pub use crate::core::sort::{SortDirection, SortKey};
pub use crate::core::store::{Table, TableLoader};
pub use crate::core::value::{Group, Payload, Row, Value};
pub use engine::{Engine, EngineOptions, Query};
pub use loader::{DirLoader, rows_from_json_str};

/// `~/.jsonquery/cache`.
pub fn default_cache_dir() -> PathBuf {
    crate::table_paths::default_cache_dir()
}
