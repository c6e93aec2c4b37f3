//! Purpose: Own the table store, the optional result cache, and collected notices behind a fluent API.
//! Exports: `Engine`, `EngineOptions`, `Query`.
//! Role: Public entry point; every query runs through `core::executor::execute`.
//! Invariants: Each `from()` starts an independent `QuerySpec`; nothing leaks between queries.
//! Invariants: One query runs at a time per engine (`&mut self`); tables live as long as the engine.
use std::fmt;
use std::path::PathBuf;

use crate::api::loader::DirLoader;
use crate::core::cache::{CacheStore, DEFAULT_PERMISSIONS, FileCache};
use crate::core::error::Error;
use crate::core::executor;
use crate::core::predicate::WhereClause;
use crate::core::query::{IntoColumns, QuerySpec};
use crate::core::store::{Table, TableLoader, TableStore};
use crate::core::value::{Payload, Row, Value};
use crate::notice::{Notice, NoticeLog};
use crate::table_paths::default_cache_dir;

enum CacheSetting {
    Disabled,
    Dir(Option<PathBuf>),
    Store(Box<dyn CacheStore>),
}

/// Engine configuration.
///
/// Caching is off unless `cache(true)`, `cache_dir`, or `cache_store` is set.
/// With caching on and no directory given, entries go under `~/.jsonquery/cache`.
pub struct EngineOptions {
    loader: Option<Box<dyn TableLoader>>,
    cache: CacheSetting,
    permissions: u32,
}

impl EngineOptions {
    pub fn new() -> Self {
        Self {
            loader: None,
            cache: CacheSetting::Disabled,
            permissions: DEFAULT_PERMISSIONS,
        }
    }

    /// Load tables from `<dir>/<name>.json`.
    pub fn data_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.loader(DirLoader::new(dir))
    }

    pub fn loader(mut self, loader: impl TableLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = match (enabled, self.cache) {
            (false, _) => CacheSetting::Disabled,
            (true, CacheSetting::Disabled) => CacheSetting::Dir(None),
            (true, existing) => existing,
        };
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = CacheSetting::Dir(Some(dir.into()));
        self
    }

    /// Mode applied to the cache directory and entry files (unix only).
    pub fn cache_permissions(mut self, mode: u32) -> Self {
        self.permissions = mode;
        self
    }

    pub fn cache_store(mut self, store: impl CacheStore + 'static) -> Self {
        self.cache = CacheSetting::Store(Box::new(store));
        self
    }

    pub fn build(self) -> Engine {
        Engine::new(self)
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Engine {
    store: TableStore,
    cache: Option<Box<dyn CacheStore>>,
    notices: NoticeLog,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let cache: Option<Box<dyn CacheStore>> = match options.cache {
            CacheSetting::Disabled => None,
            CacheSetting::Dir(dir) => {
                let dir = dir.unwrap_or_else(default_cache_dir);
                Some(Box::new(
                    FileCache::new(dir).with_permissions(options.permissions),
                ))
            }
            CacheSetting::Store(store) => Some(store),
        };
        Self {
            store: TableStore::new(options.loader),
            cache,
            notices: NoticeLog::default(),
        }
    }

    /// Engine reading `<dir>/<name>.json` with caching off.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        EngineOptions::new().data_dir(dir).build()
    }

    /// Engine with no loader; only attached tables resolve.
    pub fn in_memory() -> Self {
        EngineOptions::new().build()
    }

    pub fn from(&mut self, table: impl Into<String>) -> Query<'_> {
        Query {
            spec: QuerySpec::new().from(table),
            engine: self,
        }
    }

    /// Runs a prebuilt spec; clause problems are reported before it runs.
    pub fn execute(&mut self, spec: QuerySpec) -> Result<Payload, Error> {
        for clause in spec.wheres() {
            self.report_clause(clause, spec.table());
        }
        self.run(spec)
    }

    fn run(&mut self, spec: QuerySpec) -> Result<Payload, Error> {
        executor::execute(
            spec,
            &mut self.store,
            self.cache.as_deref_mut(),
            &mut self.notices,
        )
    }

    fn report_clause(&mut self, clause: &WhereClause, table: Option<&str>) {
        if let Some(notice) = clause.problem() {
            let notice = match table {
                Some(table) => notice.with_table(table),
                None => notice,
            };
            self.notices.emit(notice);
        }
    }

    /// Registers `rows` as table `name`, replacing any table of that name.
    ///
    /// Attached rows are used as given: no column types are inferred.
    pub fn attach(&mut self, rows: Vec<Row>, name: impl Into<String>) {
        self.store.attach(rows, name);
    }

    /// Resolves a table (loading and coercing it on first use).
    pub fn table(&mut self, name: &str) -> Result<&Table, Error> {
        self.store.resolve(name, &mut self.notices)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn clear_cache(&mut self) -> Result<(), Error> {
        match self.cache.as_deref_mut() {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.entries()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.take()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("tables", &self.store.table_names())
            .field("cache_enabled", &self.cache_enabled())
            .field("notices", &self.notices.entries().len())
            .finish()
    }
}

/// A query under construction against one engine.
#[must_use = "a query does nothing until `execute` is called"]
pub struct Query<'a> {
    engine: &'a mut Engine,
    spec: QuerySpec,
}

impl Query<'_> {
    /// `key_expr` is a column name optionally followed by an operator: `"year"`, `"rating >"`, `"id @"`.
    ///
    /// A clause that can never match is reported as a notice right away.
    pub fn where_(mut self, key_expr: &str, value: impl Into<Value>) -> Self {
        let clause = WhereClause::parse(key_expr, value);
        self.engine.report_clause(&clause, self.spec.table());
        self.spec = self.spec.where_clause(clause);
        self
    }

    pub fn where_all<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self = self.where_(key.as_ref(), value);
        }
        self
    }

    pub fn sort_asc(mut self, columns: impl IntoColumns) -> Self {
        self.spec = self.spec.sort_asc(columns);
        self
    }

    pub fn sort_desc(mut self, columns: impl IntoColumns) -> Self {
        self.spec = self.spec.sort_desc(columns);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.spec = self.spec.limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.spec = self.spec.offset(offset);
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.spec = self.spec.group_by(column);
        self
    }

    pub fn select(mut self, columns: impl IntoColumns) -> Self {
        self.spec = self.spec.select(columns);
        self
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }

    pub fn execute(self) -> Result<Payload, Error> {
        self.engine.run(self.spec)
    }
}
