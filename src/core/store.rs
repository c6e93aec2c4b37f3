//! Purpose: Own every table an engine has touched, loading lazily on first reference.
//! Exports: `TableLoader`, `Table`, `TableStore`.
//! Role: Sits between the executor and the loader; runs type coercion exactly once per load.
//! Invariants: A table is loaded at most once per store; it is never evicted.
//! Invariants: Attached tables carry no column types and are never coerced.
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::core::coerce::{ColumnTypes, coerce_rows};
use crate::core::error::{Error, ErrorKind};
use crate::core::value::Row;
use crate::notice::NoticeLog;

/// Supplies the raw rows of a named table.
///
/// Implementations report a missing table as `ErrorKind::NotFound` and an
/// undecodable source as `ErrorKind::Parse`.
pub trait TableLoader {
    fn load(&self, name: &str) -> Result<Vec<Row>, Error>;
}

#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    rows: Vec<Row>,
    types: Option<ColumnTypes>,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `None` for attached tables.
    pub fn column_types(&self) -> Option<&ColumnTypes> {
        self.types.as_ref()
    }
}

pub struct TableStore {
    loader: Option<Box<dyn TableLoader>>,
    tables: HashMap<String, Table>,
}

impl TableStore {
    pub fn new(loader: Option<Box<dyn TableLoader>>) -> Self {
        Self {
            loader,
            tables: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, name: &str, notices: &mut NoticeLog) -> Result<&Table, Error> {
        match self.tables.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let table = load_table(self.loader.as_deref(), name, notices)?;
                Ok(entry.insert(table))
            }
        }
    }

    pub fn attach(&mut self, rows: Vec<Row>, name: impl Into<String>) {
        let name = name.into();
        tracing::debug!(table = %name, rows = rows.len(), "attached table");
        self.tables.insert(
            name.clone(),
            Table {
                name,
                rows,
                types: None,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn load_table(
    loader: Option<&dyn TableLoader>,
    name: &str,
    notices: &mut NoticeLog,
) -> Result<Table, Error> {
    let Some(loader) = loader else {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message("table is not attached and no data directory is configured")
            .with_table(name));
    };
    let mut rows = loader.load(name)?;
    let types = rows.first().map(ColumnTypes::infer).unwrap_or_default();
    coerce_rows(&mut rows, &types, name, notices);
    tracing::debug!(
        table = name,
        rows = rows.len(),
        columns = types.len(),
        "loaded table"
    );
    Ok(Table {
        name: name.to_string(),
        rows,
        types: Some(types),
    })
}
