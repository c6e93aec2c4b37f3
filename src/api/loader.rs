//! Purpose: Load named tables from a directory of JSON documents.
//! Exports: `DirLoader`, `rows_from_json_str`.
//! Role: Default `TableLoader` for the engine and the CLI.
//! Invariants: A table document is a JSON array whose elements are all objects.
//! Invariants: Decode failures are `Parse` errors carrying a categorized hint.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::core::error::{Error, ErrorKind};
use crate::core::store::TableLoader;
use crate::core::value::Row;
use crate::json::parse;
use crate::table_paths::{TableNameResolveError, resolve_table_path};

#[derive(Clone, Debug)]
pub struct DirLoader {
    dir: PathBuf,
}

impl DirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, name: &str) -> Result<PathBuf, Error> {
        resolve_table_path(name, &self.dir).map_err(|err| match err {
            TableNameResolveError::Empty => Error::new(ErrorKind::Usage)
                .with_message("table name is empty")
                .with_hint("Pass a table name such as `videos` (loads videos.json)."),
            TableNameResolveError::ContainsPathSeparator => Error::new(ErrorKind::Usage)
                .with_message("table name must not contain path separators")
                .with_table(name)
                .with_hint("Use --dir to point at the directory holding the table."),
        })
    }
}

impl TableLoader for DirLoader {
    fn load(&self, name: &str) -> Result<Vec<Row>, Error> {
        let path = self.table_path(name)?;
        let text = fs::read_to_string(&path).map_err(|err| {
            let kind = match err.kind() {
                io::ErrorKind::NotFound => ErrorKind::NotFound,
                io::ErrorKind::PermissionDenied => ErrorKind::Permission,
                _ => ErrorKind::Io,
            };
            Error::new(kind)
                .with_message("can not read table document")
                .with_table(name)
                .with_path(&path)
                .with_source(err)
        })?;
        tracing::debug!(table = name, path = %path.display(), bytes = text.len(), "read table document");
        rows_from_json_str(&text, name).map_err(|err| err.with_table(name).with_path(&path))
    }
}

/// Decodes a table document; `context` names the source in parse hints.
pub fn rows_from_json_str(text: &str, context: &str) -> Result<Vec<Row>, Error> {
    let value: JsonValue = parse::from_str(text).map_err(|err| {
        let hint = parse::hint_for_error(&err, context);
        Error::new(ErrorKind::Parse)
            .with_message("table document is not valid JSON")
            .with_hint(hint)
            .with_source(err)
    })?;
    let JsonValue::Array(items) = value else {
        return Err(Error::new(ErrorKind::Parse)
            .with_message("table document must be a JSON array of objects")
            .with_hint(format!("context: {context}; found a {}", json_type_name(&value))));
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            Row::from_json(item).ok_or_else(|| {
                Error::new(ErrorKind::Parse)
                    .with_message(format!("row {idx} is not a JSON object"))
                    .with_hint(format!("context: {context}; found a {}", json_type_name(item)))
            })
        })
        .collect()
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
