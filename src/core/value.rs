//! Purpose: Typed cell values, ordered rows, and query result payloads.
//! Exports: `Value`, `Row`, `Group`, `Payload`.
//! Role: Shared data model for the store, predicate matching, sorting, and caching.
//! Invariants: `Row` preserves column insertion order; duplicate columns are replaced in place.
//! Invariants: Serde encoding is tagged so cached payloads round-trip without losing `Timestamp`.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Seconds since the Unix epoch.
    Timestamp(i64),
    List(Vec<Value>),
    Object(Row),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Numeric view of number-typed values only.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) | Self::Timestamp(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Timestamp(_))
    }

    /// Numeric view that also accepts strings holding a complete finite number.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Self::Str(s) => parse_numeric_str(s),
            other => other.as_f64(),
        }
    }

    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => Self::Str(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Object(Row::from_json_map(map)),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(n) | Self::Timestamp(n) => JsonValue::Number((*n).into()),
            Self::Float(n) => Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Str(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(row) => row.to_json(),
        }
    }
}

pub(crate) fn parse_numeric_str(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Rust accepts "inf"/"nan"; numeric strings here are digits only.
    let starts_numeric = trimmed
        .trim_start_matches(['+', '-'])
        .starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if !starts_numeric {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) | Self::Timestamp(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(_) | Self::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(value: [T; N]) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        Self::from_json(value)
    }
}

/// One record: columns in source order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.columns
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        match self.get_mut(&column) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.columns.push((column, value));
                None
            }
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Drops every column not listed in `keep`; survivors keep their order.
    pub fn retain_columns(&mut self, keep: &[String]) {
        self.columns.retain(|(name, _)| keep.iter().any(|k| k == name));
    }

    pub fn from_json(value: &JsonValue) -> Option<Self> {
        value.as_object().map(Self::from_json_map)
    }

    fn from_json_map(map: &Map<String, JsonValue>) -> Self {
        Self {
            columns: map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for (name, value) in &self.columns {
            map.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: Value,
    pub rows: Vec<Row>,
}

/// Final, post-projection/grouping result of one query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Rows(Vec<Row>),
    Groups(Vec<Group>),
}

impl Payload {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Rows(rows) => Some(rows.as_slice()),
            Self::Groups(_) => None,
        }
    }

    pub fn groups(&self) -> Option<&[Group]> {
        match self {
            Self::Groups(groups) => Some(groups.as_slice()),
            Self::Rows(_) => None,
        }
    }

    pub fn group(&self, key: &Value) -> Option<&[Row]> {
        self.groups()?
            .iter()
            .find(|group| &group.key == key)
            .map(|group| group.rows.as_slice())
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Groups(groups) => groups.into_iter().flat_map(|group| group.rows).collect(),
        }
    }

    /// Total number of rows, across groups when grouped.
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Groups(groups) => groups.iter().map(|group| group.rows.len()).sum(),
        }
    }

    /// Plain JSON rendering: an array of objects, or an object of arrays keyed by group value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Rows(rows) => JsonValue::Array(rows.iter().map(Row::to_json).collect()),
            Self::Groups(groups) => {
                let mut map = Map::new();
                for group in groups {
                    let key = group.key.to_string();
                    let rows = group.rows.iter().map(Row::to_json);
                    // Distinct values can share a string form (2013 vs "2013").
                    if let Some(JsonValue::Array(existing)) = map.get_mut(&key) {
                        existing.extend(rows);
                        continue;
                    }
                    map.insert(key, JsonValue::Array(rows.collect()));
                }
                JsonValue::Object(map)
            }
        }
    }
}
