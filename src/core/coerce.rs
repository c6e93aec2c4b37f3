//! Purpose: Naming-convention-driven column typing for loader-sourced tables.
//! Exports: `ColumnType`, `ColumnTypes`, `DateParser`, `coerce_rows`.
//! Role: Runs once per table at first load; attached tables never pass through here.
//! Invariants: Types come from row 0's columns only and are applied to every row.
//! Invariants: A bad date never fails the load; it becomes `Timestamp(0)` plus a notice.
use serde_json::json;
use time::format_description::OwnedFormatItem;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::core::value::{Row, Value};
use crate::notice::{Notice, NoticeKind, NoticeLog};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnType {
    String,
    Int,
    Float,
    Date,
}

impl ColumnType {
    /// Type named by the token after the last `_` (`_f`, `_i`, `_d`).
    pub fn from_column_name(name: &str) -> Self {
        let suffix = name.rfind('_').map(|idx| &name[idx + 1..]);
        match suffix {
            Some("f") => ColumnType::Float,
            Some("i") => ColumnType::Int,
            Some("d") => ColumnType::Date,
            _ => ColumnType::String,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Date => "date",
        }
    }

    /// Converts one raw value; `None` means a date that could not be parsed.
    pub fn coerce(self, value: &Value, dates: &DateParser) -> Option<Value> {
        match self {
            ColumnType::String => Some(value.clone()),
            ColumnType::Float => Some(Value::Float(to_float(value))),
            ColumnType::Int => Some(Value::Int(to_int(value))),
            ColumnType::Date => dates.to_timestamp(value).map(Value::Timestamp),
        }
    }
}

/// Column → type map for one table, in row 0's column order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnTypes {
    columns: Vec<(String, ColumnType)>,
}

impl ColumnTypes {
    pub fn infer(first: &Row) -> Self {
        Self {
            columns: first
                .columns()
                .map(|name| (name.to_string(), ColumnType::from_column_name(name)))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Applies `types` to every row in place. Columns a row lacks stay absent.
pub fn coerce_rows(rows: &mut [Row], types: &ColumnTypes, table: &str, notices: &mut NoticeLog) {
    let typed: Vec<(&str, ColumnType)> = types
        .iter()
        .filter(|(_, ty)| *ty != ColumnType::String)
        .collect();
    if typed.is_empty() {
        return;
    }
    let dates = DateParser::new();

    for (column, ty) in typed {
        for (idx, row) in rows.iter_mut().enumerate() {
            let Some(slot) = row.get_mut(column) else {
                continue;
            };
            match ty.coerce(slot, &dates) {
                Some(value) => *slot = value,
                None => {
                    notices.emit(
                        Notice::new(
                            NoticeKind::InvalidDate,
                            format!("invalid date in column {column}"),
                        )
                        .with_table(table)
                        .with_detail("column", column)
                        .with_detail("row", idx)
                        .with_detail("value", json!(slot.to_string())),
                    );
                    *slot = Value::Timestamp(0);
                }
            }
        }
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Int(n) | Value::Timestamp(n) => *n as f64,
        Value::Float(n) => *n,
        Value::Str(s) => leading_number(s),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::List(items) => f64::from(u8::from(!items.is_empty())),
        Value::Object(row) => f64::from(u8::from(!row.is_empty())),
    }
}

fn to_int(value: &Value) -> i64 {
    match value {
        Value::Int(n) | Value::Timestamp(n) => *n,
        // `as` truncates toward zero and saturates; NaN becomes 0.
        other => to_float(other) as i64,
    }
}

/// Longest numeric prefix of `s` (`"12.5kg"` → 12.5); 0 when there is none.
fn leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if digits > 0 || frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().unwrap_or(0.0)
}

const DATE_TIME_FORMATS: &[&str] = &[
    "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second]",
    "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second]",
    "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]",
    "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]",
    "[year]/[month padding:none]/[day padding:none] [hour padding:none]:[minute]:[second]",
    "[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]",
];

const DATE_FORMATS: &[&str] = &[
    "[year]-[month padding:none]-[day padding:none]",
    "[year]/[month padding:none]/[day padding:none]",
    "[month padding:none]/[day padding:none]/[year]",
    "[month repr:long case_sensitive:false] [day padding:none], [year]",
    "[month repr:short case_sensitive:false] [day padding:none], [year]",
    "[month repr:long case_sensitive:false] [day padding:none] [year]",
    "[month repr:short case_sensitive:false] [day padding:none] [year]",
    "[day padding:none] [month repr:long case_sensitive:false] [year]",
    "[day padding:none] [month repr:short case_sensitive:false] [year]",
];

/// Free-form date text → Unix seconds (UTC when no offset is given).
pub struct DateParser {
    date_times: Vec<OwnedFormatItem>,
    dates: Vec<OwnedFormatItem>,
}

impl DateParser {
    pub fn new() -> Self {
        let compile = |formats: &[&str]| {
            formats
                .iter()
                .filter_map(|desc| time::format_description::parse_owned::<1>(desc).ok())
                .collect()
        };
        Self {
            date_times: compile(DATE_TIME_FORMATS),
            dates: compile(DATE_FORMATS),
        }
    }

    pub fn to_timestamp(&self, value: &Value) -> Option<i64> {
        match value {
            Value::Timestamp(n) | Value::Int(n) => Some(*n),
            Value::Float(n) if n.is_finite() => Some(*n as i64),
            Value::Str(s) => self.parse(s),
            _ => None,
        }
    }

    pub fn parse(&self, input: &str) -> Option<i64> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if let Some(epoch) = input.strip_prefix('@') {
            return epoch.parse::<i64>().ok();
        }
        if let Ok(ts) = OffsetDateTime::parse(input, &Rfc3339) {
            return Some(ts.unix_timestamp());
        }
        if let Ok(ts) = OffsetDateTime::parse(input, &Rfc2822) {
            return Some(ts.unix_timestamp());
        }
        for format in &self.date_times {
            if let Ok(ts) = PrimitiveDateTime::parse(input, format) {
                return Some(ts.assume_utc().unix_timestamp());
            }
        }
        for format in &self.dates {
            if let Ok(date) = Date::parse(input, format) {
                return Some(date.midnight().assume_utc().unix_timestamp());
            }
        }
        None
    }
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new()
    }
}
