//! Sort keys and the composite multi-key row comparator.

use std::cmp::Ordering;

use serde::Serialize;

use crate::core::value::{Row, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// Orders `rows` by all keys at once; rows tied on every key keep their input order.
pub fn sort_rows(rows: &mut [&Row], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| compare_rows(a, b, keys));
}

pub fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let cmp = match (a.get(&key.column), b.get(&key.column)) {
            (Some(av), Some(bv)) => compare_values(av, bv),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        if cmp != Ordering::Equal {
            return match key.direction {
                SortDirection::Asc => cmp,
                SortDirection::Desc => cmp.reverse(),
            };
        }
    }
    Ordering::Equal
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) | Value::Timestamp(_) => 2,
        Value::Str(_) if value.numeric().is_some() => 2,
        Value::Str(_) => 3,
        Value::List(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: null < bool < numbers (incl. numeric strings) < strings < lists < objects.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let ka = kind_rank(a);
    let kb = kind_rank(b);
    if ka != kb {
        return ka.cmp(&kb);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) if ka == 3 => x.cmp(y),
        (Value::List(x), Value::List(y)) => {
            for (xv, yv) in x.iter().zip(y.iter()) {
                let cmp = compare_values(xv, yv);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ if ka == 2 => {
            let x = a.numeric().unwrap_or(0.0);
            let y = b.numeric().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        _ => Ordering::Equal,
    }
}
