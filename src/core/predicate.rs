//! Purpose: Parse where-clause key expressions and evaluate them against rows.
//! Exports: `Operator`, `WhereClause`, `matches_all`, `loose_eq`, `compare`.
//! Role: Row filter used by the executor scan; parsing happens when the clause is added.
//! Invariants: Unknown operators and non-list membership operands never match (and never panic).
//! Invariants: A column absent from a row evaluates as `Null`.
use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::core::value::{Row, Value};
use crate::notice::{Notice, NoticeKind};

static NULL: Value = Value::Null;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Unknown(String),
}

impl Operator {
    pub fn parse(token: &str) -> Self {
        match token {
            "" | "=" => Operator::Eq,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "@" => Operator::In,
            "!@" => Operator::NotIn,
            other => Operator::Unknown(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Operator::Eq => "",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "@",
            Operator::NotIn => "!@",
            Operator::Unknown(token) => token,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WhereClause {
    column: String,
    operator: Operator,
    value: Value,
}

impl WhereClause {
    /// `key_expr` is a column name, optionally followed by whitespace and an operator token.
    pub fn parse(key_expr: &str, value: impl Into<Value>) -> Self {
        let trimmed = key_expr.trim();
        let (column, token) = match trimmed.split_once(char::is_whitespace) {
            Some((column, rest)) => (column, rest.trim()),
            None => (trimmed, ""),
        };
        Self {
            column: column.to_string(),
            operator: Operator::parse(token),
            value: value.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Diagnostic for a clause that can never match, if this is one.
    pub fn problem(&self) -> Option<Notice> {
        match &self.operator {
            Operator::Unknown(token) => Some(
                Notice::new(NoticeKind::UnknownOperator, format!("unknown operator: {token}"))
                    .with_detail("column", self.column.as_str())
                    .with_detail("operator", token.as_str()),
            ),
            Operator::In | Operator::NotIn if self.value.as_list().is_none() => Some(
                Notice::new(
                    NoticeKind::NonListMembership,
                    format!(
                        "membership operator {} needs a list operand",
                        self.operator.token()
                    ),
                )
                .with_detail("column", self.column.as_str())
                .with_detail("value", self.value.to_json()),
            ),
            _ => None,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let cell = row.get(&self.column).unwrap_or(&NULL);
        match &self.operator {
            Operator::Eq => loose_eq(cell, &self.value),
            Operator::Lt => compare(cell, &self.value) == Some(Ordering::Less),
            Operator::Le => matches!(
                compare(cell, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare(cell, &self.value) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                compare(cell, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => self
                .value
                .as_list()
                .is_some_and(|items| items.iter().any(|item| loose_eq(cell, item))),
            Operator::NotIn => self
                .value
                .as_list()
                .is_some_and(|items| !items.iter().any(|item| loose_eq(cell, item))),
            Operator::Unknown(_) => false,
        }
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Eq => write!(f, "{} = {}", self.column, self.value.to_json()),
            _ => write!(
                f,
                "{} {} {}",
                self.column,
                self.operator.token(),
                self.value.to_json()
            ),
        }
    }
}

/// AND over all clauses; an empty clause list matches every row.
pub fn matches_all(clauses: &[WhereClause], row: &Row) -> bool {
    clauses.iter().all(|clause| clause.matches(row))
}

/// Numeric equality when either side is a number, value equality otherwise.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_number() || b.is_number() {
        return match (a.numeric(), b.numeric()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
    }
    a == b
}

/// Ordering for `<`/`>` style operators; `None` when the pair is not comparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => match (a.numeric(), b.numeric()) {
            (Some(nx), Some(ny)) => nx.partial_cmp(&ny),
            _ => Some(x.cmp(y)),
        },
        _ if a.is_number() || b.is_number() => a.numeric()?.partial_cmp(&b.numeric()?),
        _ => None,
    }
}
