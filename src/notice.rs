//! Purpose: Define a stable, structured schema for non-fatal query diagnostics.
//! Exports: `Notice`, `NoticeKind`, `NoticeLog`, `notice_json`.
//! Role: Shared contract for data-shape problems the engine tolerates (bad operator, bad date).
//! Invariants: Notices are non-fatal and never alter query payloads.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value, json};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeKind {
    UnknownOperator,
    NonListMembership,
    InvalidDate,
    NoActiveQuery,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeKind::UnknownOperator => "unknown_operator",
            NoticeKind::NonListMembership => "non_list_membership",
            NoticeKind::InvalidDate => "invalid_date",
            NoticeKind::NoActiveQuery => "no_active_query",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub time: String,
    pub table: Option<String>,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            time: notice_time_now().unwrap_or_default(),
            table: None,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind.as_str()));
    inner.insert("time".to_string(), json!(notice.time));
    if let Some(table) = &notice.table {
        inner.insert("table".to_string(), json!(table));
    }
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// Accumulates notices until the caller drains them; every notice is also logged.
#[derive(Debug, Default)]
pub struct NoticeLog {
    entries: Vec<Notice>,
}

impl NoticeLog {
    pub fn emit(&mut self, notice: Notice) {
        tracing::warn!(
            kind = notice.kind.as_str(),
            table = notice.table.as_deref().unwrap_or(""),
            "{}",
            notice.message
        );
        self.entries.push(notice);
    }

    pub fn entries(&self) -> &[Notice] {
        &self.entries
    }

    pub fn take(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.entries)
    }
}
