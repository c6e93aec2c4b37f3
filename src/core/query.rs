//! Purpose: Accumulate the clauses of one query before execution.
//! Exports: `QuerySpec`, `IntoColumns`.
//! Role: Plain value built by chained calls; the executor consumes it exactly once.
//! Invariants: Where-clauses and sort keys append in call order; limit/offset/group/select overwrite.
//! Invariants: Operators are parsed when a clause is added, never during the scan.
use serde::Serialize;

use crate::core::predicate::WhereClause;
use crate::core::sort::{SortDirection, SortKey};
use crate::core::value::Value;

/// One column name or a sequence of them.
pub trait IntoColumns {
    fn into_columns(self) -> Vec<String>;
}

impl IntoColumns for &str {
    fn into_columns(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoColumns for String {
    fn into_columns(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoColumns for &String {
    fn into_columns(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoColumns for Vec<String> {
    fn into_columns(self) -> Vec<String> {
        self
    }
}

impl IntoColumns for Vec<&str> {
    fn into_columns(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoColumns for &[&str] {
    fn into_columns(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoColumns for &[String] {
    fn into_columns(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoColumns for [&str; N] {
    fn into_columns(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuerySpec {
    table: Option<String>,
    wheres: Vec<WhereClause>,
    sorts: Vec<SortKey>,
    limit: Option<usize>,
    offset: Option<usize>,
    group_by: Option<String>,
    select: Option<Vec<String>>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn where_(mut self, key_expr: &str, value: impl Into<Value>) -> Self {
        self.wheres.push(WhereClause::parse(key_expr, value));
        self
    }

    pub fn where_clause(mut self, clause: WhereClause) -> Self {
        self.wheres.push(clause);
        self
    }

    /// One clause per entry, in iteration order.
    pub fn where_all<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.wheres.push(WhereClause::parse(key.as_ref(), value));
        }
        self
    }

    pub fn sort_asc(self, columns: impl IntoColumns) -> Self {
        self.sort(columns, SortDirection::Asc)
    }

    pub fn sort_desc(self, columns: impl IntoColumns) -> Self {
        self.sort(columns, SortDirection::Desc)
    }

    pub fn sort(mut self, columns: impl IntoColumns, direction: SortDirection) -> Self {
        for column in columns.into_columns() {
            self.sorts.push(SortKey::new(column, direction));
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = Some(column.into());
        self
    }

    pub fn select(mut self, columns: impl IntoColumns) -> Self {
        self.select = Some(columns.into_columns());
        self
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    pub fn sorts(&self) -> &[SortKey] {
        &self.sorts
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<usize> {
        self.offset
    }

    pub fn group_column(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    pub fn selected(&self) -> Option<&[String]> {
        self.select.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::QuerySpec;
    use crate::core::predicate::Operator;
    use crate::core::sort::SortDirection;

    #[test]
    fn lists_append_and_scalars_overwrite() {
        let spec = QuerySpec::new()
            .from("videos")
            .where_("year", "2013")
            .where_all([("month", "Oct")])
            .sort_asc(["year", "month"])
            .sort_desc("title")
            .limit(5)
            .limit(3)
            .offset(1)
            .group_by("month")
            .group_by("year");

        assert_eq!(spec.table(), Some("videos"));
        assert_eq!(spec.wheres().len(), 2);
        assert_eq!(spec.wheres()[1].column(), "month");
        let sorts: Vec<_> = spec
            .sorts()
            .iter()
            .map(|k| (k.column.as_str(), k.direction))
            .collect();
        assert_eq!(
            sorts,
            vec![
                ("year", SortDirection::Asc),
                ("month", SortDirection::Asc),
                ("title", SortDirection::Desc),
            ]
        );
        assert_eq!(spec.limit_value(), Some(3));
        assert_eq!(spec.offset_value(), Some(1));
        assert_eq!(spec.group_column(), Some("year"));
    }

    #[test]
    fn operator_is_parsed_when_added() {
        let spec = QuerySpec::new().where_("coolness_rating_f >", 10);
        assert_eq!(spec.wheres()[0].operator(), &Operator::Gt);
        assert_eq!(spec.table(), None);
    }

    #[test]
    fn select_accepts_single_or_many() {
        let spec = QuerySpec::new().select("year");
        assert_eq!(spec.selected(), Some(&["year".to_string()][..]));
        let spec = QuerySpec::new().select(vec!["year", "month"]);
        assert_eq!(spec.selected().map(|s| s.len()), Some(2));
        let spec = QuerySpec::new().select(["year", "month"]).select("title");
        assert_eq!(spec.selected(), Some(&["title".to_string()][..]));
    }
}
