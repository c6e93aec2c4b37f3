//! Purpose: Run one `QuerySpec` end to end: cache lookup, load, sort, scan, project, group, write-back.
//! Exports: `execute`.
//! Role: Pure orchestration over the table store and an optional cache; owns no state.
//! Invariants: A cache hit is returned as stored (no re-projection or re-grouping).
//! Invariants: Sorting works on a view; the stored table keeps its load order.
//! Invariants: The scan stops as soon as `offset + limit` matches have been seen.
use std::collections::HashMap;

use crate::core::cache::CacheStore;
use crate::core::cache_key::derive_key;
use crate::core::error::{Error, ErrorKind};
use crate::core::predicate::matches_all;
use crate::core::query::QuerySpec;
use crate::core::sort::sort_rows;
use crate::core::store::TableStore;
use crate::core::value::{Group, Payload, Row, Value};
use crate::notice::{Notice, NoticeKind, NoticeLog};

pub fn execute<C>(
    spec: QuerySpec,
    store: &mut TableStore,
    mut cache: Option<&mut C>,
    notices: &mut NoticeLog,
) -> Result<Payload, Error>
where
    C: CacheStore + ?Sized,
{
    let Some(table_name) = spec.table() else {
        notices.emit(Notice::new(
            NoticeKind::NoActiveQuery,
            "execute() called without an active query",
        ));
        return Err(Error::new(ErrorKind::Configuration)
            .with_message("no active query: no table selected")
            .with_hint("Start every query with from(<table>)."));
    };

    let key = match cache {
        Some(_) => Some(derive_key(&spec)?),
        None => None,
    };
    if let (Some(cache), Some(key)) = (cache.as_deref(), key.as_deref()) {
        if let Some(payload) = cache.get(key) {
            tracing::debug!(table = table_name, key, "cache hit");
            return Ok(payload);
        }
        tracing::debug!(table = table_name, key, "cache miss");
    }

    let table = store.resolve(table_name, notices)?;
    let mut view: Vec<&Row> = table.rows().iter().collect();
    sort_rows(&mut view, spec.sorts());

    let mut results = scan(&view, &spec);
    if let Some(columns) = spec.selected() {
        for row in &mut results {
            row.retain_columns(columns);
        }
    }
    let payload = match spec.group_column() {
        Some(column) => Payload::Groups(group_rows(results, column)),
        None => Payload::Rows(results),
    };
    tracing::debug!(
        table = table_name,
        scanned = table.len(),
        returned = payload.row_count(),
        "query executed"
    );

    if let (Some(cache), Some(key)) = (cache.as_deref_mut(), key.as_deref()) {
        cache.set(key, &payload)?;
    }
    Ok(payload)
}

fn scan(view: &[&Row], spec: &QuerySpec) -> Vec<Row> {
    let offset = spec.offset_value().unwrap_or(0);
    let stop = spec.limit_value().map(|limit| limit.saturating_add(offset));
    if stop == Some(0) {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut matched = 0usize;
    for row in view {
        if !matches_all(spec.wheres(), row) {
            continue;
        }
        matched += 1;
        if matched > offset {
            results.push((*row).clone());
        }
        if stop.is_some_and(|stop| matched >= stop) {
            break;
        }
    }
    results
}

/// Partitions rows by `column` in first-occurrence order; rows lacking it group under `Null`.
fn group_rows(rows: Vec<Row>, column: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let key = row.get(column).cloned().unwrap_or(Value::Null);
        let slot = format!("{key:?}");
        match index.get(&slot) {
            Some(&idx) => groups[idx].rows.push(row),
            None => {
                index.insert(slot, groups.len());
                groups.push(Group {
                    key,
                    rows: vec![row],
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::execute;
    use crate::core::cache::{CacheStore, FileCache, MemoryCache};
    use crate::core::error::ErrorKind;
    use crate::core::query::QuerySpec;
    use crate::core::store::TableStore;
    use crate::core::value::{Payload, Row, Value};
    use crate::notice::{NoticeKind, NoticeLog};

    fn store() -> TableStore {
        let mut store = TableStore::new(None);
        let rows: Vec<Row> = (1..=10)
            .map(|n| {
                let mut row = Row::new();
                row.insert("n", n);
                row.insert("parity", if n % 2 == 0 { "even" } else { "odd" });
                row
            })
            .collect();
        store.attach(rows, "numbers");
        store
    }

    fn run(spec: QuerySpec) -> Payload {
        let mut store = store();
        let mut notices = NoticeLog::default();
        execute(spec, &mut store, None::<&mut MemoryCache>, &mut notices).expect("execute")
    }

    fn ns(payload: &Payload) -> Vec<i64> {
        payload
            .rows()
            .expect("rows")
            .iter()
            .map(|row| match row.get("n") {
                Some(Value::Int(n)) => *n,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn limit_and_offset_slice_matches() {
        let spec = QuerySpec::new().from("numbers").where_("parity", "even");
        assert_eq!(ns(&run(spec.clone())), vec![2, 4, 6, 8, 10]);
        assert_eq!(ns(&run(spec.clone().limit(2))), vec![2, 4]);
        assert_eq!(ns(&run(spec.clone().limit(2).offset(1))), vec![4, 6]);
        assert_eq!(ns(&run(spec.clone().offset(3))), vec![8, 10]);
        assert_eq!(ns(&run(spec.clone().limit(10).offset(4))), vec![10]);
        assert!(ns(&run(spec.limit(0))).is_empty());
    }

    #[test]
    fn pagination_applies_after_sort() {
        let spec = QuerySpec::new()
            .from("numbers")
            .sort_desc("n")
            .limit(3)
            .offset(1);
        assert_eq!(ns(&run(spec)), vec![9, 8, 7]);
    }

    #[test]
    fn sorting_does_not_reorder_the_stored_table() {
        let mut store = store();
        let mut notices = NoticeLog::default();
        let sorted = QuerySpec::new().from("numbers").sort_desc("n").limit(1);
        execute(sorted, &mut store, None::<&mut MemoryCache>, &mut notices).expect("sorted");
        let natural = QuerySpec::new().from("numbers").limit(1);
        let payload =
            execute(natural, &mut store, None::<&mut MemoryCache>, &mut notices).expect("natural");
        assert_eq!(ns(&payload), vec![1]);
    }

    #[test]
    fn select_then_group() {
        let spec = QuerySpec::new()
            .from("numbers")
            .where_("n <=", 4)
            .select(["n", "parity"])
            .group_by("parity");
        let payload = run(spec);
        let groups = payload.groups().expect("groups");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, Value::from("odd"));
        assert_eq!(groups[0].rows.len(), 2);
        assert_eq!(payload.group(&Value::from("even")).map(|r| r.len()), Some(2));
    }

    #[test]
    fn projection_keeps_only_selected_columns() {
        let payload = run(QuerySpec::new().from("numbers").select("parity"));
        for row in payload.rows().expect("rows") {
            assert_eq!(row.columns().collect::<Vec<_>>(), vec!["parity"]);
        }
    }

    #[test]
    fn missing_table_is_configuration_error() {
        let mut store = store();
        let mut notices = NoticeLog::default();
        let err = execute(
            QuerySpec::new().where_("n", 1),
            &mut store,
            None::<&mut MemoryCache>,
            &mut notices,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(notices.entries()[0].kind, NoticeKind::NoActiveQuery);
    }

    #[test]
    fn cache_hit_returns_stored_payload() {
        let mut store = store();
        let mut notices = NoticeLog::default();
        let mut cache = MemoryCache::new();
        let spec = QuerySpec::new().from("numbers").where_("n", 3);

        let first =
            execute(spec.clone(), &mut store, Some(&mut cache), &mut notices).expect("first");
        assert_eq!(cache.len(), 1);

        // Replace the table: a hit must not consult it.
        store.attach(Vec::new(), "numbers");
        let second = execute(spec, &mut store, Some(&mut cache), &mut notices).expect("second");
        assert_eq!(first, second);
        assert!(cache.has(&crate::core::cache_key::derive_key(
            &QuerySpec::new().from("numbers").where_("n", 3)
        )
        .expect("key")));
    }

    #[test]
    fn cache_write_failure_is_returned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").expect("write");
        let mut cache = FileCache::new(blocker.join("cache"));
        let mut store = store();
        let mut notices = NoticeLog::default();
        let spec = QuerySpec::new().from("numbers").where_("n", 3);
        let key = crate::core::cache_key::derive_key(&spec).expect("key");

        let err = execute(spec, &mut store, Some(&mut cache), &mut notices).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheIo);
        assert!(!cache.has(&key));
        assert!(cache.get(&key).is_none());
    }
}
