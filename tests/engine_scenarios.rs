// End-to-end engine behavior over JSON documents in a scratch directory.
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jsonquery::api::{
    DirLoader, Engine, EngineOptions, Error, ErrorKind, Payload, Row, TableLoader, Value,
};
use jsonquery::notice::NoticeKind;
use serde_json::json;

const VIDEOS: &str = r#"[
  {"year": "2013", "month": "Oct", "coolness_rating_f": "12.5"},
  {"year": "2014", "month": "Jan", "coolness_rating_f": "9"}
]"#;

fn write_table(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(format!("{name}.json")), body).expect("write table");
}

fn videos_engine() -> (tempfile::TempDir, Engine) {
    let temp = tempfile::tempdir().expect("tempdir");
    write_table(temp.path(), "videos", VIDEOS);
    let engine = Engine::with_data_dir(temp.path());
    (temp, engine)
}

struct CountingLoader {
    inner: DirLoader,
    loads: Arc<AtomicUsize>,
}

impl TableLoader for CountingLoader {
    fn load(&self, name: &str) -> Result<Vec<Row>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(name)
    }
}

fn column<'a>(payload: &'a Payload, name: &str) -> Vec<&'a Value> {
    payload
        .rows()
        .expect("flat rows")
        .iter()
        .map(|row| row.get(name).expect("column present"))
        .collect()
}

#[test]
fn equality_returns_coerced_row() {
    let (_temp, mut engine) = videos_engine();
    let payload = engine
        .from("videos")
        .where_("year", "2013")
        .execute()
        .expect("execute");
    assert_eq!(
        payload.to_json(),
        json!([{"year": "2013", "month": "Oct", "coolness_rating_f": 12.5}])
    );
}

#[test]
fn ordered_comparison_uses_coerced_floats() {
    let (_temp, mut engine) = videos_engine();
    let payload = engine
        .from("videos")
        .where_("coolness_rating_f >", 10)
        .execute()
        .expect("execute");
    assert_eq!(column(&payload, "year"), vec![&Value::from("2013")]);
}

#[test]
fn membership_matches_numerically() {
    let (_temp, mut engine) = videos_engine();
    let payload = engine
        .from("videos")
        .where_("coolness_rating_f @", vec![9, 50])
        .execute()
        .expect("execute");
    assert_eq!(column(&payload, "year"), vec![&Value::from("2014")]);

    let payload = engine
        .from("videos")
        .where_("coolness_rating_f !@", vec![9, 50])
        .execute()
        .expect("execute");
    assert_eq!(column(&payload, "year"), vec![&Value::from("2013")]);
}

#[test]
fn attached_rows_are_not_coerced() {
    let mut engine = Engine::in_memory();
    let rows: Vec<Row> = vec![
        [("title", "Episode 1"), ("rating_f", "7.5")]
            .into_iter()
            .collect(),
    ];
    engine.attach(rows.clone(), "new_table");
    let payload = engine
        .from("new_table")
        .where_("title", "Episode 1")
        .execute()
        .expect("execute");
    assert_eq!(payload, Payload::Rows(rows));
}

#[test]
fn results_can_be_chained_into_a_new_table() {
    let (_temp, mut engine) = videos_engine();
    let first = engine
        .from("videos")
        .where_("coolness_rating_f >=", 9)
        .select(["year", "coolness_rating_f"])
        .execute()
        .expect("first");
    engine.attach(first.into_rows(), "rated");
    let second = engine
        .from("rated")
        .where_("coolness_rating_f <", 10)
        .execute()
        .expect("second");
    assert_eq!(
        second.to_json(),
        json!([{"year": "2014", "coolness_rating_f": 9.0}])
    );
}

#[test]
fn unfiltered_query_returns_every_row_in_load_order() {
    let (_temp, mut engine) = videos_engine();
    let payload = engine.from("videos").execute().expect("execute");
    assert_eq!(
        column(&payload, "month"),
        vec![&Value::from("Oct"), &Value::from("Jan")]
    );
}

fn calendar_engine() -> (tempfile::TempDir, Engine) {
    let temp = tempfile::tempdir().expect("tempdir");
    write_table(
        temp.path(),
        "calendar",
        r#"[
          {"id": 1, "year_i": "2014", "month_i": "3", "tag": "b"},
          {"id": 2, "year_i": "2013", "month_i": "11", "tag": "a"},
          {"id": 3, "year_i": "2014", "month_i": "1", "tag": "a"},
          {"id": 4, "year_i": "2013", "month_i": "2", "tag": "b"},
          {"id": 5, "year_i": "2014", "month_i": "1", "tag": "c"},
          {"id": 6, "year_i": "2013", "month_i": "11", "tag": "c"}
        ]"#,
    );
    let engine = Engine::with_data_dir(temp.path());
    (temp, engine)
}

fn ids(payload: &Payload) -> Vec<i64> {
    column(payload, "id")
        .into_iter()
        .map(|value| match value {
            Value::Int(n) => *n,
            other => panic!("unexpected id {other:?}"),
        })
        .collect()
}

#[test]
fn multi_key_sort_orders_by_each_key_in_turn() {
    let (_temp, mut engine) = calendar_engine();
    let payload = engine
        .from("calendar")
        .sort_asc(["year_i", "month_i"])
        .execute()
        .expect("execute");
    let rows = payload.rows().expect("rows");
    for pair in rows.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let (ya, yb) = (a.get("year_i").expect("year"), b.get("year_i").expect("year"));
        assert!(ya.as_f64() <= yb.as_f64());
        if ya == yb {
            assert!(a.get("month_i").expect("month").as_f64() <= b.get("month_i").expect("month").as_f64());
        }
    }
    // Full ties keep load order.
    assert_eq!(ids(&payload), vec![4, 2, 6, 3, 5, 1]);
}

#[test]
fn mixed_directions_compose() {
    let (_temp, mut engine) = calendar_engine();
    let payload = engine
        .from("calendar")
        .sort_desc("year_i")
        .sort_asc("tag")
        .execute()
        .expect("execute");
    assert_eq!(ids(&payload), vec![3, 1, 5, 2, 4, 6]);
}

#[test]
fn limit_and_offset_select_a_match_window() {
    let (_temp, mut engine) = calendar_engine();
    let all = ids(&engine.from("calendar").where_("year_i", 2014).execute().expect("all"));
    assert_eq!(all, vec![1, 3, 5]);

    let first_two = engine
        .from("calendar")
        .where_("year_i", 2014)
        .limit(2)
        .execute()
        .expect("limit");
    assert_eq!(ids(&first_two), vec![1, 3]);

    let window = engine
        .from("calendar")
        .where_("year_i", 2014)
        .limit(2)
        .offset(1)
        .execute()
        .expect("window");
    assert_eq!(ids(&window), vec![3, 5]);

    let past_end = engine
        .from("calendar")
        .where_("year_i", 2014)
        .offset(5)
        .execute()
        .expect("past end");
    assert!(ids(&past_end).is_empty());
}

#[test]
fn group_by_partitions_every_row_once() {
    let (_temp, mut engine) = calendar_engine();
    let payload = engine
        .from("calendar")
        .group_by("year_i")
        .execute()
        .expect("execute");
    let groups = payload.groups().expect("groups");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].key, Value::Int(2014));
    assert_eq!(groups[1].key, Value::Int(2013));
    assert_eq!(payload.row_count(), 6);
    for group in groups {
        assert!(group.rows.iter().all(|row| row.get("year_i") == Some(&group.key)));
    }
    let json = payload.to_json();
    let object = json.as_object().expect("object");
    assert_eq!(object.keys().collect::<Vec<_>>(), vec!["2014", "2013"]);
    assert_eq!(object["2013"].as_array().map(Vec::len), Some(3));
}

#[test]
fn select_keeps_exactly_the_listed_columns() {
    let (_temp, mut engine) = calendar_engine();
    let payload = engine
        .from("calendar")
        .select(["tag", "id"])
        .execute()
        .expect("execute");
    for row in payload.rows().expect("rows") {
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "tag"]);
    }
}

#[test]
fn where_all_is_and_composed() {
    let (_temp, mut engine) = calendar_engine();
    let payload = engine
        .from("calendar")
        .where_all([("year_i", Value::from(2013)), ("tag", Value::from("b"))])
        .execute()
        .expect("execute");
    assert_eq!(ids(&payload), vec![4]);
}

#[test]
fn absent_columns_never_satisfy_comparisons() {
    let (_temp, mut engine) = calendar_engine();
    let eq = engine.from("calendar").where_("missing", 1).execute().expect("eq");
    assert_eq!(eq.row_count(), 0);
    let gt = engine.from("calendar").where_("missing >", 0).execute().expect("gt");
    assert_eq!(gt.row_count(), 0);
    let not_in = engine
        .from("calendar")
        .where_("missing !@", vec![1, 2])
        .execute()
        .expect("not in");
    assert_eq!(not_in.row_count(), 6);
}

#[test]
fn caching_is_idempotent_and_skips_the_loader() {
    let temp = tempfile::tempdir().expect("tempdir");
    let data = temp.path().join("data");
    std::fs::create_dir_all(&data).expect("data dir");
    write_table(&data, "videos", VIDEOS);
    let cache_dir = temp.path().join("cache");

    let loads = Arc::new(AtomicUsize::new(0));
    let engine = |loads: &Arc<AtomicUsize>| {
        EngineOptions::new()
            .loader(CountingLoader {
                inner: DirLoader::new(&data),
                loads: Arc::clone(loads),
            })
            .cache_dir(&cache_dir)
            .build()
    };

    let mut first_engine = engine(&loads);
    let query = |engine: &mut Engine| {
        engine
            .from("videos")
            .where_("coolness_rating_f >", 1)
            .sort_desc("coolness_rating_f")
            .execute()
            .expect("execute")
    };
    let first = query(&mut first_engine);
    let second = query(&mut first_engine);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(
        serde_json::to_string(&first.to_json()).expect("encode"),
        serde_json::to_string(&second.to_json()).expect("encode")
    );

    // A fresh engine sharing the cache directory never loads the table.
    let fresh_loads = Arc::new(AtomicUsize::new(0));
    let mut second_engine = engine(&fresh_loads);
    let third = query(&mut second_engine);
    assert_eq!(fresh_loads.load(Ordering::SeqCst), 0);
    assert_eq!(first, third);

    // After clearing, the next run loads again.
    second_engine.clear_cache().expect("clear");
    let fourth = query(&mut second_engine);
    assert_eq!(fresh_loads.load(Ordering::SeqCst), 1);
    assert_eq!(first, fourth);
}

#[test]
fn cached_dates_round_trip_as_timestamps() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_table(
        temp.path(),
        "episodes",
        r#"[{"title": "Pilot", "aired_d": "2013-10-01"}]"#,
    );
    let mut engine = EngineOptions::new()
        .data_dir(temp.path())
        .cache_dir(temp.path().join("cache"))
        .build();
    let first = engine.from("episodes").execute().expect("first");
    let second = engine.from("episodes").execute().expect("second");
    assert_eq!(
        second.rows().expect("rows")[0].get("aired_d"),
        Some(&Value::Timestamp(1_380_585_600))
    );
    assert_eq!(first, second);
}

#[test]
fn bad_dates_become_zero_with_a_notice() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_table(
        temp.path(),
        "episodes",
        r#"[
          {"title": "Pilot", "aired_d": "2013-10-01", "views_i": "12abc"},
          {"title": "Lost", "aired_d": "someday", "views_i": "n/a"}
        ]"#,
    );
    let mut engine = Engine::with_data_dir(temp.path());
    let payload = engine
        .from("episodes")
        .sort_asc("aired_d")
        .execute()
        .expect("execute");
    let rows = payload.rows().expect("rows");
    assert_eq!(rows[0].get("title"), Some(&Value::from("Lost")));
    assert_eq!(rows[0].get("aired_d"), Some(&Value::Timestamp(0)));
    assert_eq!(rows[0].get("views_i"), Some(&Value::Int(0)));
    assert_eq!(rows[1].get("views_i"), Some(&Value::Int(12)));

    let notices = engine.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::InvalidDate);
    assert_eq!(notices[0].table.as_deref(), Some("episodes"));
    assert_eq!(notices[0].details["column"], "aired_d");
    assert_eq!(notices[0].details["row"], 1);
}

#[test]
fn unknown_operator_matches_nothing_and_reports() {
    let (_temp, mut engine) = videos_engine();
    let payload = engine
        .from("videos")
        .where_("year ~=", "2013")
        .execute()
        .expect("execute");
    assert_eq!(payload.row_count(), 0);
    let notices = engine.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::UnknownOperator);
    assert_eq!(notices[0].details["operator"], "~=");
}

#[test]
fn missing_table_is_not_found() {
    let (_temp, mut engine) = videos_engine();
    let err = engine.from("nope").execute().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.table(), Some("nope"));
}

#[test]
fn malformed_document_is_parse_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_table(temp.path(), "broken", r#"[{"year": "2013"},"#);
    let mut engine = Engine::with_data_dir(temp.path());
    let err = engine.from("broken").execute().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.hint().is_some_and(|hint| hint.contains("parse category")));

    // Failed loads are not remembered; a fixed document loads next time.
    write_table(temp.path(), "broken", r#"[{"year": "2013"}]"#);
    let payload = engine.from("broken").execute().expect("execute");
    assert_eq!(payload.row_count(), 1);
}

#[test]
fn tables_load_once_per_engine() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_table(temp.path(), "videos", VIDEOS);
    let loads = Arc::new(AtomicUsize::new(0));
    let mut engine = EngineOptions::new()
        .loader(CountingLoader {
            inner: DirLoader::new(temp.path()),
            loads: Arc::clone(&loads),
        })
        .build();
    engine.from("videos").execute().expect("first");
    engine.from("videos").where_("year", "2014").execute().expect("second");
    engine.table("videos").expect("describe");
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}
