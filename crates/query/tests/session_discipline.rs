//! Service behaviour against an in-test store that records every call and
//! tracks how many sessions are open.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ub515_common::StoreBackend;
use ub515_query::{
    AggregateFunction, BuiltQuery, Dialect, FailureKind, QueryError, QueryRequest, RawResultSet,
    RawValue, SqlValue, TableStore, TabularQueryService,
};

const TABLES_SQL: &str = "-- tables";
const COLUMNS_SQL: &str = "-- columns";

#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<(String, Vec<SqlValue>)>>,
    adhoc: Mutex<Vec<String>>,
    open: AtomicUsize,
    opened: AtomicUsize,
}

struct Session<'a>(&'a AtomicUsize);

impl<'a> Session<'a> {
    fn open(store: &'a RecordingStore) -> Self {
        store.opened.fetch_add(1, Ordering::SeqCst);
        store.open.fetch_add(1, Ordering::SeqCst);
        Session(&store.open)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingStore {
    fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.calls.lock().unwrap().clone()
    }

    fn data_queries(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.calls()
            .into_iter()
            .filter(|(sql, _)| sql.starts_with("SELECT"))
            .collect()
    }
}

fn text(s: &str) -> RawValue {
    RawValue::Text(s.to_string())
}

#[async_trait]
impl TableStore for RecordingStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Postgres
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> ub515_query::Result<RawResultSet> {
        let _session = Session::open(self);
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        match sql {
            TABLES_SQL => Ok(RawResultSet {
                columns: vec!["table_name".into()],
                rows: vec![vec![text("athletes_race")]],
            }),
            COLUMNS_SQL if params == [SqlValue::Text("athletes_race".into())] => Ok(RawResultSet {
                columns: vec![
                    "column_name".into(),
                    "data_type".into(),
                    "underlying_type".into(),
                ],
                rows: vec![
                    vec![text("id"), text("integer"), text("int4")],
                    vec![text("race_edition"), text("character varying"), text("varchar")],
                    vec![text("race_date"), text("date"), text("date")],
                ],
            }),
            COLUMNS_SQL => Ok(RawResultSet::default()),
            _ if params.first() == Some(&SqlValue::Text("boom".into())) => {
                Err(QueryError::QueryExecution {
                    message: "canceling statement due to conflict with recovery".into(),
                    kind: FailureKind::Other,
                    sqlstate: Some("40001".into()),
                    source: None,
                })
            }
            _ => Ok(RawResultSet {
                columns: vec!["id".into()],
                rows: vec![vec![RawValue::Integer(1)], vec![RawValue::Null]],
            }),
        }
    }

    async fn fetch_adhoc(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> ub515_query::Result<RawResultSet> {
        self.adhoc.lock().unwrap().push(sql.to_string());
        self.fetch(sql, params).await
    }

    fn tables_query(&self) -> BuiltQuery {
        BuiltQuery::new(TABLES_SQL, Vec::new())
    }

    fn columns_query(&self, table: &str) -> BuiltQuery {
        BuiltQuery::new(COLUMNS_SQL, vec![SqlValue::Text(table.to_string())])
    }
}

fn service() -> (Arc<RecordingStore>, TabularQueryService) {
    let store = Arc::new(RecordingStore::default());
    let service = TabularQueryService::new(store.clone());
    (store, service)
}

#[tokio::test]
async fn test_hostile_table_name_issues_no_store_call() -> Result<()> {
    let (store, service) = service();
    let none: [(&str, SqlValue); 0] = [];

    let err = service
        .get_by_filter("users; DROP TABLE x", &none, None)
        .await
        .unwrap_err();

    assert!(err.is_identifier_validation());
    assert!(store.calls().is_empty());
    assert_eq!(store.opened.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_hostile_filter_key_issues_no_store_call() -> Result<()> {
    let (store, service) = service();

    let err = service
        .get_by_filter("athletes_race", &[("id\" = 1 OR \"1", SqlValue::Int(1))], None)
        .await
        .unwrap_err();
    assert!(err.is_identifier_validation());

    let err = service
        .get_aggregated("athletes_race", "race_edition", "id; --", AggregateFunction::Count, None)
        .await
        .unwrap_err();
    assert!(err.is_identifier_validation());

    assert!(store.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_table_never_reaches_query_construction() -> Result<()> {
    let (store, service) = service();

    let err = service.get_all("athletes_results", None).await.unwrap_err();
    assert!(err.is_identifier_validation());
    // only the catalog was consulted
    assert!(store.data_queries().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_allow_list_loaded_once() -> Result<()> {
    let (store, service) = service();

    service.get_all("athletes_race", None).await?;
    service.get_all("athletes_race", Some(1)).await?;

    let catalog_calls = store
        .calls()
        .iter()
        .filter(|(sql, _)| sql == TABLES_SQL)
        .count();
    assert_eq!(catalog_calls, 1);
    assert_eq!(store.data_queries().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_sessions_released_on_every_path() -> Result<()> {
    let (store, service) = service();

    // success
    let rows = service.get_all("athletes_race", None).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(store.open.load(Ordering::SeqCst), 0);

    // store error
    let err = service
        .get_by_filter("athletes_race", &[("race_edition", SqlValue::from("boom"))], None)
        .await
        .unwrap_err();
    assert!(err.is_query_execution());
    assert_eq!(store.open.load(Ordering::SeqCst), 0);

    // validation error after the allow-list is loaded
    service.get_all("nope", None).await.unwrap_err();
    assert_eq!(store.open.load(Ordering::SeqCst), 0);

    assert!(store.opened.load(Ordering::SeqCst) > 0);
    Ok(())
}

#[tokio::test]
async fn test_store_error_is_not_retried() -> Result<()> {
    let (store, service) = service();
    service.allow_list().await?;
    let before = store.calls().len();

    let err = service
        .get_by_filter("athletes_race", &[("race_edition", SqlValue::from("boom"))], None)
        .await
        .unwrap_err();

    match err {
        QueryError::QueryExecution { sqlstate, .. } => {
            assert_eq!(sqlstate.as_deref(), Some("40001"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.calls().len(), before + 1);
    Ok(())
}

#[tokio::test]
async fn test_composed_request_is_one_parameterized_query() -> Result<()> {
    let (store, service) = service();
    let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let end = chrono::NaiveDate::from_ymd_opt(2022, 12, 31)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let request = QueryRequest::new("athletes_race")
        .filter("race_edition", "UB515 2021")
        .date_range("race_date", start, end)
        .aggregate("race_edition", "id", AggregateFunction::Count)
        .limit(10);
    service.run(&request).await?;

    let queries = store.data_queries();
    assert_eq!(queries.len(), 1);
    let (sql, params) = &queries[0];
    assert_eq!(
        sql,
        r#"SELECT "race_edition", COUNT("id") AS aggregated_value FROM "athletes_race" WHERE "race_edition" = $1 AND "race_date" BETWEEN $2 AND $3 GROUP BY "race_edition" ORDER BY "race_edition" LIMIT $4"#
    );
    assert_eq!(
        params,
        &vec![
            SqlValue::Text("UB515 2021".into()),
            SqlValue::Date(start.date()),
            SqlValue::Date(end.date()),
            SqlValue::Int(10),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_default_limit_applies() -> Result<()> {
    let (store, service) = service();
    let service = service.with_default_limit(25);

    service.get_all("athletes_race", None).await?;
    let (_, params) = &store.data_queries()[0];
    assert_eq!(params, &vec![SqlValue::Int(25)]);
    Ok(())
}

#[tokio::test]
async fn test_only_caller_sql_takes_the_adhoc_path() -> Result<()> {
    let (store, service) = service();

    service.get_all_tables().await?;
    service.get_schema("athletes_race").await?;
    service.get_all("athletes_race", Some(5)).await?;
    assert!(store.adhoc.lock().unwrap().is_empty());

    let sql = "SELECT id FROM athletes_race WHERE race_edition = $1";
    let rows = service.execute(sql, &[SqlValue::from("UB515 2019")]).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(*store.adhoc.lock().unwrap(), vec![sql.to_string()]);
    assert_eq!(store.open.load(Ordering::SeqCst), 0);
    Ok(())
}
