use nvdb_harvest::loader::{self, ConflictPolicy, LoadError};
use nvdb_harvest::pipeline::{NAMESPACE, TARGET_TABLE};
use nvdb_harvest::report;
use nvdb_harvest::table::{self, FartsgrenseTable};
use nvdb_harvest::test_support::{TestDatabase, TestFixtures};
use serde_json::{Value, json};

fn objects(ids: std::ops::Range<i64>) -> Vec<Value> {
    ids.map(|id| {
        json!({
            "id": id,
            "lokasjon": {
                "vegsystemreferanser": [{ "vegsystem": { "vegkategori": "F" } }],
                "fylker": [50],
                "kommuner": [5001],
                "stedfestinger": [{ "veglenkesekvensid": id * 10 }]
            },
            "metadata": { "startdato": "2023-01-01", "sist_modifisert": "2024-02-03T04:05:06" },
            "geometri": { "wkt": "POINT(1 2)" },
            "egenskaper": [{ "navn": "Fartsgrense", "verdi": 60 }]
        })
    })
    .collect()
}

fn rows(ids: std::ops::Range<i64>) -> FartsgrenseTable {
    table::build(&objects(ids))
}

#[tokio::test]
async fn replace_leaves_exactly_the_supplied_rows() {
    let Some(test_db) = TestDatabase::start_or_skip().await else {
        return;
    };
    let pool = test_db.pool();
    let fixtures = TestFixtures::new(pool);

    let first = loader::load(pool, &rows(0..3), TARGET_TABLE, NAMESPACE, ConflictPolicy::Replace)
        .await
        .expect("first load");
    assert_eq!(first.rows_written, 3);

    let second = loader::load(pool, &rows(10..12), TARGET_TABLE, NAMESPACE, ConflictPolicy::Replace)
        .await
        .expect("second load");
    assert_eq!(second.rows_written, 2);

    let count = fixtures.count_rows(NAMESPACE, TARGET_TABLE).await.expect("count");
    assert_eq!(count, 2);

    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT nvdb_id FROM nvdb.vegobjekter_fartsgrense ORDER BY nvdb_id")
            .fetch_all(pool)
            .await
            .expect("ids");
    assert_eq!(ids, vec![10, 11]);

    test_db.close().await;
}

#[tokio::test]
async fn append_never_drops_existing_rows() {
    let Some(test_db) = TestDatabase::start_or_skip().await else {
        return;
    };
    let pool = test_db.pool();

    loader::load(pool, &rows(0..2), TARGET_TABLE, NAMESPACE, ConflictPolicy::Replace)
        .await
        .expect("initial load");
    loader::load(pool, &rows(2..5), TARGET_TABLE, NAMESPACE, ConflictPolicy::Append)
        .await
        .expect("append");
    loader::load(pool, &table::build(&[]), TARGET_TABLE, NAMESPACE, ConflictPolicy::Append)
        .await
        .expect("empty append");

    let count = TestFixtures::new(pool)
        .count_rows(NAMESPACE, TARGET_TABLE)
        .await
        .expect("count");
    assert_eq!(count, 5);

    test_db.close().await;
}

#[tokio::test]
async fn large_tables_are_written_in_batches() {
    let Some(test_db) = TestDatabase::start_or_skip().await else {
        return;
    };
    let pool = test_db.pool();

    let report = loader::load(
        pool,
        &rows(0..2500),
        TARGET_TABLE,
        NAMESPACE,
        ConflictPolicy::Replace,
    )
    .await
    .expect("load");
    assert_eq!(report.rows_written, 2500);
    assert_eq!(report.batches, 3);

    let count = TestFixtures::new(pool)
        .count_rows(NAMESPACE, TARGET_TABLE)
        .await
        .expect("count");
    assert_eq!(count, 2500);

    test_db.close().await;
}

#[tokio::test]
async fn append_to_missing_table_reports_context() {
    let Some(test_db) = TestDatabase::start_or_skip().await else {
        return;
    };

    let err = loader::load(
        test_db.pool(),
        &rows(0..1),
        "missing_table",
        NAMESPACE,
        ConflictPolicy::Append,
    )
    .await
    .expect_err("append to a missing table fails");
    match err {
        LoadError::Batch {
            namespace,
            table,
            rows_committed,
            ..
        } => {
            assert_eq!(namespace, NAMESPACE);
            assert_eq!(table, "missing_table");
            assert_eq!(rows_committed, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    test_db.close().await;
}

#[tokio::test]
async fn loaded_rows_read_back_unchanged() {
    let Some(test_db) = TestDatabase::start_or_skip().await else {
        return;
    };
    let pool = test_db.pool();

    let data = rows(7..8);
    loader::load(pool, &data, TARGET_TABLE, NAMESPACE, ConflictPolicy::Replace)
        .await
        .expect("load");

    let summary = report::check_table(pool, NAMESPACE, TARGET_TABLE)
        .await
        .expect("check");
    assert_eq!(summary.row_count, 1);
    assert_eq!(summary.sample, vec![data.row(0).expect("row")]);

    test_db.close().await;
}
