use asupersync::runtime::RuntimeBuilder;
use sqlgate::prelude::*;
use sqlgate::{DriverErrorKind, SqliteDialect};
use sqlgate_core::error::{ConnectionError, ConnectionErrorKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

fn expect_err<T>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        Outcome::Ok(_) => panic!("expected an error"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[test]
fn factory_runs_once_and_hook_configures_the_connection() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let opened = Arc::new(AtomicUsize::new(0));
        let hooked = Arc::new(AtomicUsize::new(0));

        let opened_in_factory = Arc::clone(&opened);
        let hooked_in_hook = Arc::clone(&hooked);
        let config = DialectConfig::new(DatabaseSource::factory(move || {
            let opened = Arc::clone(&opened_in_factory);
            async move {
                opened.fetch_add(1, Ordering::SeqCst);
                SqliteDatabase::open_memory()
            }
        }))
        .on_create_connection(move |_cx, conn| {
            let hooked = Arc::clone(&hooked_in_hook);
            Box::pin(async move {
                hooked.fetch_add(1, Ordering::SeqCst);
                conn.execute_raw("PRAGMA foreign_keys = ON")
                    .map_or_else(Outcome::Err, Outcome::Ok)
            })
        });

        let driver = SqliteDialect::new(config).create_driver();
        assert_eq!(opened.load(Ordering::SeqCst), 0, "connection is established lazily");

        unwrap_outcome(driver.init(&cx).await);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(hooked.load(Ordering::SeqCst), 1);

        for _ in 0..3 {
            let conn = unwrap_outcome(driver.acquire_connection(&cx).await);
            let result = unwrap_outcome(
                conn.execute_query(&cx, &CompiledQuery::raw("PRAGMA foreign_keys"))
                    .await,
            );
            assert_eq!(result.rows[0].get(0).and_then(Value::as_i64), Some(1));
            unwrap_outcome(driver.release_connection().await);
        }
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        let again = expect_err(driver.init(&cx).await);
        assert_eq!(again.driver_kind(), Some(DriverErrorKind::AlreadyInitialized));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn factory_failure_leaves_driver_unusable() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let config = DialectConfig::new(DatabaseSource::factory(|| async {
            Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "disk unavailable".to_string(),
                source: None,
            }))
        }));
        let driver = SqliteDriver::new(config);

        let err = expect_err(driver.init(&cx).await);
        assert!(err.to_string().contains("disk unavailable"));
        assert!(!driver.is_ready());

        let err = expect_err(driver.acquire_connection(&cx).await);
        assert_eq!(err.driver_kind(), Some(DriverErrorKind::NotInitialized));

        // A failed driver cannot be initialized again.
        let err = expect_err(driver.init(&cx).await);
        assert_eq!(err.driver_kind(), Some(DriverErrorKind::AlreadyInitialized));
    });
}

#[test]
fn hook_failure_surfaces_from_init() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let config = DialectConfig::new(DatabaseSource::open(SqliteConfig::memory()))
            .on_create_connection(|_cx, conn| {
                Box::pin(async move {
                    conn.execute_raw("INSERT INTO missing_table VALUES (1)")
                        .map_or_else(Outcome::Err, Outcome::Ok)
                })
            });
        let driver = SqliteDriver::new(config);

        match expect_err(driver.init(&cx).await) {
            Error::Connection(e) => {
                assert_eq!(e.kind, ConnectionErrorKind::Hook);
                assert!(e.source.is_some());
            }
            other => panic!("expected hook error, got {other:?}"),
        }
        let err = expect_err(driver.acquire_connection(&cx).await);
        assert_eq!(err.driver_kind(), Some(DriverErrorKind::NotInitialized));
    });
}

#[test]
fn destroy_closes_the_live_connection() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let db = Arc::new(SqliteDatabase::open_memory().expect("open sqlite memory db"));
        let driver = SqliteDriver::new(DialectConfig::new(Arc::clone(&db)));
        unwrap_outcome(driver.init(&cx).await);

        let conn = unwrap_outcome(driver.acquire_connection(&cx).await);
        unwrap_outcome(driver.release_connection().await);

        unwrap_outcome(driver.destroy().await);
        assert!(db.is_closed());

        // A handle retained past release cannot reach the closed connection.
        let err = expect_err(conn.execute_query(&cx, &CompiledQuery::raw("SELECT 1")).await);
        assert!(err.is_closed());

        let err = expect_err(driver.acquire_connection(&cx).await);
        assert!(err.is_closed());
        unwrap_outcome(driver.destroy().await);
    });
}

#[test]
fn statement_errors_leave_the_connection_usable() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let driver = SqliteDriver::new(DialectConfig::new(
            SqliteDatabase::open_memory().expect("open sqlite memory db"),
        ));
        unwrap_outcome(driver.init(&cx).await);

        let conn = unwrap_outcome(driver.acquire_connection(&cx).await);
        let err = expect_err(conn.execute_query(&cx, &CompiledQuery::raw("SELEC 1")).await);
        assert_eq!(err.sql(), Some("SELEC 1"));
        unwrap_outcome(driver.release_connection().await);

        let conn = unwrap_outcome(driver.acquire_connection(&cx).await);
        let result = unwrap_outcome(
            conn.execute_query(&cx, &CompiledQuery::raw("SELECT 42 AS answer"))
                .await,
        );
        assert_eq!(result.rows[0].get_named::<i64>("answer").unwrap(), 42);
        assert_eq!(
            serde_json::Value::Object(result.rows[0].to_json()),
            serde_json::json!({ "answer": 42 })
        );
        unwrap_outcome(driver.release_connection().await);
    });
}
