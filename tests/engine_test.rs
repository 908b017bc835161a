//! Tests for engines, connections and transaction scopes
//! Run with: cargo test --test engine_test

use sqlite_runner::{param_set, text, Engine, EngineConfig, Error, ParamSet, Result, Row, Statement};
use tempfile::TempDir;

// ========== TEST FIXTURES ==========

fn memory_engine() -> Engine {
    Engine::from_url("sqlite://").unwrap()
}

/// Engine over a database file in a fresh temporary directory
fn file_engine() -> (Engine, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runner.db");
    let engine = Engine::from_url(&format!("sqlite:///{}", path.display())).unwrap();
    (engine, dir)
}

fn insert() -> Statement {
    text("INSERT INTO some_table (x, y) VALUES (:x, :y)")
}

fn create_table(engine: &Engine) {
    let mut conn = engine.connect().unwrap();
    conn.execute(&text("CREATE TABLE some_table (x int, y int)"))
        .unwrap();
    conn.commit().unwrap();
}

fn points(pairs: &[(i64, i64)]) -> Vec<ParamSet> {
    pairs
        .iter()
        .map(|(x, y)| param_set! { "x" => *x, "y" => *y })
        .collect()
}

fn all_points(engine: &Engine) -> Vec<(i64, i64)> {
    let mut conn = engine.connect().unwrap();
    conn.execute(&text("SELECT x, y FROM some_table ORDER BY x, y"))
        .unwrap()
        .tuples()
        .unwrap()
}

mod explicit_commit_tests {
    use super::*;

    #[test]
    fn test_committed_batch_is_read_back_in_order() {
        let engine = memory_engine();
        create_table(&engine);

        let mut conn = engine.connect().unwrap();
        let summary = conn
            .execute_batch(&insert(), &points(&[(9, 10), (1, 1), (6, 8), (2, 4)]))
            .unwrap();
        assert_eq!(summary.changes, 4);
        conn.commit().unwrap();
        drop(conn);

        assert_eq!(
            all_points(&engine),
            vec![(1, 1), (2, 4), (6, 8), (9, 10)]
        );
    }

    #[test]
    fn test_uncommitted_work_is_discarded_on_release() {
        let engine = memory_engine();
        create_table(&engine);

        {
            let mut conn = engine.connect().unwrap();
            conn.execute_batch(&insert(), &points(&[(1, 1), (2, 4)]))
                .unwrap();
            assert!(conn.in_transaction());
        }

        assert!(all_points(&engine).is_empty());
    }

    #[test]
    fn test_uncommitted_ddl_is_discarded_on_release() {
        let engine = memory_engine();
        {
            let mut conn = engine.connect().unwrap();
            conn.execute(&text("CREATE TABLE scratch (a int)")).unwrap();
            assert!(conn.has_table("scratch").unwrap());
        }

        let conn = engine.connect().unwrap();
        assert!(!conn.has_table("scratch").unwrap());
    }

    #[test]
    fn test_commit_twice_is_a_no_op() {
        let engine = memory_engine();
        create_table(&engine);

        let mut conn = engine.connect().unwrap();
        conn.execute_with(&insert(), &param_set! { "x" => 1, "y" => 1 })
            .unwrap();
        conn.commit().unwrap();
        assert!(!conn.in_transaction());
        conn.commit().unwrap();
        drop(conn);

        assert_eq!(all_points(&engine), vec![(1, 1)]);
    }

    #[test]
    fn test_commit_without_statements_is_a_no_op() {
        let engine = memory_engine();
        let mut conn = engine.connect().unwrap();
        conn.commit().unwrap();
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_explicit_rollback_discards_pending_work() {
        let engine = memory_engine();
        create_table(&engine);

        let mut conn = engine.connect().unwrap();
        conn.execute_with(&insert(), &param_set! { "x" => 1, "y" => 1 })
            .unwrap();
        conn.rollback().unwrap();
        conn.execute_with(&insert(), &param_set! { "x" => 2, "y" => 4 })
            .unwrap();
        conn.commit().unwrap();
        drop(conn);

        assert_eq!(all_points(&engine), vec![(2, 4)]);
    }

    #[test]
    fn test_insert_reports_changes_and_rowid() {
        let engine = memory_engine();
        create_table(&engine);

        let mut conn = engine.connect().unwrap();
        let result = conn
            .execute_with(&insert(), &param_set! { "x" => 1, "y" => 1 })
            .unwrap();
        assert!(!result.returns_rows());
        assert_eq!(result.rows_affected(), 1);
        assert_eq!(result.last_insert_rowid(), 1);
        assert_eq!(result.count(), 0);
    }

    #[test]
    fn test_exec_script_runs_every_statement() {
        let engine = memory_engine();
        let mut conn = engine.connect().unwrap();
        conn.exec_script(
            "CREATE TABLE a (id INTEGER PRIMARY KEY);
             CREATE TABLE b (id INTEGER PRIMARY KEY);
             INSERT INTO a (id) VALUES (1);",
        )
        .unwrap();
        conn.commit().unwrap();

        assert_eq!(conn.table_names().unwrap(), vec!["a", "b"]);
    }
}

mod auto_transaction_tests {
    use super::*;

    #[test]
    fn test_scope_commits_on_success() {
        let engine = memory_engine();
        create_table(&engine);

        let inserted = engine
            .begin(|conn| -> Result<usize> {
                let summary = conn.execute_batch(&insert(), &points(&[(6, 8), (9, 10)]))?;
                Ok(summary.changes)
            })
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(all_points(&engine), vec![(6, 8), (9, 10)]);
    }

    #[test]
    fn test_failed_statement_rolls_back_whole_scope() {
        let engine = memory_engine();
        create_table(&engine);

        let result: Result<()> = engine.begin(|conn| {
            conn.execute_batch(&insert(), &points(&[(1, 1), (2, 4)]))?;
            conn.execute(&text("INSERT INTO missing_table (x) VALUES (1)"))?;
            Ok(())
        });

        let err = result.unwrap_err();
        assert!(err.is_statement(), "unexpected error: {}", err);
        assert!(all_points(&engine).is_empty());
    }

    #[test]
    fn test_constraint_violation_rolls_back_and_propagates() {
        let engine = memory_engine();
        {
            let mut conn = engine.connect().unwrap();
            conn.execute(&text("CREATE TABLE uniq (x int PRIMARY KEY, y int)"))
                .unwrap();
            conn.commit().unwrap();
        }

        let stmt = text("INSERT INTO uniq (x, y) VALUES (:x, :y)");
        let result: Result<()> = engine.begin(|conn| {
            conn.execute_batch(&stmt, &points(&[(1, 1), (2, 2), (1, 3)]))?;
            Ok(())
        });

        assert!(result.unwrap_err().is_constraint());
        let mut conn = engine.connect().unwrap();
        let count: Option<i64> = conn
            .execute(&text("SELECT COUNT(*) FROM uniq"))
            .unwrap()
            .scalar()
            .unwrap();
        assert_eq!(count, Some(0));
    }

    #[test]
    fn test_caller_error_type_is_preserved() {
        #[derive(Debug)]
        enum AppError {
            Db(Error),
            Rejected(&'static str),
        }

        impl From<Error> for AppError {
            fn from(err: Error) -> Self {
                AppError::Db(err)
            }
        }

        let engine = memory_engine();
        create_table(&engine);

        let result: std::result::Result<(), AppError> = engine.begin(|conn| {
            conn.execute_with(&insert(), &param_set! { "x" => 1, "y" => 1 })?;
            Err(AppError::Rejected("no thanks"))
        });

        assert!(matches!(result, Err(AppError::Rejected("no thanks"))));
        assert!(all_points(&engine).is_empty());

        let result: std::result::Result<(), AppError> = engine.begin(|conn| {
            conn.execute(&text("SELEC 1"))?;
            Ok(())
        });
        assert!(matches!(result, Err(AppError::Db(Error::Statement { .. }))));
    }

    #[test]
    fn test_panic_in_scope_rolls_back() {
        let engine = memory_engine();
        create_table(&engine);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = engine.begin(|conn| {
                conn.execute_with(&insert(), &param_set! { "x" => 1, "y" => 1 })?;
                panic!("boom");
            });
        }));

        assert!(outcome.is_err());
        assert!(all_points(&engine).is_empty());
    }

    #[test]
    fn test_nested_transaction_is_rejected() {
        let engine = memory_engine();
        create_table(&engine);

        let mut conn = engine.connect().unwrap();
        conn.execute_with(&insert(), &param_set! { "x" => 1, "y" => 1 })
            .unwrap();

        let result: Result<()> = conn.transaction(|_| Ok(()));
        assert!(result.unwrap_err().is_statement());
        assert!(conn.in_transaction());
    }

    #[test]
    fn test_transaction_on_open_connection() {
        let engine = memory_engine();
        create_table(&engine);

        let mut conn = engine.connect().unwrap();
        conn.transaction(|tx| -> Result<()> {
            tx.execute_with(&insert(), &param_set! { "x" => 3, "y" => 3 })?;
            Ok(())
        })
        .unwrap();
        assert!(!conn.in_transaction());
        drop(conn);

        assert_eq!(all_points(&engine), vec![(3, 3)]);
    }
}

mod savepoint_tests {
    use super::*;

    #[test]
    fn test_failed_savepoint_only_undoes_its_own_work() {
        let engine = memory_engine();
        create_table(&engine);

        let mut conn = engine.connect().unwrap();
        conn.execute_with(&insert(), &param_set! { "x" => 1, "y" => 1 })
            .unwrap();

        let failed: Result<()> = conn.savepoint(|sp| {
            sp.execute_with(&insert(), &param_set! { "x" => 2, "y" => 2 })?;
            Err(Error::statement("abandon"))
        });
        assert!(failed.is_err());

        conn.savepoint(|sp| -> Result<()> {
            sp.execute_with(&insert(), &param_set! { "x" => 3, "y" => 3 })?;
            Ok(())
        })
        .unwrap();

        assert!(conn.in_transaction());
        conn.commit().unwrap();
        drop(conn);

        assert_eq!(all_points(&engine), vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn test_savepoint_begins_outer_transaction() {
        let engine = memory_engine();
        create_table(&engine);

        {
            let mut conn = engine.connect().unwrap();
            conn.savepoint(|sp| -> Result<()> {
                sp.execute_with(&insert(), &param_set! { "x" => 5, "y" => 5 })?;
                Ok(())
            })
            .unwrap();
            assert!(conn.in_transaction());
        }

        // released without commit
        assert!(all_points(&engine).is_empty());
    }
}

mod connection_scope_tests {
    use super::*;

    #[test]
    fn test_memory_engine_lends_one_connection_at_a_time() {
        let engine = memory_engine();
        let first = engine.connect().unwrap();

        let second = engine.connect();
        assert!(second.unwrap_err().is_connection());

        drop(first);
        assert!(engine.connect().is_ok());
    }

    #[test]
    fn test_file_engine_isolates_uncommitted_work() {
        let (engine, _dir) = file_engine();
        create_table(&engine);

        let mut writer = engine.connect().unwrap();
        let mut reader = engine.connect().unwrap();

        writer
            .execute_batch(&insert(), &points(&[(1, 1), (2, 4)]))
            .unwrap();

        let before: Vec<Row> = reader
            .execute(&text("SELECT x, y FROM some_table"))
            .unwrap()
            .all();
        assert!(before.is_empty());
        reader.rollback().unwrap();

        writer.commit().unwrap();

        let after: Vec<(i64, i64)> = reader
            .execute(&text("SELECT x, y FROM some_table ORDER BY x, y"))
            .unwrap()
            .tuples()
            .unwrap();
        assert_eq!(after, vec![(1, 1), (2, 4)]);
    }

    #[test]
    fn test_file_engine_persists_across_engines() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:///{}", dir.path().join("persist.db").display());

        {
            let engine = Engine::from_url(&url).unwrap();
            create_table(&engine);
            engine
                .begin(|conn| -> Result<()> {
                    conn.execute_batch(&insert(), &points(&[(6, 8)]))?;
                    Ok(())
                })
                .unwrap();
        }

        let engine = Engine::from_url(&url).unwrap();
        assert_eq!(all_points(&engine), vec![(6, 8)]);
    }

    #[test]
    fn test_immediate_transaction_mode() {
        let (engine, _dir) = file_engine();
        create_table(&engine);

        engine
            .begin_with(sqlite_runner::TransactionMode::Immediate, |conn| -> Result<()> {
                assert!(conn.in_transaction());
                conn.execute_with(&insert(), &param_set! { "x" => 4, "y" => 4 })?;
                Ok(())
            })
            .unwrap();

        assert_eq!(all_points(&engine), vec![(4, 4)]);
    }

    #[test]
    fn test_wal_journal_mode_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            EngineConfig::from_url(format!("sqlite:///{}", dir.path().join("wal.db").display()));
        config.journal_mode = Some("wal".to_string());
        let engine = Engine::new(config).unwrap();

        let mut conn = engine.connect().unwrap();
        let mode: Option<String> = conn
            .execute(&text("PRAGMA journal_mode"))
            .unwrap()
            .scalar()
            .unwrap();
        assert_eq!(mode.as_deref(), Some("wal"));
    }

    #[test]
    fn test_unopenable_file_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("x.db");
        let engine = Engine::from_url(&format!("sqlite:///{}", path.display())).unwrap();

        assert!(engine.connect().unwrap_err().is_connection());
    }
}

mod session_tests {
    use super::*;

    fn seeded_engine() -> Engine {
        let engine = memory_engine();
        create_table(&engine);
        engine
            .begin(|conn| -> Result<()> {
                conn.execute_batch(&insert(), &points(&[(1, 1), (2, 4), (6, 8), (9, 10)]))?;
                Ok(())
            })
            .unwrap();
        engine
    }

    #[test]
    fn test_parameterized_filter() {
        let engine = seeded_engine();
        let mut conn = engine.connect().unwrap();

        let rows: Vec<(i64, i64)> = conn
            .execute_with(
                &text("SELECT x, y FROM some_table WHERE y > :y ORDER BY x, y"),
                &param_set! { "y" => 2 },
            )
            .unwrap()
            .tuples()
            .unwrap();

        assert_eq!(rows, vec![(2, 4), (6, 8), (9, 10)]);
    }

    #[test]
    fn test_prebound_statement_matches_across_pathways() {
        let engine = seeded_engine();
        let stmt = text("SELECT x, y FROM some_table WHERE y > :y ORDER BY x, y")
            .bind("y", 6)
            .unwrap();

        let via_connection: Vec<Row> = {
            let mut conn = engine.connect().unwrap();
            conn.execute(&stmt).unwrap().all()
        };

        let mut session = engine.session();
        let via_session: Vec<Row> = session.execute(&stmt).unwrap().all();
        session.close().unwrap();

        assert_eq!(via_connection.len(), 2);
        assert_eq!(via_connection, via_session);
    }

    #[test]
    fn test_session_commit_releases_connection() {
        let engine = seeded_engine();

        let mut session = engine.session();
        assert!(!session.is_active());
        session
            .execute_with(&insert(), &param_set! { "x" => 20, "y" => 20 })
            .unwrap();
        assert!(session.is_active());
        assert!(session.in_transaction());

        session.commit().unwrap();
        assert!(!session.is_active());

        // the in-memory connection is free again
        let mut conn = engine.connect().unwrap();
        let count: Option<i64> = conn
            .execute(&text("SELECT COUNT(*) FROM some_table"))
            .unwrap()
            .scalar()
            .unwrap();
        assert_eq!(count, Some(5));
    }

    #[test]
    fn test_session_drop_discards_uncommitted_work() {
        let engine = seeded_engine();
        {
            let mut session = engine.session();
            session
                .execute_batch(&insert(), &points(&[(30, 30), (31, 31)]))
                .unwrap();
        }

        assert_eq!(all_points(&engine).len(), 4);
    }

    #[test]
    fn test_session_rollback() {
        let engine = seeded_engine();
        let mut session = engine.session();
        session
            .execute_with(&insert(), &param_set! { "x" => 40, "y" => 40 })
            .unwrap();
        session.rollback().unwrap();
        session.commit().unwrap();
        drop(session);

        assert_eq!(all_points(&engine).len(), 4);
    }
}
