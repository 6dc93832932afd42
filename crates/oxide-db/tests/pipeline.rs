//! Tests for the execution pipeline: lazy connect, failover, prefix swap,
//! bind substitution, the query log, failure handling, catalog caching and
//! the builder-driven helpers.

mod common;
use common::*;

use oxide_db::{AdapterRegistry, Connection, ConnectionConfig, DbError, QueryResult, Row, Value};

fn respond(state: &std::sync::Arc<std::sync::Mutex<MockState>>, fragment: &str, rows: Vec<Row>) {
    state
        .lock()
        .unwrap()
        .rows
        .push((String::from(fragment), rows));
}

#[test]
fn empty_statement_is_rejected() {
    let (mut db, state) = connect();
    assert!(matches!(db.query("   "), Err(DbError::EmptyStatement)));
    assert!(executed(&state).is_empty());
}

#[test]
fn first_query_connects_lazily() {
    let (mut db, state) = connect();
    assert!(!db.is_connected());
    db.query("SELECT 1").unwrap();
    assert!(db.is_connected());
    assert_eq!(state.lock().unwrap().connects, vec!["app"]);

    db.query("SELECT 2").unwrap();
    assert_eq!(state.lock().unwrap().connects.len(), 1);
}

#[test]
fn failover_is_walked_in_order() {
    let config = ConnectionConfig::new("mysql", "main")
        .with_failover(ConnectionConfig::new("", "replica1"))
        .with_failover(ConnectionConfig::new("", "replica2"));
    let (mut db, state) = connect_with(config);
    state.lock().unwrap().refuse = vec![String::from("main"), String::from("replica1")];

    db.initialize().unwrap();
    assert_eq!(db.config().database, "replica2");
    assert_eq!(db.config().driver, "mysql");
    assert_eq!(
        state.lock().unwrap().connects,
        vec!["main", "replica1", "replica2"]
    );
}

#[test]
fn exhausted_failover_is_fatal() {
    let config =
        ConnectionConfig::new("mysql", "main").with_failover(ConnectionConfig::new("", "replica"));
    let (mut db, state) = connect_with(config);
    state.lock().unwrap().refuse = vec![String::from("main"), String::from("replica")];
    assert!(matches!(
        db.initialize(),
        Err(DbError::ConnectionExhausted { attempts: 2 })
    ));
    assert!(db.error().is_some());
}

#[test]
fn refused_connect_without_failover() {
    let (mut db, state) = connect();
    state.lock().unwrap().refuse = vec![String::from("app")];
    match db.query("SELECT 1") {
        Err(DbError::Connect(info)) => assert_eq!(info.code, 2002),
        other => panic!("Expected connect error, got {other:?}"),
    }
}

#[test]
fn registry_selects_backend() {
    let mut registry = AdapterRegistry::new();
    registry.register("mock", || {
        let (backend, _) = MockBackend::new(std::sync::Arc::new(
            oxide_db::dialect::PostgresDialect::new(),
        ));
        Box::new(backend)
    });
    let db = Connection::open(ConnectionConfig::new("mock", "app"), &registry).unwrap();
    assert_eq!(db.platform(), "postgres");

    assert!(matches!(
        Connection::open(ConnectionConfig::new("oracle", "app"), &registry),
        Err(DbError::UnknownDriver(_))
    ));
}

#[test]
fn binds_are_escaped_and_substituted() {
    let (mut db, state) = connect();
    db.query_binds(
        "SELECT * FROM t WHERE a = ? AND b = ? AND c = '?'",
        &[Value::Int(1), Value::Text(String::from("it's"))],
    )
    .unwrap();
    assert_eq!(
        executed(&state),
        vec!["SELECT * FROM t WHERE a = 1 AND b = 'it\\'s' AND c = '?'"]
    );
}

#[test]
fn bind_count_mismatch_leaves_statement_unchanged() {
    let (mut db, state) = connect();
    db.query_binds("SELECT * FROM t WHERE a = ?", &[Value::Int(1), Value::Int(2)])
        .unwrap();
    assert_eq!(executed(&state), vec!["SELECT * FROM t WHERE a = ?"]);
}

#[test]
fn custom_bind_marker() {
    let mut config = ConnectionConfig::new("mysql", "app");
    config.bind_marker = Some(String::from(":v"));
    let (mut db, state) = connect_with(config);
    db.query_binds("SELECT :v", &[Value::Int(9)]).unwrap();
    assert_eq!(executed(&state), vec!["SELECT 9"]);
}

#[test]
fn swap_prefix_is_rewritten() {
    let (mut db, state) =
        connect_with(ConnectionConfig::new("mysql", "app").with_prefix("app_", "pre_"));
    db.query("SELECT * FROM pre_users JOIN pre_roles ON 1").unwrap();
    assert_eq!(
        executed(&state),
        vec!["SELECT * FROM app_users JOIN app_roles ON 1"]
    );
}

#[test]
fn query_log_is_kept() {
    let (mut db, _state) = connect();
    db.query("SELECT 1").unwrap();
    db.query("SELECT 2").unwrap();
    assert_eq!(db.queries(), ["SELECT 1", "SELECT 2"]);
    assert_eq!(db.query_times().len(), 2);
    assert_eq!(db.total_queries(), 2);
    assert_eq!(db.last_query(), Some("SELECT 2"));

    db.save_queries(false);
    db.query("SELECT 3").unwrap();
    assert_eq!(db.queries().len(), 2);
    assert_eq!(db.last_query(), Some("SELECT 3"));
    assert_eq!(db.total_queries(), 3);
}

#[test]
fn read_returns_cursor_and_write_returns_done() {
    let (mut db, state) = connect();
    respond(
        &state,
        "FROM users",
        vec![Row::new().with("id", 1), Row::new().with("id", 2)],
    );
    let cursor = db.query("SELECT id FROM users").unwrap().into_cursor().unwrap();
    assert_eq!(cursor.count(), 2);
    assert_eq!(cursor.field_names().unwrap(), vec!["id"]);

    assert!(matches!(
        db.query("UPDATE users SET id = 3").unwrap(),
        QueryResult::Done
    ));
    let empty = db.query("SELECT 1").unwrap().into_cursor().unwrap();
    assert!(empty.is_empty());
}

#[test]
fn failure_without_debug_returns_failed_result() {
    let (mut db, state) = connect();
    state.lock().unwrap().fail_containing = vec![String::from("bogus")];
    let result = db.query("SELECT bogus").unwrap();
    assert!(!result.is_success());
    assert_eq!(result.error().unwrap().code, 1064);
    assert_eq!(db.error().unwrap().message, "syntax error");
    assert_eq!(db.total_queries(), 0);
}

#[test]
fn failure_with_debug_unwinds_transactions() {
    let (mut db, state) = connect_with(ConnectionConfig::new("mysql", "app").with_debug(true));
    state.lock().unwrap().fail_containing = vec![String::from("bogus")];
    db.trans_start(false);
    db.trans_start(false);
    match db.query("INSERT bogus") {
        Err(DbError::Execute { info, sql }) => {
            assert_eq!(info.code, 1064);
            assert_eq!(sql, "INSERT bogus");
        }
        other => panic!("Expected execute error, got {other:?}"),
    }
    assert_eq!(db.trans_depth(), 0);
    assert_eq!(
        executed(&state),
        vec!["START TRANSACTION", "INSERT bogus", "ROLLBACK"]
    );
}

#[test]
fn close_is_idempotent() {
    let (mut db, state) = connect();
    db.initialize().unwrap();
    db.close();
    db.close();
    assert!(!db.is_connected());
    assert_eq!(state.lock().unwrap().closes, 1);

    db.reconnect().unwrap();
    assert!(db.is_connected());
}

#[test]
fn insert_id_unsupported_by_mock() {
    let (db, _state) = connect();
    assert!(matches!(db.insert_id(), Err(DbError::UnsupportedFeature(_))));
}

#[test]
fn list_tables_is_cached_and_filtered() {
    let (mut db, state) = connect_with(ConnectionConfig::new("mysql", "app").with_prefix("app_", ""));
    respond(
        &state,
        "SHOW TABLES",
        vec![
            Row::new().with("Tables_in_app", "app_users"),
            Row::new().with("Tables_in_app", "legacy"),
        ],
    );
    assert_eq!(db.list_tables(false).unwrap(), vec!["app_users", "legacy"]);
    assert_eq!(db.list_tables(true).unwrap(), vec!["app_users"]);
    assert!(db.table_exists("users").unwrap());
    assert!(!db.table_exists("legacy").unwrap());
    assert_eq!(executed(&state), vec!["SHOW TABLES FROM `app`"]);
}

#[test]
fn list_fields_is_cached_per_table() {
    let (mut db, state) = connect();
    respond(
        &state,
        "SHOW COLUMNS",
        vec![
            Row::new().with("Field", "id").with("Type", "int"),
            Row::new().with("Field", "email").with("Type", "varchar(255)"),
        ],
    );
    assert_eq!(db.list_fields("users").unwrap(), vec!["id", "email"]);
    assert!(db.field_exists("email", "users").unwrap());
    assert!(!db.field_exists("name", "users").unwrap());
    assert_eq!(executed(&state), vec!["SHOW COLUMNS FROM `users`"]);
}

#[test]
fn version_is_cached() {
    let (mut db, state) = connect();
    respond(&state, "VERSION()", vec![Row::new().with("ver", "8.0.36")]);
    assert_eq!(db.version().unwrap(), "8.0.36");
    assert_eq!(db.version().unwrap(), "8.0.36");
    assert_eq!(executed(&state).len(), 1);
}

#[test]
fn get_runs_and_resets_builder() {
    let (mut db, state) = connect();
    db.builder().select("id").where_("active", 1).limit(5);
    db.get("users").unwrap();
    db.get_where("users", &Row::new().with("id", 7)).unwrap();
    assert_eq!(
        executed(&state),
        vec![
            "SELECT `id`\nFROM `users`\nWHERE `active` = 1\nLIMIT 5",
            "SELECT *\nFROM `users`\nWHERE `id` = 7",
        ]
    );
}

#[test]
fn count_helpers_read_numrows() {
    let (mut db, state) = connect();
    respond(&state, "COUNT(*)", vec![Row::new().with("numrows", 12)]);
    assert_eq!(db.count_all("users").unwrap(), 12);
    assert_eq!(db.count_all("").unwrap(), 0);

    db.builder().where_("active", 1);
    assert_eq!(db.count_all_results("users", true).unwrap(), 12);
    assert_eq!(
        executed(&state),
        vec![
            "SELECT COUNT(*) AS `numrows` FROM `users`",
            "SELECT COUNT(*) AS `numrows`\nFROM `users`\nWHERE `active` = 1",
        ]
    );
}

#[test]
fn write_helpers() {
    let (mut db, state) = connect();
    db.builder().set("name", "a");
    db.insert("users").unwrap();
    db.builder().set("name", "b").where_("id", 1);
    db.update("users").unwrap();
    db.builder().where_("id", 1);
    db.delete("users").unwrap();
    db.empty_table("users").unwrap();
    db.truncate("users").unwrap();
    db.builder().set("id", 1);
    db.replace("users").unwrap();
    assert_eq!(
        executed(&state),
        vec![
            "INSERT INTO `users` (`name`) VALUES ('a')",
            "UPDATE `users` SET `name` = 'b'\nWHERE `id` = 1",
            "DELETE FROM `users`\nWHERE `id` = 1",
            "DELETE FROM `users`",
            "TRUNCATE `users`",
            "REPLACE INTO `users` (`id`) VALUES (1)",
        ]
    );
}

#[test]
fn delete_without_where_is_refused() {
    let (mut db, state) = connect();
    assert!(matches!(db.delete("users"), Err(DbError::DeleteWithoutWhere)));
    assert!(executed(&state).is_empty());
}

#[test]
fn insert_batch_chunks_and_sums_affected_rows() {
    let (mut db, state) = connect();
    state.lock().unwrap().affected = 4;
    let rows: Vec<Row> = (0..150).map(|i| Row::new().with("id", i)).collect();
    assert_eq!(db.insert_batch("t", &rows).unwrap(), 8);
    assert_eq!(executed(&state).len(), 2);
}

#[test]
fn update_batch_issues_one_statement_per_chunk() {
    let (mut db, state) = connect();
    let rows: Vec<Row> = (0..150)
        .map(|i| Row::new().with("id", i).with("score", i * 10))
        .collect();
    db.update_batch("t", &rows, "id").unwrap();
    let statements = executed(&state);
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("UPDATE `t` SET `score` = CASE `id`\nWHEN 0 THEN 0\n"));
}

#[test]
fn update_batch_rejects_missing_key() {
    let (mut db, state) = connect();
    let rows = vec![Row::new().with("id", 1).with("a", 1), Row::new().with("a", 2)];
    assert!(matches!(
        db.update_batch("t", &rows, "id"),
        Err(DbError::MissingBatchKey { row: 1, .. })
    ));
    assert!(matches!(
        db.update_batch("t", &rows, ""),
        Err(DbError::MissingMatchKey)
    ));
    assert!(executed(&state).is_empty());
}

#[test]
fn string_helpers_leave_builder_alone() {
    let (mut db, _state) = connect();
    db.builder().where_("keep", 1);
    let data = Row::new().with("name", "x");
    assert_eq!(
        db.insert_string("users", &data).unwrap(),
        "INSERT INTO `users` (`name`) VALUES ('x')"
    );
    assert_eq!(
        db.update_string("users", &data, &Row::new().with("id", 3)).unwrap(),
        "UPDATE `users` SET `name` = 'x'\nWHERE `id` = 3"
    );
    assert_eq!(
        db.builder().get_compiled_select("t", true).unwrap(),
        "SELECT *\nFROM `t`\nWHERE `keep` = 1"
    );
}

#[test]
fn prefix_helpers() {
    let (mut db, _state) = connect_with(ConnectionConfig::new("mysql", "app").with_prefix("a_", ""));
    assert_eq!(db.dbprefix("users"), "a_users");
    assert_eq!(db.set_dbprefix("b_"), "b_");
    assert_eq!(
        db.builder().get_compiled_select("users", true).unwrap(),
        "SELECT *\nFROM `b_users`"
    );
}

#[test]
fn escape_helpers() {
    let (db, _state) = connect();
    assert_eq!(db.escape("it's"), "'it\\'s'");
    assert_eq!(db.escape(Option::<i64>::None), "NULL");
    assert_eq!(db.escape_like_str("50%_off"), "50!%!_off");
}
