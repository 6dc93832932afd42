//! End-to-end builder tests across dialects: reads, writes, caching,
//! prefixes and error parking.

mod common;
use common::*;

use std::sync::Arc;

use oxide_db::builder::{JoinType, LikeSide, OrderDirection, QueryBuilder};
use oxide_db::dialect::{PostgresDialect, SqliteDialect};
use oxide_db::protect::Prefixes;
use oxide_db::{DbError, Row, Value};

#[test]
fn simple_select_without_quoting() {
    let mut qb = plain();
    qb.select("id,name").from("users").where_("age", 30);
    assert_eq!(
        qb.get_compiled_select("", true).unwrap(),
        "SELECT id, name\nFROM users\nWHERE age = 30"
    );
}

#[test]
fn not_suffix_compiles_to_inequality() {
    let mut qb = plain();
    qb.where_("status:not", "active");
    let sql = qb.get_compiled_select("accounts", true).unwrap();
    assert!(sql.contains("status != 'active'"), "{sql}");
}

#[test]
fn random_order_with_and_without_seed() {
    let mut qb = mysql();
    qb.order_by("score", OrderDirection::Random);
    assert!(qb
        .get_compiled_select("t", true)
        .unwrap()
        .ends_with("ORDER BY RAND()"));

    qb.order_by("7", OrderDirection::Random);
    assert!(qb
        .get_compiled_select("t", true)
        .unwrap()
        .ends_with("ORDER BY RAND(7)"));
}

#[test]
fn batch_update_of_150_rows_is_two_statements() {
    let rows: Vec<Row> = (0..150)
        .map(|i| Row::new().with("id", i).with("rank", 150 - i))
        .collect();
    let mut qb = mysql();
    qb.set_update_batch(&rows, "id").unwrap();
    assert_eq!(qb.compile_update_batch("players", 100).unwrap().len(), 2);
}

#[test]
fn full_select_on_postgres() {
    let mut qb = QueryBuilder::new(Arc::new(PostgresDialect::new()))
        .with_prefixes(Prefixes::new("app_", ""));
    qb.select("u.id, u.email")
        .select_raw("COUNT(o.id) AS orders")
        .from("users u")
        .join("orders o", "o.user_id = u.id", JoinType::Left)
        .where_("u.active", true)
        .like("u.email", "@example.com", LikeSide::Before)
        .group_by("u.id, u.email")
        .having("COUNT(o.id) >", 1)
        .order_by("orders", OrderDirection::Desc)
        .limit(10)
        .offset(30);
    assert_eq!(
        qb.get_compiled_select("", true).unwrap(),
        "SELECT \"u\".\"id\", \"u\".\"email\", COUNT(o.id) AS orders\n\
         FROM \"app_users\" \"u\"\n\
         LEFT JOIN \"app_orders\" \"o\" ON \"o\".\"user_id\" = \"u\".\"id\"\n\
         WHERE \"u\".\"active\" = TRUE\n\
         AND \"u\".\"email\" LIKE '%@example.com' ESCAPE '!'\n\
         GROUP BY \"u\".\"id\", \"u\".\"email\"\n\
         HAVING COUNT(o.id) > 1\n\
         ORDER BY \"orders\" DESC\n\
         LIMIT 10 OFFSET 30"
    );
}

#[test]
fn grouped_conditions_compile_and_reset() {
    let mut qb = mysql();
    qb.from("posts")
        .where_("published", 1)
        .group_start()
        .where_("author", "ann")
        .or_where("author", "bob")
        .group_end();
    assert_eq!(
        qb.get_compiled_select("", true).unwrap(),
        "SELECT *\nFROM `posts`\nWHERE `published` = 1\nAND   (\n`author` = 'ann'\nOR `author` = 'bob'\n )"
    );
    assert_eq!(qb.group_depth(), 0);
}

#[test]
fn unbalanced_groups_fail_compile() {
    let mut qb = mysql();
    qb.from("t").group_start().where_("a", 1);
    assert!(matches!(
        qb.get_compiled_select("", true),
        Err(DbError::UnbalancedGroup { depth: 1 })
    ));
}

#[test]
fn parked_error_is_cleared_by_compile() {
    let mut qb = mysql();
    qb.select_max("", None);
    assert!(matches!(
        qb.get_compiled_select("t", true),
        Err(DbError::InvalidQuery(_))
    ));
    assert_eq!(qb.get_compiled_select("t", true).unwrap(), "SELECT *\nFROM `t`");
}

#[test]
fn cached_clauses_survive_resets() {
    let mut qb = mysql();
    qb.start_cache()
        .select("id")
        .from("events")
        .where_("tenant", 4)
        .stop_cache();

    qb.where_("kind", "click");
    assert_eq!(
        qb.get_compiled_select("", true).unwrap(),
        "SELECT `id`\nFROM `events`\nWHERE `tenant` = 4\nAND `kind` = 'click'"
    );
    qb.where_("kind", "view");
    assert_eq!(
        qb.get_compiled_select("", true).unwrap(),
        "SELECT `id`\nFROM `events`\nWHERE `tenant` = 4\nAND `kind` = 'view'"
    );

    qb.flush_cache();
    qb.reset_query();
    assert_eq!(qb.get_compiled_select("x", true).unwrap(), "SELECT *\nFROM `x`");
}

#[test]
fn where_in_with_mixed_values() {
    let mut qb = mysql();
    qb.where_in(
        "code",
        vec![Value::Int(1), Value::Text(String::from("a'b")), Value::Null],
    );
    assert_eq!(
        qb.get_compiled_select("t", true).unwrap(),
        "SELECT *\nFROM `t`\nWHERE `code` IN(1, 'a\\'b', NULL)"
    );
}

#[test]
fn sqlite_insert_update_delete() {
    let mut qb = QueryBuilder::new(Arc::new(SqliteDialect::new()));
    qb.set_row(&Row::new().with("name", "it's").with("flag", false));
    assert_eq!(
        qb.get_compiled_insert("items", true).unwrap(),
        "INSERT INTO \"items\" (\"name\", \"flag\") VALUES ('it''s', 0)"
    );

    qb.set("flag", true).where_("id", 3);
    assert_eq!(
        qb.get_compiled_update("items", true).unwrap(),
        "UPDATE \"items\" SET \"flag\" = 1\nWHERE \"id\" = 3"
    );

    qb.where_("id <", 10);
    assert_eq!(
        qb.get_compiled_delete("items", true).unwrap(),
        "DELETE FROM \"items\"\nWHERE \"id\" < 10"
    );
}

#[test]
fn insert_batch_requires_matching_rows() {
    let mut qb = mysql();
    qb.set_insert_batch(&[
        Row::new().with("a", 1).with("b", 2),
        Row::new().with("a", 3),
    ]);
    assert!(matches!(
        qb.compile_insert_batch("t", 100),
        Err(DbError::InvalidBatchRow { row: 1 })
    ));
}
