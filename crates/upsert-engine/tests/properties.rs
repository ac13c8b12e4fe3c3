//! Engine-wide guarantees: shape discovery, null binding, exact decimals,
//! insert/update exclusivity.

mod common;

use common::{records, users_metadata};
use upsert_engine::testing::MockConnection;
use upsert_engine::{
    BindValue, ColumnDefinition, Dialect, KeyGroup, Outcome, Record, SqlType, TableMetadata,
    TableRef, UpsertConfig, UpsertEngine,
};

async fn run(dialect: Dialect, metadata: TableMetadata, input: Vec<Record>) -> (MockConnection, Vec<Outcome>) {
    let mut engine = UpsertEngine::new(MockConnection::new(dialect), metadata, UpsertConfig::default());
    let mut outcomes = Vec::new();
    engine.run(input, &mut outcomes).await.unwrap();
    (engine.into_connection(), outcomes)
}

fn all_types_metadata() -> TableMetadata {
    let mut columns = vec![ColumnDefinition::new("id", SqlType::Long)];
    columns.extend(
        SqlType::ALL
            .iter()
            .map(|ty| ColumnDefinition::new(format!("c_{}", ty.tag().to_lowercase()), *ty)),
    );
    TableMetadata::new(
        TableRef::new(None, "all_types"),
        columns,
        KeyGroup::primary(vec!["id".to_string()]),
        vec![],
    )
    .unwrap()
}

#[tokio::test]
async fn test_null_binds_typed_null_for_every_type() {
    let mut first = serde_json::Map::new();
    first.insert("id".to_string(), serde_json::json!(1));
    for ty in SqlType::ALL {
        first.insert(
            format!("c_{}", ty.tag().to_lowercase()),
            serde_json::Value::Null,
        );
    }
    let input = vec![
        Record::from_json_str(&serde_json::Value::Object(first).to_string()),
        // Absent fields bind the same way as explicit nulls
        Record::from_json_str(r#"{"id": 2}"#),
    ];

    for dialect in [Dialect::PostgreSql, Dialect::MySql, Dialect::Ansi] {
        let (conn, outcomes) = run(dialect, all_types_metadata(), input.clone()).await;
        assert!(outcomes.iter().all(Outcome::is_success), "{dialect}");
        assert_eq!(conn.executed.len(), 2);
        for statement in &conn.executed {
            let nulls: Vec<BindValue> = SqlType::ALL.iter().map(|ty| BindValue::Null(*ty)).collect();
            assert_eq!(statement.params[1..], nulls[..], "{dialect}");
        }
    }
}

#[tokio::test]
async fn test_shape_discovery_skips_unusable_records() {
    let valid = r#"{"id": 5, "name": "x"}"#;
    let (valid_first, _) = run(Dialect::PostgreSql, users_metadata(), records(&[valid])).await;
    let (invalid_first, outcomes) = run(
        Dialect::PostgreSql,
        users_metadata(),
        records(&[r#"{"unknown": 1}"#, "", valid]),
    )
    .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].status_code, 400);
    assert_eq!(outcomes[1].status_code, 400);
    assert!(outcomes[2].is_success());
    assert_eq!(valid_first.executed_sql(), invalid_first.executed_sql());
}

#[tokio::test]
async fn test_shape_ignores_field_order() {
    let (a, _) = run(
        Dialect::MySql,
        users_metadata(),
        records(&[r#"{"id": 5, "name": "x", "price": 1}"#]),
    )
    .await;
    let (b, _) = run(
        Dialect::MySql,
        users_metadata(),
        records(&[r#"{"price": 1, "name": "x", "id": 5}"#]),
    )
    .await;
    assert_eq!(a.executed, b.executed);
}

#[tokio::test]
async fn test_price_beyond_64_bits_is_bound_exactly() {
    let huge = "123456789012345678901234567890.123456789";
    let input = format!(r#"{{"id": 1, "price": {huge}}}"#);
    let (conn, outcomes) = run(Dialect::PostgreSql, users_metadata(), records(&[&input])).await;

    assert!(outcomes[0].is_success());
    match &conn.executed[0].params[1] {
        BindValue::Decimal(d) => assert_eq!(d.to_string(), huge),
        other => panic!("expected an exact decimal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_exactly_one_of_insert_or_update() {
    for exists in [false, true] {
        let conn = MockConnection::new(Dialect::PostgreSql).with_probe(move |_, _| exists);
        let mut engine = UpsertEngine::new(conn, users_metadata(), UpsertConfig::default());
        let mut outcomes: Vec<Outcome> = Vec::new();
        engine
            .run(
                records(&[
                    r#"{"id": 1, "name": "a"}"#,
                    r#"{"id": 2, "email": "b@c", "name": "b"}"#,
                ]),
                &mut outcomes,
            )
            .await
            .unwrap();

        let sql = engine.connection().executed_sql();
        assert_eq!(sql.len(), 2);
        let prefix = if exists { "UPDATE" } else { "INSERT" };
        assert!(sql.iter().all(|s| s.starts_with(prefix)), "{sql:?}");
    }
}

#[tokio::test]
async fn test_table_without_key_always_inserts() {
    let metadata = TableMetadata::new(
        TableRef::new(None, "events"),
        vec![
            ColumnDefinition::new("kind", SqlType::String),
            ColumnDefinition::new("payload", SqlType::Json),
        ],
        KeyGroup::primary(vec![]),
        vec![],
    )
    .unwrap();
    let conn = MockConnection::new(Dialect::PostgreSql).with_probe(|_, _| true);
    let mut engine = UpsertEngine::new(conn, metadata, UpsertConfig::default());
    let mut outcomes: Vec<Outcome> = Vec::new();
    engine
        .run(
            records(&[r#"{"kind": "click", "payload": {"x": 1}}"#]),
            &mut outcomes,
        )
        .await
        .unwrap();

    let conn = engine.connection();
    assert!(conn.probes.is_empty());
    assert_eq!(
        conn.executed_sql(),
        vec![r#"INSERT INTO "events" ("kind", "payload") VALUES ($1, $2)"#]
    );
    assert_eq!(
        conn.executed[0].params[1],
        BindValue::Json(serde_json::json!({"x": 1}))
    );
}

#[tokio::test]
async fn test_absent_key_value_skips_probe() {
    // No key value at all: treated as no conflict, the row is inserted
    let conn = MockConnection::new(Dialect::PostgreSql).with_probe(|_, _| true);
    let mut engine = UpsertEngine::new(conn, users_metadata(), UpsertConfig::default());
    let mut outcomes: Vec<Outcome> = Vec::new();
    engine
        .run(records(&[r#"{"id": null, "name": "anon"}"#]), &mut outcomes)
        .await
        .unwrap();

    let conn = engine.connection();
    assert!(conn.probes.is_empty());
    assert_eq!(
        conn.executed_sql(),
        vec![r#"INSERT INTO "public"."users" ("id", "name") VALUES ($1, $2)"#]
    );
}
