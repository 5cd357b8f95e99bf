use super::*;
use crate::options::{BulkInsertOptions, DropOptions, RawSelectOptions};
use crate::testing::MockConnection;
use asupersync::runtime::RuntimeBuilder;
use ormkit_core::{AttributeDef, AttributeMap, DataType, SchemaErrorKind};
use ormkit_query::Expr;
use ormkit_schema::CreateTableOptions;

fn run<F: Future>(f: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(f)
}

fn users_registry() -> Arc<ModelRegistry> {
    let mut registry = ModelRegistry::new();
    registry
        .define(
            ModelDef::new("User")
                .attribute(
                    AttributeDef::new("id", DataType::Integer)
                        .primary_key()
                        .auto_increment(),
                )
                .attribute(AttributeDef::new("name", DataType::String(255)))
                .attribute(AttributeDef::new("email", DataType::String(255)).unique()),
        )
        .expect("define User");
    Arc::new(registry)
}

fn table_info(columns: &[(&str, &str, bool)]) -> Vec<Row> {
    columns
        .iter()
        .enumerate()
        .map(|(cid, (name, sql_type, pk))| {
            Row::from_pairs([
                ("cid", Value::BigInt(cid as i64)),
                ("name", Value::Text((*name).into())),
                ("type", Value::Text((*sql_type).into())),
                ("notnull", Value::BigInt(i64::from(*pk))),
                ("dflt_value", Value::Null),
                ("pk", Value::BigInt(i64::from(*pk))),
            ])
        })
        .collect()
}

#[test]
fn statement_kinds_from_text() {
    assert!(statement_returns_rows("  select 1"));
    assert!(statement_returns_rows("PRAGMA TABLE_INFO(\"users\");"));
    assert!(statement_returns_rows(
        "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING *;"
    ));
    assert!(!statement_returns_rows("DELETE FROM \"users\";"));
    assert!(!statement_returns_rows("BEGIN DEFERRED TRANSACTION;"));
}

#[test]
fn configured_dialect_must_match_connection() {
    let conn = MockConnection::new(Dialect::Sqlite);
    let config = InterfaceConfig {
        dialect: Some(Dialect::Postgres),
        ..InterfaceConfig::default()
    };
    let err = QueryInterface::with_config(conn, config).expect_err("dialect mismatch");
    assert!(err.is_config_error());
}

#[test]
fn configured_schema_qualifies_bare_tables() {
    let conn = MockConnection::new(Dialect::Postgres);
    let interface = QueryInterface::with_config(conn, InterfaceConfig::default().schema("app"))
        .expect("interface");
    assert_eq!(interface.quote_table("users"), "\"app\".\"users\"");
    assert_eq!(
        interface.quote_table(TableRef::with_schema("audit", "log")),
        "\"audit\".\"log\""
    );
}

#[test]
fn postgres_create_table_adds_missing_enum_labels_first() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        conn.respond(
            "pg_type",
            vec![Row::from_pairs([
                ("enum_name", Value::Text("enum_posts_status".into())),
                ("enum_value", Value::Text("{a,c}".into())),
            ])],
        );
        let interface = QueryInterface::new(conn.clone());
        let attributes: AttributeMap = [
            AttributeDef::new("id", DataType::Integer).primary_key(),
            AttributeDef::new("status", DataType::enumeration(["a", "b", "c"])),
        ]
        .into_iter()
        .collect();

        let outcome = interface
            .create_table(&cx, "posts", &attributes, &CreateTableOptions::default())
            .await;
        assert!(matches!(outcome, Outcome::Ok(())));

        let statements = conn.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("t.typname='enum_posts_status'"));
        assert!(statements[1].contains("ADD VALUE IF NOT EXISTS 'b' BEFORE 'c'"));
        assert!(statements[2].starts_with("CREATE TABLE"));
    });
}

#[test]
fn postgres_create_table_creates_unknown_enum_type() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        let interface = QueryInterface::new(conn.clone());
        let attributes: AttributeMap = [AttributeDef::new(
            "status",
            DataType::enumeration(["draft", "live"]),
        )]
        .into_iter()
        .collect();

        let outcome = interface
            .create_table(&cx, "posts", &attributes, &CreateTableOptions::default())
            .await;
        assert!(matches!(outcome, Outcome::Ok(())));

        let statements = conn.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[1].starts_with("CREATE TYPE"));
        assert!(statements[1].contains("'draft', 'live'"));
        assert!(statements[2].starts_with("CREATE TABLE"));
    });
}

#[test]
fn enum_without_values_is_rejected_before_any_sql() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        let interface = QueryInterface::new(conn.clone());
        let attributes: AttributeMap = [AttributeDef::new("status", DataType::Enum(Vec::new()))]
            .into_iter()
            .collect();

        let outcome = interface
            .create_table(&cx, "posts", &attributes, &CreateTableOptions::default())
            .await;
        assert!(matches!(outcome, Outcome::Err(Error::Validation(_))));
        assert!(conn.statements().is_empty());
    });
}

#[test]
fn describe_of_missing_table_is_a_schema_error() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        let interface = QueryInterface::new(conn);

        match interface.describe_table(&cx, "ghosts").await {
            Outcome::Err(Error::Schema(err)) => {
                assert_eq!(err.kind, SchemaErrorKind::TableNotFound);
                assert!(err.message.contains("No description found for \"ghosts\" table"));
            }
            _ => panic!("expected a schema error"),
        }
    });
}

#[test]
fn sqlite_describe_merges_foreign_keys() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.respond(
            "TABLE_INFO",
            table_info(&[("id", "INTEGER", true), ("userId", "INTEGER", false)]),
        );
        conn.respond(
            "foreign_key_list",
            vec![Row::from_pairs([
                ("table", Value::Text("users".into())),
                ("from", Value::Text("userId".into())),
                ("to", Value::Text("id".into())),
                ("on_update", Value::Text("CASCADE".into())),
                ("on_delete", Value::Text("SET NULL".into())),
            ])],
        );
        let interface = QueryInterface::new(conn);

        let Outcome::Ok(columns) = interface.describe_table(&cx, "posts").await else {
            panic!("expected a description");
        };
        assert_eq!(columns.len(), 2);
        assert!(columns[0].primary_key);
        let references = columns[1].references.as_ref().expect("reference");
        assert_eq!(references.model, "users");
        assert_eq!(columns[1].on_delete.as_deref(), Some("SET NULL"));
    });
}

#[test]
fn sqlite_drop_all_tables_toggles_foreign_keys() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.respond(
            "sqlite_master",
            vec![
                Row::from_pairs([("name", "users")]),
                Row::from_pairs([("name", "posts")]),
                Row::from_pairs([("name", "keep")]),
            ],
        );
        conn.respond(
            "PRAGMA foreign_keys;",
            vec![Row::from_pairs([("foreign_keys", 1_i64)])],
        );
        let interface = QueryInterface::new(conn.clone());

        let outcome = interface.drop_all_tables(&cx, &["keep"]).await;
        assert!(matches!(outcome, Outcome::Ok(())));

        let statements = conn.statements();
        assert_eq!(
            &statements[1..],
            &[
                "PRAGMA foreign_keys;".to_string(),
                "PRAGMA foreign_keys = OFF;".to_string(),
                "DROP TABLE IF EXISTS \"users\";".to_string(),
                "DROP TABLE IF EXISTS \"posts\";".to_string(),
                "PRAGMA foreign_keys = ON;".to_string(),
            ]
        );
    });
}

#[test]
fn postgres_drop_all_tables_drops_foreign_keys_first() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        conn.respond(
            "information_schema.tables",
            vec![Row::from_pairs([("table_name", "posts")])],
        );
        conn.respond(
            "pg_constraint",
            vec![Row::from_pairs([("constraint_name", "posts_userId_fkey")])],
        );
        let interface = QueryInterface::new(conn.clone());

        let outcome = interface.drop_all_tables(&cx, &[]).await;
        assert!(matches!(outcome, Outcome::Ok(())));

        let statements = conn.statements();
        let drop_fk = statements
            .iter()
            .position(|s| s.contains("DROP CONSTRAINT \"posts_userId_fkey\""))
            .expect("foreign key dropped");
        let drop_table = statements
            .iter()
            .position(|s| s.starts_with("DROP TABLE"))
            .expect("table dropped");
        assert!(drop_fk < drop_table);
        assert!(statements[drop_table].contains("CASCADE"));
    });
}

#[test]
fn sqlite_remove_column_rebuilds_the_table() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.respond(
            "TABLE_INFO",
            table_info(&[("id", "INTEGER", true), ("name", "VARCHAR(255)", false)]),
        );
        let interface = QueryInterface::new(conn.clone());

        let outcome = interface.remove_column(&cx, "users", "name").await;
        assert!(matches!(outcome, Outcome::Ok(())));

        let statements = conn.statements();
        assert!(statements.iter().all(|s| !s.contains("DROP COLUMN")));
        assert!(statements.iter().any(|s| s.starts_with("CREATE TABLE \"users_ormkit_rebuild\"")));
        assert!(statements.iter().any(|s| s == "DROP TABLE \"users\";"));
    });
}

#[test]
fn foreign_keys_for_no_tables_is_empty() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Mysql);
        let interface = QueryInterface::new(conn.clone());
        let Outcome::Ok(map) = interface.get_foreign_keys_for_tables(&cx, &[]).await else {
            panic!("expected an empty map");
        };
        assert!(map.is_empty());
        assert!(conn.statements().is_empty());
    });
}

#[test]
fn unsupported_trigger_is_a_no_op() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        let interface = QueryInterface::new(conn.clone());
        let outcome = interface.drop_trigger(&cx, "users", "audit").await;
        assert!(matches!(outcome, Outcome::Ok(())));
        assert!(conn.statements().is_empty());
    });
}

#[test]
fn version_and_table_listing() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.respond(
            "sqlite_version",
            vec![Row::from_pairs([("version", "3.45.1")])],
        );
        conn.respond("sqlite_master", vec![Row::from_pairs([("name", "users")])]);
        let interface = QueryInterface::new(conn);

        assert!(matches!(
            interface.database_version(&cx).await,
            Outcome::Ok(ref v) if v == "3.45.1"
        ));
        assert!(matches!(
            interface.show_all_tables(&cx).await,
            Outcome::Ok(ref names) if *names == vec!["users".to_string()]
        ));
    });
}

#[test]
fn drop_table_uses_cascade_when_forced() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        let interface = QueryInterface::new(conn.clone());
        let options = DropOptions {
            cascade: false,
            force: true,
        };
        assert!(matches!(
            interface.drop_table(&cx, "users", options).await,
            Outcome::Ok(())
        ));
        assert!(conn.statements()[0].ends_with("CASCADE;"));
    });
}

#[test]
fn insert_with_instance_reads_returned_row() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.respond(
            "INSERT INTO",
            vec![Row::from_pairs([
                ("id", Value::BigInt(7)),
                ("name", Value::Text("ada".into())),
            ])],
        );
        let interface = QueryInterface::new(conn.clone()).with_registry(users_registry());
        let mut user = Instance::new("User").with("name", "ada");
        let values = AttributeValues::from([("name".to_string(), Value::from("ada"))]);

        let outcome = interface
            .insert(&cx, Some(&mut user), "users", &values, &QueryOptions::new())
            .await;
        assert!(matches!(outcome, Outcome::Ok(QueryResult::Instance(_))));
        assert_eq!(user.get("id"), Some(&Value::BigInt(7)));
        assert!(!user.is_new_record());
        assert!(conn.statements()[0].ends_with("RETURNING *;"));
    });
}

#[test]
fn mysql_insert_takes_the_generated_id() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Mysql);
        conn.state.lock().expect("lock poisoned").insert_id = 42;
        let interface = QueryInterface::new(conn.clone()).with_registry(users_registry());
        let mut user = Instance::new("User").with("name", "ada");
        let values = AttributeValues::from([("name".to_string(), Value::from("ada"))]);

        let outcome = interface
            .insert(&cx, Some(&mut user), "users", &values, &QueryOptions::new())
            .await;
        assert!(matches!(outcome, Outcome::Ok(_)));
        assert_eq!(user.get("id"), Some(&Value::BigInt(42)));
        assert!(!conn.statements()[0].contains("RETURNING"));
    });
}

#[test]
fn empty_bulk_insert_sends_nothing() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        let interface = QueryInterface::new(conn.clone());
        let outcome = interface
            .bulk_insert(&cx, "users", Vec::new(), &BulkInsertOptions::default())
            .await;
        assert!(matches!(outcome, Outcome::Ok(QueryResult::Affected(0))));
        assert!(conn.statements().is_empty());
    });
}

#[test]
fn sqlite_upsert_reports_update_of_existing_row() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.respond("SELECT 1", vec![Row::from_pairs([("1", 1_i64)])]);
        let registry = users_registry();
        let interface = QueryInterface::new(conn.clone()).with_registry(registry.clone());
        let model = registry.get("User").expect("User");
        let insert = AttributeValues::from([
            ("id".to_string(), Value::BigInt(1)),
            ("name".to_string(), Value::from("ada")),
        ]);
        let update = AttributeValues::from([("name".to_string(), Value::from("ada"))]);

        let outcome = interface
            .upsert(&cx, "users", insert, update, model, &QueryOptions::new())
            .await;
        assert!(matches!(outcome, Outcome::Ok(false)));

        let statements = conn.statements();
        assert!(statements[0].starts_with("SELECT 1 FROM \"users\""));
        assert!(statements[1].contains("ON CONFLICT(\"id\") DO UPDATE"));
    });
}

#[test]
fn upsert_keys_include_covered_unique_columns() {
    let registry = users_registry();
    let model = registry.get("User").expect("User");
    let values = AttributeValues::from([
        ("email".to_string(), Value::from("a@b.c")),
        ("name".to_string(), Value::from("ada")),
    ]);
    assert_eq!(
        super::dml::conflict_keys(model, &values),
        vec![vec!["email".to_string()]]
    );
}

#[test]
fn upsert_without_keys_is_a_plain_insert() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Mysql);
        let registry = users_registry();
        let interface = QueryInterface::new(conn.clone()).with_registry(registry.clone());
        let model = registry.get("User").expect("User");
        let insert = AttributeValues::from([("name".to_string(), Value::from("ada"))]);

        let outcome = interface
            .upsert(&cx, "users", insert, AttributeValues::new(), model, &QueryOptions::new())
            .await;
        assert!(matches!(outcome, Outcome::Ok(true)));
        assert!(!conn.statements()[0].contains("ON DUPLICATE KEY"));
    });
}

#[test]
fn update_without_values_sends_nothing() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        let interface = QueryInterface::new(conn.clone());
        let outcome = interface
            .update(
                &cx,
                None,
                "users",
                &AttributeValues::new(),
                Expr::col("id").eq(1_i64),
                &QueryOptions::new(),
            )
            .await;
        assert!(matches!(outcome, Outcome::Ok(QueryResult::Affected(0))));
        assert!(conn.statements().is_empty());
    });
}

#[test]
fn bulk_update_maps_attributes_to_columns() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Postgres);
        conn.state.lock().expect("lock poisoned").affected = 3;
        let mut registry = ModelRegistry::new();
        registry
            .define(
                ModelDef::new("User")
                    .attribute(AttributeDef::new("firstName", DataType::Text).field("first_name")),
            )
            .expect("define User");
        let interface = QueryInterface::new(conn.clone()).with_registry(Arc::new(registry));
        let values = AttributeValues::from([("firstName".to_string(), Value::from("ada"))]);

        let outcome = interface
            .bulk_update(&cx, "Users", &values, Expr::all([]), &QueryOptions::new())
            .await;
        assert!(matches!(outcome, Outcome::Ok(3)));
        assert!(conn.statements()[0].contains("\"first_name\" = $1"));
    });
}

#[test]
fn delete_with_instance_targets_its_identity() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        let interface = QueryInterface::new(conn.clone()).with_registry(users_registry());
        let user = Instance::new("User").with("id", 5_i64).with("name", "ada");

        let outcome = interface
            .delete(&cx, Some(&user), "users", Expr::all([]), &QueryOptions::new())
            .await;
        assert!(matches!(outcome, Outcome::Ok(1)));
        assert!(conn.statements()[0].contains("LIMIT 1"));
        assert_eq!(conn.params(0), vec![Value::BigInt(5)]);
    });
}

#[test]
fn raw_select_requires_a_selector() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        let interface = QueryInterface::new(conn.clone());
        let outcome = interface
            .raw_select(&cx, "users", None, None, &RawSelectOptions::default())
            .await;
        match outcome {
            Outcome::Err(err) => {
                assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingAttributeSelector));
            }
            _ => panic!("expected a config error"),
        }
        assert!(conn.statements().is_empty());
    });
}

#[test]
fn raw_select_coerces_to_requested_type() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.respond("count(*)", vec![Row::from_pairs([("count(*)", "3")])]);
        let interface = QueryInterface::new(conn);
        let options = RawSelectOptions {
            data_type: Some(DataType::Integer),
            ..RawSelectOptions::default()
        };
        let outcome = interface
            .raw_select(&cx, "users", Some("count(*)"), None, &options)
            .await;
        assert!(matches!(outcome, Outcome::Ok(Some(Value::BigInt(3)))));
    });
}

#[test]
fn foreign_transaction_handle_is_rejected_before_sql() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        let interface = QueryInterface::new(conn.clone());
        let other = QueryInterface::new(MockConnection::new(Dialect::Sqlite));
        let foreign = other.new_transaction(TransactionOptions::default());

        let options = QueryOptions::new().transaction(Some(foreign));
        let outcome = interface
            .bulk_delete(&cx, "users", Expr::all([]), &options)
            .await;
        assert!(matches!(outcome, Outcome::Err(ref e) if e.is_config_error()));
        assert!(conn.statements().is_empty());
    });
}

#[test]
fn transaction_rolls_back_on_failure() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        conn.fail_on("DELETE");
        let interface = QueryInterface::new(conn.clone());

        let outcome = interface
            .transaction(&cx, TransactionOptions::default(), |tx| {
                let options = QueryOptions::new().transaction(Some(tx));
                let interface = &interface;
                let cx = &cx;
                async move {
                    interface
                        .bulk_delete(cx, "users", Expr::all([]), &options)
                        .await
                }
            })
            .await;
        assert!(matches!(outcome, Outcome::Err(Error::Database(_))));

        let statements = conn.statements();
        assert_eq!(statements.first().map(String::as_str), Some("BEGIN DEFERRED TRANSACTION;"));
        assert_eq!(statements.last().map(String::as_str), Some("ROLLBACK;"));
        assert!(!interface.transaction_state().in_transaction());
    });
}

#[test]
fn transaction_commits_on_success() {
    run(async {
        let cx = Cx::for_testing();
        let conn = MockConnection::new(Dialect::Sqlite);
        let interface = QueryInterface::new(conn.clone());

        let outcome = interface
            .transaction(&cx, TransactionOptions::default(), |_tx| async {
                Outcome::Ok(7_u64)
            })
            .await;
        assert!(matches!(outcome, Outcome::Ok(7)));
        assert_eq!(
            conn.statements(),
            vec![
                "BEGIN DEFERRED TRANSACTION;".to_string(),
                "COMMIT;".to_string()
            ]
        );
    });
}
