use asupersync::runtime::RuntimeBuilder;

use ormkit::prelude::*;
use ormkit::{RawSelectOptions, SqliteConnection, TransactionOptions, try_outcome};

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

fn run<F: Future>(f: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(f)
}

fn user_model() -> ModelDef {
    let mut model = ModelDef::new("User")
        .table_name("users")
        .attribute(
            AttributeDef::new("id", DataType::Integer)
                .primary_key()
                .auto_increment(),
        )
        .attribute(AttributeDef::new("name", DataType::Text))
        .attribute(AttributeDef::new("email", DataType::String(120)).unique())
        .attribute(AttributeDef::new("visits", DataType::Integer).default_value(0i64));
    model.refresh();
    model
}

fn row(pairs: &[(&str, Value)]) -> AttributeValues {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

async fn users(cx: &Cx) -> QueryInterface<SqliteConnection> {
    let interface = ormkit::open_sqlite(InterfaceConfig::default()).expect("open sqlite");
    let model = user_model();
    unwrap_outcome(
        interface
            .create_model_table(cx, &model, &CreateTableOptions::default())
            .await,
    );
    for (name, email) in [("ada", "ada@example.com"), ("brian", "brian@example.com")] {
        unwrap_outcome(
            interface
                .insert(
                    cx,
                    None,
                    "users",
                    &row(&[("name", name.into()), ("email", email.into())]),
                    &QueryOptions::new(),
                )
                .await,
        );
    }
    interface
}

async fn count(interface: &QueryInterface<SqliteConnection>, cx: &Cx) -> i64 {
    let options = RawSelectOptions {
        data_type: Some(DataType::Integer),
        ..RawSelectOptions::default()
    };
    unwrap_outcome(
        interface
            .raw_select(cx, "users", Some("count(*)"), None, &options)
            .await,
    )
    .and_then(|v| v.as_i64())
    .expect("count")
}

#[test]
fn column_changes_keep_the_rows() {
    run(async {
        let cx = Cx::for_testing();
        let interface = users(&cx).await;

        unwrap_outcome(interface.rename_column(&cx, "users", "name", "full_name").await);
        let columns = unwrap_outcome(interface.describe_table(&cx, "users").await);
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "full_name", "email", "visits"]);

        let name = unwrap_outcome(
            interface
                .raw_select(
                    &cx,
                    "users",
                    Some("full_name"),
                    Some(Expr::col("id").eq(1_i64)),
                    &RawSelectOptions::default(),
                )
                .await,
        );
        assert_eq!(name, Some(Value::Text("ada".into())));

        unwrap_outcome(interface.remove_column(&cx, "users", "visits").await);
        let columns = unwrap_outcome(interface.describe_table(&cx, "users").await);
        assert_eq!(columns.len(), 3);
        assert_eq!(count(&interface, &cx).await, 2);
    });
}

#[test]
fn upsert_inserts_then_updates_on_the_unique_key() {
    run(async {
        let cx = Cx::for_testing();
        let interface = users(&cx).await;
        let model = user_model();

        let inserted = unwrap_outcome(
            interface
                .upsert(
                    &cx,
                    "users",
                    row(&[("name", "cleo".into()), ("email", "cleo@example.com".into())]),
                    row(&[("name", "cleo".into())]),
                    &model,
                    &QueryOptions::new(),
                )
                .await,
        );
        assert!(inserted);

        let inserted = unwrap_outcome(
            interface
                .upsert(
                    &cx,
                    "users",
                    row(&[("name", "Cleo".into()), ("email", "cleo@example.com".into())]),
                    row(&[("name", "Cleo".into())]),
                    &model,
                    &QueryOptions::new(),
                )
                .await,
        );
        assert!(!inserted);
        assert_eq!(count(&interface, &cx).await, 3);

        let name = unwrap_outcome(
            interface
                .raw_select(
                    &cx,
                    "users",
                    Some("name"),
                    Some(Expr::col("email").eq("cleo@example.com")),
                    &RawSelectOptions::default(),
                )
                .await,
        );
        assert_eq!(name, Some(Value::Text("Cleo".into())));
    });
}

#[test]
fn increment_adds_to_matching_rows() {
    run(async {
        let cx = Cx::for_testing();
        let interface = users(&cx).await;

        for _ in 0..2 {
            unwrap_outcome(
                interface
                    .increment(
                        &cx,
                        None,
                        "users",
                        &row(&[("visits", Value::BigInt(3))]),
                        AttributeValues::new(),
                        Expr::col("name").eq("ada"),
                        &QueryOptions::new(),
                    )
                    .await,
            );
        }
        let options = RawSelectOptions {
            data_type: Some(DataType::Integer),
            ..RawSelectOptions::default()
        };
        let visits = unwrap_outcome(
            interface
                .raw_select(&cx, "users", Some("visits"), Some(Expr::col("name").eq("ada")), &options)
                .await,
        );
        assert_eq!(visits, Some(Value::BigInt(6)));
    });
}

#[test]
fn failed_transaction_body_rolls_back() {
    run(async {
        let cx = Cx::for_testing();
        let interface = users(&cx).await;
        let iface = &interface;
        let cx_ref = &cx;

        let outcome: Outcome<(), Error> = interface
            .transaction(&cx, TransactionOptions::default(), move |tx| async move {
                try_outcome!(
                    iface
                        .insert(
                            cx_ref,
                            None,
                            "users",
                            &row(&[("name", "dora".into()), ("email", "dora@example.com".into())]),
                            &QueryOptions::new().transaction(Some(tx)),
                        )
                        .await
                );
                Outcome::Err(Error::Custom("abort".into()))
            })
            .await;
        assert!(matches!(outcome, Outcome::Err(Error::Custom(_))));
        assert_eq!(count(&interface, &cx).await, 2);

        let committed: Outcome<(), Error> = interface
            .transaction(&cx, TransactionOptions::default(), move |tx| async move {
                try_outcome!(
                    iface
                        .insert(
                            cx_ref,
                            None,
                            "users",
                            &row(&[("name", "eve".into()), ("email", "eve@example.com".into())]),
                            &QueryOptions::new().transaction(Some(tx)),
                        )
                        .await
                );
                Outcome::Ok(())
            })
            .await;
        assert!(matches!(committed, Outcome::Ok(())));
        assert_eq!(count(&interface, &cx).await, 3);
    });
}
