use std::sync::Mutex;

use super::*;
use crate::cache::{Field, Record};
use crate::cond::expr;
use crate::stmt::{Map, delete, insert, insert_bulk, select, update};
use crate::writer::Dialect;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Exec(String, Vec<Value>),
    Query(String, Vec<Value>),
    Prepare(String, String),
    Batch(String, Vec<Vec<Value>>),
    Deallocate(String),
}

#[derive(Default)]
struct MockDriver {
    calls: Mutex<Vec<Call>>,
    rows: Vec<ValueRow>,
    failing: Vec<usize>,
}

impl MockDriver {
    fn with_rows(rows: Vec<ValueRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn failing(rows: &[usize]) -> Self {
        Self {
            failing: rows.to_vec(),
            ..Self::default()
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl Driver for MockDriver {
    type Row = ValueRow;
    type Statement = String;

    async fn exec(&self, sql: &str, args: &[Value]) -> SqlResult<u64> {
        self.record(Call::Exec(sql.to_string(), args.to_vec()));
        Ok(1)
    }

    async fn query(&self, sql: &str, args: &[Value]) -> SqlResult<Vec<ValueRow>> {
        self.record(Call::Query(sql.to_string(), args.to_vec()));
        Ok(self.rows.clone())
    }

    async fn prepare(&self, name: &str, sql: &str) -> SqlResult<String> {
        self.record(Call::Prepare(name.to_string(), sql.to_string()));
        Ok(name.to_string())
    }

    async fn send_batch(&self, batch: &Batch<'_, String>) -> SqlResult<Vec<SqlResult<u64>>> {
        self.record(Call::Batch(
            batch.statement.clone(),
            batch.entries.iter().map(|args| args.to_vec()).collect(),
        ));
        Ok((0..batch.len())
            .map(|i| {
                if self.failing.contains(&i) {
                    Err(SqlError::UniqueViolation(
                        "account_pkey: duplicate key value".to_string(),
                    ))
                } else {
                    Ok(1)
                }
            })
            .collect())
    }

    async fn deallocate(&self, name: String) -> SqlResult<()> {
        self.record(Call::Deallocate(name));
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct Account {
    id: i64,
    name: String,
}

impl Record for Account {
    const TABLE: Option<&'static str> = Some("account");
    const FIELDS: &'static [Field] = &[Field::new("id", None), Field::new("name", None)];

    fn visit_values(&self, f: &mut dyn FnMut(Value)) {
        f(Value::from(self.id));
        f(Value::from(self.name.as_str()));
    }
}

impl FromRow for Account {
    fn from_row<R: RowSource>(row: &R) -> SqlResult<Self> {
        Ok(Self {
            id: row.try_get_column("id")?,
            name: row.try_get_column("name")?,
        })
    }
}

fn account(id: i64, name: &str) -> Account {
    Account {
        id,
        name: name.to_string(),
    }
}

fn account_row(id: i64, name: &str) -> ValueRow {
    ValueRow::new().with("id", id).with("name", name)
}

#[tokio::test]
async fn exec_single_insert() {
    let driver = MockDriver::default();
    let executor = Executor::new(&driver);
    let a = account(1, "alice");

    let affected = executor.exec(&insert(&a)).await.unwrap();

    assert_eq!(affected, 1);
    assert_eq!(
        driver.calls(),
        vec![Call::Exec(
            "INSERT INTO account (id,name) VALUES ($1,$2)".to_string(),
            vec![Value::I64(1), Value::from("alice")],
        )]
    );
}

#[tokio::test]
async fn exec_update_and_delete() {
    let driver = MockDriver::default();
    let executor = Executor::new(&driver);

    let mut stmt = update("account");
    stmt.set("name", "bob").where_(expr("id = ??", [1_i64]));
    executor.exec(&stmt).await.unwrap();
    executor
        .exec(delete("account").where_(Map::new().with("id", 2_i64)))
        .await
        .unwrap();

    assert_eq!(
        driver.calls(),
        vec![
            Call::Exec(
                "UPDATE account SET name = $1 WHERE id = $2".to_string(),
                vec![Value::from("bob"), Value::I64(1)],
            ),
            Call::Exec(
                "DELETE FROM account WHERE id = $1".to_string(),
                vec![Value::I64(2)],
            ),
        ]
    );
}

#[tokio::test]
async fn exec_bulk_insert_uses_prepared_batch() {
    let driver = MockDriver::default();
    let executor = Executor::new(&driver);
    let accounts = vec![account(1, "a"), account(2, "b"), account(3, "c")];

    let affected = executor.exec(&insert_bulk(&accounts)).await.unwrap();
    assert_eq!(affected, 3);

    let template = "INSERT INTO account (id,name) VALUES ($1,$2)";
    let name = statement_name("sql_", template);
    assert_eq!(
        driver.calls(),
        vec![
            Call::Prepare(name.clone(), template.to_string()),
            Call::Batch(
                name.clone(),
                vec![
                    vec![Value::I64(1), Value::from("a")],
                    vec![Value::I64(2), Value::from("b")],
                    vec![Value::I64(3), Value::from("c")],
                ],
            ),
            Call::Deallocate(name),
        ]
    );
}

#[tokio::test]
async fn exec_bulk_insert_aggregates_row_failures() {
    let driver = MockDriver::failing(&[1]);
    let executor = Executor::new(&driver);
    let accounts = vec![account(1, "a"), account(1, "dup"), account(3, "c")];

    let err = executor.exec(&insert_bulk(&accounts)).await.unwrap_err();

    let report = match err {
        SqlError::Batch(report) => report,
        other => panic!("expected batch error, got {other:?}"),
    };
    assert_eq!(report.affected, 2);
    assert_eq!(report.failed_rows().collect::<Vec<_>>(), vec![1]);
    assert!(report.failures[0].error.is_unique_violation());

    // The statement is released even though the batch failed.
    assert!(matches!(driver.calls().last(), Some(Call::Deallocate(_))));
}

#[tokio::test]
async fn exec_bulk_insert_can_keep_statement() {
    let driver = MockDriver::default();
    let config = ExecConfig::new()
        .statement_prefix("bulk_")
        .keep_batch_statements();
    let executor = Executor::with_config(&driver, config);
    let accounts = [account(1, "a"), account(2, "b")];

    executor.exec(&insert_bulk(&accounts)).await.unwrap();

    let calls = driver.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], Call::Prepare(name, _) if name.starts_with("bulk_")));
    assert!(!calls.iter().any(|c| matches!(c, Call::Deallocate(_))));
}

#[tokio::test]
async fn exec_select_counts_rows() {
    let driver = MockDriver::with_rows(vec![account_row(1, "a"), account_row(2, "b")]);
    let executor = Executor::new(&driver);

    assert_eq!(executor.exec(&select("account")).await.unwrap(), 2);
}

#[tokio::test]
async fn structural_errors_do_not_reach_the_driver() {
    let driver = MockDriver::default();
    let executor = Executor::new(&driver);

    let err = executor
        .exec(select("account").limit_offset(-1, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, SqlError::InvalidLimitation));
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn fetch_all_and_one() {
    let driver = MockDriver::with_rows(vec![account_row(1, "alice"), account_row(2, "bob")]);
    let executor = Executor::new(&driver);
    let stmt = select(&account(0, ""));

    let all: Vec<Account> = executor.fetch_all(&stmt).await.unwrap();
    assert_eq!(all, vec![account(1, "alice"), account(2, "bob")]);

    let one: Account = executor.fetch_one(&stmt).await.unwrap();
    assert_eq!(one, account(1, "alice"));

    assert_eq!(
        driver.calls()[0],
        Call::Query("SELECT id,name FROM account".to_string(), vec![])
    );
}

#[tokio::test]
async fn fetch_one_without_rows() {
    let driver = MockDriver::default();
    let executor = Executor::new(&driver);

    let err = executor
        .fetch_one::<Account>(&select("account"))
        .await
        .unwrap_err();
    assert!(err.is_row_not_found());
}

#[tokio::test]
async fn fetch_maps_and_arrays() {
    let driver = MockDriver::with_rows(vec![account_row(7, "carol")]);
    let executor = Executor::new(&driver);
    let stmt = select("account");

    let maps = executor.fetch_maps(&stmt).await.unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0]["id"], Value::I64(7));
    assert_eq!(maps[0]["name"], Value::from("carol"));

    let arrays = executor.fetch_arrays(&stmt).await.unwrap();
    assert_eq!(arrays, vec![vec![Value::I64(7), Value::from("carol")]]);
}

#[tokio::test]
async fn fetch_decode_error_names_the_column() {
    let driver = MockDriver::with_rows(vec![ValueRow::new().with("id", "seven").with("name", "x")]);
    let executor = Executor::new(&driver);

    let err = executor
        .fetch_all::<Account>(&select("account"))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlError::Decode { ref column, .. } if column == "id"));
}

#[tokio::test]
async fn fetch_rejects_non_select() {
    let driver = MockDriver::default();
    let executor = Executor::new(&driver);

    let err = executor
        .fetch_maps(&delete("account"))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlError::NotSupportedType(_)));
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn transactions_use_default_statements() {
    let driver = MockDriver::default();
    let executor = Executor::new(&driver);

    executor.begin().await.unwrap();
    executor.commit().await.unwrap();
    executor.rollback().await.unwrap();

    let sql: Vec<_> = driver
        .calls()
        .into_iter()
        .map(|c| match c {
            Call::Exec(sql, _) => sql,
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(sql, vec!["BEGIN", "COMMIT", "ROLLBACK"]);
}

#[tokio::test]
async fn generic_dialect_config() {
    let driver = MockDriver::default();
    let executor = Executor::with_config(&driver, ExecConfig::new().dialect(Dialect::MySql));

    executor
        .exec(delete("account").where_(expr("id = ??", [1_i64])))
        .await
        .unwrap();
    assert_eq!(
        driver.calls(),
        vec![Call::Exec(
            "DELETE FROM account WHERE id = ?".to_string(),
            vec![Value::I64(1)],
        )]
    );
}

#[test]
fn statement_name_is_deterministic() {
    let a = statement_name("sql_", "INSERT INTO t (a) VALUES ($1)");
    let b = statement_name("sql_", "INSERT INTO t (a) VALUES ($1)");
    let c = statement_name("sql_", "INSERT INTO t (b) VALUES ($1)");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), "sql_".len() + 16);
}

#[test]
fn truncate_sql_respects_char_boundary() {
    assert_eq!(truncate_sql("SELECT 1", 100), "SELECT 1");
    assert_eq!(truncate_sql("SELECT 1", 6), "SELECT...");
    // 'é' is two bytes; cutting inside it steps back.
    assert_eq!(truncate_sql("abé", 3), "ab...");
}

#[test]
fn value_row_lookup() {
    let row = account_row(5, "dave");
    assert_eq!(row.len(), 2);
    assert_eq!(row.index_of("name"), Some(1));
    assert_eq!(row.index_of("missing"), None);
    assert!(row.try_get_column::<i64>("missing").is_err());
    assert_eq!(row.try_get_column::<Option<String>>("name").unwrap(), Some("dave".to_string()));
}
