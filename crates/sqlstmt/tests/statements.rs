use chrono::{NaiveDate, NaiveDateTime};
use sqlstmt::{
    ColumnCache, Data, Dialect, FromRow, Map, Record, SqlError, Value, ValueRow, Writer, and,
    delete, expr, insert, or, select, update,
};

#[derive(Debug, Clone, PartialEq, Record, FromRow)]
#[orm(table = "student")]
struct Student {
    uid: i64,
    username: String,
    nickname: String,
    email: String,
    create_time: NaiveDateTime,
    update_time: NaiveDateTime,
}

#[derive(Debug, Record)]
struct Tagged {
    #[orm(column = "user_id")]
    uid: i64,
    #[orm(column = "")]
    name: String,
    note: Option<String>,
}

const COLS: &str = "uid,username,nickname,email,create_time,update_time";

fn created() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .unwrap()
}

fn alice() -> Student {
    Student {
        uid: 100,
        username: "Alice".to_string(),
        nickname: "Ali".to_string(),
        email: "ali@gmail.com".to_string(),
        create_time: created(),
        update_time: created(),
    }
}

fn render(stmt: &sqlstmt::Stmt, dialect: Dialect) -> Result<(String, Vec<Value>), SqlError> {
    let mut w = Writer::acquire();
    let (sql, args) = stmt.build(&mut w, dialect)?;
    Ok((sql.to_string(), args.to_vec()))
}

#[test]
fn derived_record_metadata() {
    assert_eq!(Student::TABLE, Some("student"));
    let columns: Vec<_> = Student::FIELDS.iter().map(|f| f.column_name()).collect();
    assert_eq!(columns.join(","), COLS);

    // Empty tags fall back to the field name.
    assert_eq!(Tagged::TABLE, None);
    let columns: Vec<_> = Tagged::FIELDS.iter().map(|f| f.column_name()).collect();
    assert_eq!(columns, vec!["user_id", "name", "note"]);
}

#[test]
fn insert_record() {
    let stu = alice();
    let (sql, args) = render(&insert(&stu), Dialect::Generic).unwrap();

    assert_eq!(sql, format!("INSERT INTO student ({COLS}) VALUES (?,?,?,?,?,?)"));
    assert_eq!(
        args,
        vec![
            Value::I64(100),
            Value::from("Alice"),
            Value::from("Ali"),
            Value::from("ali@gmail.com"),
            Value::Timestamp(created()),
            Value::Timestamp(created()),
        ]
    );
}

#[test]
fn delete_with_two_conditions() {
    let mut stmt = delete("student");
    stmt.where_([expr("uid = ??", [100_i64]), expr("username = ??", ["Alice"])]);

    let (sql, args) = render(&stmt, Dialect::Generic).unwrap();
    assert_eq!(sql, "DELETE FROM student WHERE (uid = ?) AND (username = ?)");
    assert_eq!(args, vec![Value::I64(100), Value::from("Alice")]);
}

#[test]
fn select_record_with_map_and_limit() {
    let stu = alice();
    let mut stmt = select(&stu);
    stmt.where_(Map::new().with("uid", 100_i64)).limit(10);

    let (sql, args) = render(&stmt, Dialect::Generic).unwrap();
    assert_eq!(sql, format!("SELECT {COLS} FROM student WHERE uid = ? LIMIT 10"));
    assert_eq!(args, vec![Value::I64(100)]);
}

#[test]
fn select_negative_limit() {
    let mut stmt = select(());
    stmt.from("student").limit_offset(-1, 0);

    let err = render(&stmt, Dialect::Generic).unwrap_err();
    assert!(matches!(err, SqlError::InvalidLimitation));
    assert!(err.is_structural());
}

#[test]
fn bulk_insert_groups_per_row() {
    let rows = vec![alice(), alice(), alice()];
    let stmt = sqlstmt::insert_bulk(&rows);

    let mut w = Writer::acquire();
    let (sql, args) = stmt.build(&mut w, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        format!("INSERT INTO student ({COLS}) VALUES ($1,$2,$3,$4,$5,$6)")
    );
    assert!(args.is_empty());
    assert_eq!(w.bulk_args().len(), 3);
    assert!(w.bulk_args().iter().all(|group| group.len() == 6));
}

#[test]
fn select_by_type_without_instance() {
    let mut stmt = select(Data::of::<Student>());
    stmt.where_(or([
        expr("uid = ??", [1_i64]),
        and([expr("age > ??", [18_i64]), expr("email LIKE ??", ["%@gmail.com"])]),
    ]))
    .desc(["create_time"]);

    let (sql, args) = render(&stmt, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        format!(
            "SELECT {COLS} FROM student WHERE (uid = $1) OR ((age > $2) AND (email LIKE $3)) \
             ORDER BY create_time DESC"
        )
    );
    assert_eq!(args.len(), 3);
}

#[test]
fn update_record_by_key() {
    let mut stu = alice();
    stu.nickname = "Al".to_string();
    let mut stmt = update(&stu);
    stmt.where_(expr("uid = ??", [stu.uid]));

    let (sql, args) = render(&stmt, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "UPDATE student SET uid = $1,username = $2,nickname = $3,email = $4,\
         create_time = $5,update_time = $6 WHERE uid = $7"
    );
    assert_eq!(args[2], Value::from("Al"));
    assert_eq!(args[6], Value::I64(100));
}

#[test]
fn isolated_cache_for_tagged_columns() {
    let cache = std::sync::Arc::new(ColumnCache::new());
    let row = Tagged {
        uid: 1,
        name: "n".to_string(),
        note: None,
    };

    let mut stmt = sqlstmt::sql();
    stmt.with_cache(cache.clone()).insert("tagged").values(&row);

    let (sql, args) = render(&stmt, Dialect::Generic).unwrap();
    assert_eq!(sql, "INSERT INTO tagged (user_id,name,note) VALUES (?,?,?)");
    assert_eq!(args[2], Value::Null);
    assert_eq!(cache.len(), 1);
}

#[test]
fn derived_from_row() {
    let row = ValueRow::new()
        .with("uid", 7_i64)
        .with("username", "bob")
        .with("nickname", "b")
        .with("email", "bob@example.com")
        .with("create_time", created())
        .with("update_time", created());

    let stu = Student::from_row(&row).unwrap();
    assert_eq!(stu.uid, 7);
    assert_eq!(stu.username, "bob");
    assert_eq!(stu.update_time, created());
}
