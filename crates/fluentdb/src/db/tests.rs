use super::*;
use crate::record;
use crate::sql::count_placeholders;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

// ── Scripted connection ──

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Query(String, Vec<Value>),
    Stream(String, Vec<Value>),
    Execute(String, Vec<Value>),
}

impl Call {
    fn sql(&self) -> &str {
        match self {
            Call::Query(sql, _) | Call::Stream(sql, _) | Call::Execute(sql, _) => sql.as_str(),
        }
    }

    fn params(&self) -> &[Value] {
        match self {
            Call::Query(_, p) | Call::Stream(_, p) | Call::Execute(_, p) => p.as_slice(),
        }
    }
}

enum Reply {
    Rows(Vec<Row>),
    Exec(ExecOutcome),
    Fail(DbError),
}

/// Records every statement and answers from a script. Unscripted queries
/// return no rows; unscripted statements affect one row.
#[derive(Default)]
struct MockConnection {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl MockConnection {
    fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            calls: Mutex::default(),
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn sqls(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.sql().to_string()).collect()
    }

    fn next_reply(&self) -> Option<Reply> {
        self.replies.lock().unwrap().pop_front()
    }
}

impl Connection for MockConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Query(sql.to_string(), params.to_vec()));
        match self.next_reply() {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Exec(_)) | None => Ok(Vec::new()),
        }
    }

    async fn query_stream(&self, sql: &str, params: &[Value]) -> DbResult<RowStream> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Stream(sql.to_string(), params.to_vec()));
        match self.next_reply() {
            Some(Reply::Rows(rows)) => Ok(RowStream::from_rows(rows)),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Exec(_)) | None => Ok(RowStream::from_rows(Vec::new())),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Execute(sql.to_string(), params.to_vec()));
        match self.next_reply() {
            Some(Reply::Exec(outcome)) => Ok(outcome),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Rows(_)) | None => Ok(ExecOutcome {
                affected_rows: 1,
                last_insert_id: None,
            }),
        }
    }
}

fn db(dialect: DialectKind) -> Db<MockConnection> {
    Db::new(MockConnection::default(), dialect)
}

fn scripted(
    dialect: DialectKind,
    replies: impl IntoIterator<Item = Reply>,
) -> Db<MockConnection> {
    Db::new(MockConnection::with_replies(replies), dialect)
}

fn count_row(n: i64) -> Reply {
    Reply::Rows(vec![Row::from_pairs([("COUNT(*)", n)])])
}

fn inserted(id: i64) -> Reply {
    Reply::Exec(ExecOutcome {
        affected_rows: 1,
        last_insert_id: Some(id),
    })
}

// ── SELECT ──

#[tokio::test]
async fn select_with_condition_and_limit() {
    let mut db = db(DialectKind::MySql);
    db.where_("active", 1)
        .get("users", Limit::Count(5), &[])
        .await
        .unwrap();

    let calls = db.connection().calls();
    assert_eq!(
        calls,
        vec![Call::Query(
            "SELECT * FROM users WHERE active = ? LIMIT 5".into(),
            vec![Value::Int(1)]
        )]
    );
    assert!(db.builder().is_reset());
    assert_eq!(db.last_query(), "SELECT * FROM users WHERE active = 1 LIMIT 5");
}

#[tokio::test]
async fn connectives_never_lead_a_clause() {
    let mut db = db(DialectKind::Ansi);
    db.or_where("a", 1)
        .where_("b", 2)
        .or_where_op("c", ">", 3)
        .get("t", None, &["id"])
        .await
        .unwrap();

    let calls = db.connection().calls();
    assert_eq!(
        calls[0].sql(),
        "SELECT id FROM t WHERE a = ? AND b = ? OR c > ?"
    );
}

#[tokio::test]
async fn placeholders_match_parameters() {
    let mut db = db(DialectKind::MySql);
    let ids = db
        .subquery(None)
        .where_op("amount", ">", 100)
        .get("orders", None, &["user_id"])
        .unwrap();
    db.where_op("id", "IN", ids)
        .where_op("age", "BETWEEN", [18, 65])
        .where_op("role", "NOT IN", ["admin", "root"])
        .where_expr("(score > ? OR score < ?)", &[Value::Int(90), Value::Int(10)])
        .where_op("deleted_at", "IS", None::<i64>)
        .get("users", None, &[])
        .await
        .unwrap();

    let call = &db.connection().calls()[0];
    assert_eq!(count_placeholders(call.sql()), call.params().len());
    assert_eq!(
        call.sql(),
        "SELECT * FROM users WHERE id IN (SELECT user_id FROM orders WHERE amount > ?) \
         AND age BETWEEN ? AND ? AND role NOT IN (?, ?) AND (score > ? OR score < ?) \
         AND deleted_at IS NULL"
    );
    assert_eq!(call.params()[0], Value::Int(100));
}

#[tokio::test]
async fn subquery_parameters_precede_outer_ones_in_text_order() {
    let mut db = db(DialectKind::MySql);
    let sub = db
        .subquery(None)
        .where_("qty", 2)
        .get("products", None, &["user_id"])
        .unwrap();
    db.where_("status", "open")
        .where_op("id", "IN", sub)
        .get("users", None, &[])
        .await
        .unwrap();

    let call = &db.connection().calls()[0];
    assert_eq!(call.params(), &[Value::from("open"), Value::Int(2)]);
}

#[tokio::test]
async fn state_is_reset_even_when_rendering_fails() {
    let mut db = db(DialectKind::Ansi);
    db.where_op("id", "BETWEEN", [1]);
    assert!(db.get("users", None, &[]).await.is_err());
    assert!(db.builder().is_reset());
    assert!(db.connection().calls().is_empty());

    db.get("users", None, &[]).await.unwrap();
    assert_eq!(db.connection().sqls(), vec!["SELECT * FROM users"]);
}

#[tokio::test]
async fn get_one_and_value_helpers() {
    let mut db = scripted(
        DialectKind::MySql,
        [
            Reply::Rows(vec![Row::from_pairs([("login", "ann")])]),
            Reply::Rows(vec![]),
            Reply::Rows(vec![Row::from_pairs([("1", 1)])]),
        ],
    );
    let login = db.where_("id", 7).get_value("users", "login").await.unwrap();
    assert_eq!(login, Some(Value::from("ann")));
    assert!(db.where_("id", 8).get_one("users", &[]).await.unwrap().is_none());
    assert!(db.where_("id", 9).has("users").await.unwrap());

    assert_eq!(
        db.connection().sqls(),
        vec![
            "SELECT login FROM users WHERE id = ? LIMIT 1",
            "SELECT * FROM users WHERE id = ? LIMIT 1",
            "SELECT 1 FROM users WHERE id = ? LIMIT 1",
        ]
    );
}

#[tokio::test]
async fn json_return_type_applies_to_one_statement() {
    let rows = vec![
        Row::from_pairs([("id", Value::Int(1)), ("name", Value::from("a"))]),
        Row::from_pairs([("id", Value::Int(2)), ("name", Value::from("b"))]),
    ];
    let mut db = scripted(
        DialectKind::Ansi,
        [Reply::Rows(rows.clone()), Reply::Rows(rows)],
    );
    db.set_return_type(ReturnType::Json);
    let json = db.get("t", None, &[]).await.unwrap();
    match json {
        ResultSet::Json(value) => assert_eq!(
            value,
            serde_json::json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}])
        ),
        other => panic!("expected JSON, got {other:?}"),
    }
    assert!(matches!(
        db.get("t", None, &[]).await.unwrap(),
        ResultSet::Rows(_)
    ));
    assert_eq!(db.count(), 2);
}

#[tokio::test]
async fn streaming_yields_rows_one_at_a_time() {
    let rows = vec![Row::from_pairs([("id", 1)]), Row::from_pairs([("id", 2)])];
    let mut db = scripted(DialectKind::MySql, [Reply::Rows(rows)]);
    db.use_stream(true);
    let result = db.get("t", None, &[]).await.unwrap();
    let mut stream = result.into_stream().unwrap();
    let mut ids = Vec::new();
    while let Some(row) = stream.next().await {
        ids.push(row.unwrap().try_get::<i64>("id").unwrap());
    }
    assert_eq!(ids, vec![1, 2]);
    assert!(matches!(db.connection().calls()[0], Call::Stream(..)));

    // Single-row helpers still materialize.
    db.get_one("t", &[]).await.unwrap();
    assert!(matches!(db.connection().calls()[1], Call::Query(..)));
}

// ── Total count and pagination ──

#[tokio::test]
async fn native_total_count_follows_the_query() {
    let mut db = scripted(
        DialectKind::MySql,
        [
            Reply::Rows(vec![Row::from_pairs([("id", 1)])]),
            Reply::Rows(vec![Row::from_pairs([("FOUND_ROWS()", 42)])]),
        ],
    );
    db.with_total_count()
        .where_("active", 1)
        .get("users", Limit::Count(1), &[])
        .await
        .unwrap();
    assert_eq!(
        db.connection().sqls(),
        vec![
            "SELECT SQL_CALC_FOUND_ROWS * FROM users WHERE active = ? LIMIT 1",
            "SELECT FOUND_ROWS()",
        ]
    );
    assert_eq!(db.total_count(), 42);
    assert_eq!(db.count(), 1);
    assert_eq!(
        db.last_query(),
        "SELECT SQL_CALC_FOUND_ROWS * FROM users WHERE active = 1 LIMIT 1"
    );
}

#[tokio::test]
async fn probe_total_count_on_ansi() {
    let mut db = scripted(DialectKind::Ansi, [count_row(7), Reply::Rows(vec![])]);
    db.with_total_count()
        .where_("active", true)
        .order_by("id", "ASC")
        .unwrap()
        .get("users", Limit::Range { offset: 5, count: 5 }, &[])
        .await
        .unwrap();
    let calls = db.connection().calls();
    assert_eq!(
        calls[0],
        Call::Query(
            "SELECT COUNT(*) FROM users WHERE active = ?".into(),
            vec![Value::Bool(true)]
        )
    );
    assert_eq!(
        calls[1].sql(),
        "SELECT * FROM users WHERE active = ? ORDER BY id ASC LIMIT 5 OFFSET 5"
    );
    assert_eq!(db.total_count(), 7);
}

#[tokio::test]
async fn paginate_computes_offsets_and_pages() {
    let mut db = scripted(DialectKind::Ansi, [count_row(45), Reply::Rows(vec![])]);
    db.set_page_limit(10).unwrap();
    db.paginate("items", 3, &[]).await.unwrap();
    assert_eq!(
        db.connection().sqls()[1],
        "SELECT * FROM items LIMIT 10 OFFSET 20"
    );
    assert_eq!(db.total_count(), 45);
    assert_eq!(db.total_pages(), 5);
}

#[tokio::test]
async fn paginate_on_sql_server_uses_offset_fetch() {
    let mut db = scripted(DialectKind::SqlServer, [count_row(3), Reply::Rows(vec![])]);
    db.set_page_limit(10).unwrap();
    db.paginate("items", 3, &[]).await.unwrap();
    assert_eq!(
        db.connection().sqls()[1],
        "SELECT * FROM items ORDER BY (SELECT NULL) OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
    );
    assert_eq!(db.total_pages(), 1);
}

#[tokio::test]
async fn paginate_rejects_page_zero() {
    let mut db = db(DialectKind::Ansi);
    db.where_("a", 1);
    assert!(db.paginate("items", 0, &[]).await.is_err());
    assert!(db.builder().is_reset());
    assert!(db.set_page_limit(0).is_err());
}

#[tokio::test]
async fn paginate_rejects_offset_overflow() {
    let mut db = db(DialectKind::Ansi);
    db.set_page_limit(20).unwrap();
    db.where_("a", 1);
    let err = db.paginate("items", u64::MAX / 10, &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
    assert!(db.builder().is_reset());
    assert!(db.connection().calls().is_empty());
}

// ── INSERT / UPDATE / DELETE ──

#[tokio::test]
async fn insert_returns_generated_id() {
    let mut db = scripted(DialectKind::MySql, [inserted(12)]);
    let id = db
        .insert("users", record! { "login" => "admin", "active" => true })
        .await
        .unwrap();
    assert_eq!(id, Some(12));
    assert_eq!(
        db.connection().calls()[0],
        Call::Execute(
            "INSERT INTO users (`login`, `active`) VALUES (?, ?)".into(),
            vec![Value::from("admin"), Value::Bool(true)]
        )
    );
    assert_eq!(db.last_insert_id(), Some(12));
}

#[tokio::test]
async fn insert_on_duplicate_key_update() {
    let mut db = scripted(DialectKind::MySql, [inserted(3)]);
    db.on_duplicate(&["login", "visits"], Some("id"))
        .on_duplicate_value("visits", Operand::raw("visits + 1"));
    db.insert("users", record! { "login" => "ann", "visits" => 1 })
        .await
        .unwrap();
    assert_eq!(
        db.connection().calls()[0],
        Call::Execute(
            "INSERT INTO users (`login`, `visits`) VALUES (?, ?) ON DUPLICATE KEY UPDATE \
             `id` = LAST_INSERT_ID(`id`), `login` = ?, `visits` = visits + 1"
                .into(),
            vec![Value::from("ann"), Value::Int(1), Value::from("ann")]
        )
    );
}

#[tokio::test]
async fn insert_uses_returning_on_ansi() {
    let mut db = scripted(
        DialectKind::Ansi,
        [Reply::Rows(vec![Row::from_pairs([("id", 99)])])],
    );
    db.returning("id");
    let id = db.insert("users", record! { "login" => "x" }).await.unwrap();
    assert_eq!(id, Some(99));
    assert_eq!(
        db.connection().sqls(),
        vec!["INSERT INTO users (\"login\") VALUES (?) RETURNING \"id\""]
    );
}

#[tokio::test]
async fn replace_is_dialect_gated() {
    let mut db = db(DialectKind::Ansi);
    let err = db.replace("users", record! { "id" => 1 }).await.unwrap_err();
    assert!(err.is_construction());

    let mut db = self::db(DialectKind::MySql);
    db.replace("users", record! { "id" => 1 }).await.unwrap();
    assert_eq!(
        db.connection().sqls(),
        vec!["REPLACE INTO users (`id`) VALUES (?)"]
    );
}

#[tokio::test]
async fn update_reports_whether_rows_changed() {
    let mut db = scripted(
        DialectKind::MySql,
        [
            Reply::Exec(ExecOutcome {
                affected_rows: 2,
                last_insert_id: None,
            }),
            Reply::Exec(ExecOutcome::default()),
        ],
    );
    let changed = db
        .where_("id", 1)
        .update(
            "users",
            record! { "login" => "ann", "visits" => Operand::increment(1) },
            None,
        )
        .await
        .unwrap();
    assert!(changed);
    assert_eq!(db.affected_rows(), 2);
    assert_eq!(
        db.connection().calls()[0],
        Call::Execute(
            "UPDATE users SET `login` = ?, `visits` = `visits` + 1 WHERE id = ?".into(),
            vec![Value::from("ann"), Value::Int(1)]
        )
    );

    let changed = db
        .where_("id", 2)
        .update("users", record! { "login" => "bob" }, None)
        .await
        .unwrap();
    assert!(!changed);
}

#[tokio::test]
async fn delete_with_limit_per_dialect() {
    let mut db = db(DialectKind::MySql);
    db.where_("id", 1).delete("users", Limit::Count(1)).await.unwrap();
    let mut mssql = self::db(DialectKind::SqlServer);
    mssql
        .where_("id", 1)
        .delete("users", Limit::Count(1))
        .await
        .unwrap();

    assert_eq!(
        db.connection().sqls(),
        vec!["DELETE FROM users WHERE id = ? LIMIT 1"]
    );
    assert_eq!(
        mssql.connection().sqls(),
        vec!["DELETE TOP (1) FROM users WHERE id = ?"]
    );
}

// ── Bulk insert and transactions ──

#[tokio::test]
async fn bulk_insert_commits_all_rows() {
    let mut db = scripted(
        DialectKind::MySql,
        [Reply::Exec(ExecOutcome::default()), inserted(1), inserted(2)],
    );
    let ids = db
        .insert_multi_with_keys(
            "tags",
            &["name"],
            vec![vec![Operand::from("a")], vec![Operand::from("b")]],
        )
        .await
        .unwrap();
    assert_eq!(ids, vec![Some(1), Some(2)]);
    assert_eq!(
        db.connection().sqls(),
        vec![
            "BEGIN",
            "INSERT INTO tags (`name`) VALUES (?)",
            "INSERT INTO tags (`name`) VALUES (?)",
            "COMMIT",
        ]
    );
    assert!(!db.in_transaction());
}

#[tokio::test]
async fn bulk_insert_failure_rolls_back() {
    let mut db = scripted(
        DialectKind::MySql,
        [
            Reply::Exec(ExecOutcome::default()),
            inserted(1),
            Reply::Fail(DbError::Query {
                code: Some("23000".into()),
                message: "duplicate entry".into(),
            }),
        ],
    );
    let err = db
        .insert_multi(
            "tags",
            vec![record! { "name" => "a" }, record! { "name" => "a" }, record! { "name" => "c" }],
        )
        .await
        .unwrap_err();
    assert!(err.is_execution());
    assert_eq!(
        db.connection().sqls(),
        vec![
            "BEGIN",
            "INSERT INTO tags (`name`) VALUES (?)",
            "INSERT INTO tags (`name`) VALUES (?)",
            "ROLLBACK",
        ]
    );
    assert!(!db.in_transaction());
    assert_eq!(db.last_error_code(), Some("23000"));
}

#[tokio::test]
async fn bulk_insert_inside_caller_transaction_leaves_it_open() {
    let mut db = db(DialectKind::MySql);
    db.start_transaction().await.unwrap();
    db.on_duplicate(&["name"], None);
    db.insert_multi("tags", vec![record! { "name" => "a" }, record! { "name" => "b" }])
        .await
        .unwrap();
    assert!(db.in_transaction());
    let sqls = db.connection().sqls();
    assert_eq!(sqls.len(), 3);
    assert!(sqls[1..].iter().all(|s| s.ends_with("ON DUPLICATE KEY UPDATE `name` = ?")));
    db.commit().await.unwrap();
    assert!(db.builder().is_reset());
}

#[tokio::test]
async fn key_count_mismatch_is_a_payload_error() {
    let mut db = db(DialectKind::MySql);
    let err = db
        .insert_multi_with_keys("t", &["a", "b"], vec![vec![Operand::from(1)]])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidPayload { .. }));
    assert!(db.connection().calls().is_empty());
}

#[tokio::test]
async fn nested_transaction_is_rejected() {
    let mut db = db(DialectKind::Ansi);
    db.start_transaction().await.unwrap();
    assert!(matches!(
        db.start_transaction().await,
        Err(DbError::Transaction(_))
    ));
    db.rollback().await.unwrap();
}

#[tokio::test]
async fn dropping_with_open_transaction_rolls_back() {
    let mut db = db(DialectKind::Ansi);
    db.start_transaction().await.unwrap();
    let conn = db.shared_connection();
    drop(db);

    for _ in 0..10 {
        if conn.sqls().last().map(String::as_str) == Some("ROLLBACK") {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(conn.sqls(), vec!["BEGIN".to_string(), "ROLLBACK".to_string()]);
}

#[tokio::test]
async fn dropping_after_commit_sends_nothing() {
    let mut db = db(DialectKind::Ansi);
    db.start_transaction().await.unwrap();
    db.commit().await.unwrap();
    let conn = db.shared_connection();
    drop(db);
    tokio::task::yield_now().await;
    assert_eq!(conn.sqls(), vec!["BEGIN".to_string(), "COMMIT".to_string()]);
}

#[test]
fn dropping_outside_a_runtime_leaves_transaction_to_server() {
    let mut db = db(DialectKind::Ansi);
    db.transaction_in_progress = true;
    let conn = db.shared_connection();
    drop(db);
    assert!(conn.calls().is_empty());
}

// ── Errors, raw queries, tracing ──

#[tokio::test]
async fn execution_errors_are_recorded_and_returned() {
    let mut db = scripted(
        DialectKind::Ansi,
        [Reply::Fail(DbError::Query {
            code: Some("42P01".into()),
            message: "relation \"nope\" does not exist".into(),
        })],
    );
    let err = db.where_("a", 1).get("nope", None, &[]).await.unwrap_err();
    assert_eq!(err.code(), Some("42P01"));
    assert_eq!(db.last_error_code(), Some("42P01"));
    assert!(db.last_error().unwrap().contains("does not exist"));
    assert!(db.builder().is_reset());

    db.get("users", None, &[]).await.unwrap();
    assert!(db.last_error().is_none());
}

#[tokio::test]
async fn construction_errors_do_not_reach_the_connection() {
    let mut db = db(DialectKind::MySql);
    assert!(db.join("orders o", "o.user_id = u.id", "SIDEWAYS").is_err());
    assert!(db.order_by("id", "UP").is_err());
    assert!(db.set_query_option("NOT_AN_OPTION").is_err());
    let err = db
        .insert("t", record! { "n" => Operand::increment(1) })
        .await
        .unwrap_err();
    assert!(err.is_construction());
    assert!(db.connection().calls().is_empty());
    assert!(db.last_error().is_none());
}

#[tokio::test]
async fn raw_query_binds_parameters() {
    let mut db = scripted(
        DialectKind::MySql,
        [Reply::Rows(vec![Row::from_pairs([("n", 3)])])],
    );
    let n = db
        .raw_query_value("SELECT COUNT(*) AS n FROM users WHERE login = ?", &["x".into()])
        .await
        .unwrap();
    assert_eq!(n, Some(Value::Int(3)));
    assert_eq!(
        db.last_query(),
        "SELECT COUNT(*) AS n FROM users WHERE login = 'x'"
    );
}

#[tokio::test]
async fn trace_records_executed_statements() {
    let mut db = db(DialectKind::MySql);
    db.set_trace(true);
    db.where_("id", 5).get("users", None, &[]).await.unwrap();
    db.delete("sessions", None).await.unwrap();
    let trace: Vec<&str> = db.trace().iter().map(|t| t.sql.as_str()).collect();
    assert_eq!(
        trace,
        vec!["SELECT * FROM users WHERE id = 5", "DELETE FROM sessions"]
    );
    db.set_trace(false);
    assert!(db.trace().is_empty());
}

#[tokio::test]
async fn table_exists_counts_matches() {
    let mut db = scripted(DialectKind::MySql, [count_row(2)]);
    db.set_prefix("app_");
    assert!(db.table_exists(&["users", "orders"]).await.unwrap());
    assert_eq!(
        db.connection().calls()[0],
        Call::Query(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name IN (?, ?)".into(),
            vec![Value::from("app_users"), Value::from("app_orders")]
        )
    );
}

#[tokio::test]
async fn copy_keeps_pending_state_and_prefix() {
    let mut db = db(DialectKind::MySql);
    db.set_prefix("app_");
    db.where_("id", 1);
    let mut copy = db.copy();
    assert!(db.pending_state().wheres.len() == 1);
    let sub = copy.get("users", None, &[]).unwrap();
    assert_eq!(sub.sql(), "SELECT * FROM app_users WHERE id = ?");
    assert!(copy.is_reset());
}

#[tokio::test]
async fn with_config_applies_prefix_and_page_limit() {
    let config = DbConfig::new(DialectKind::Ansi).prefix("t_").page_limit(5);
    let mut db = Db::with_config(MockConnection::default(), &config).unwrap();
    assert_eq!(db.page_limit(), 5);
    db.get("users", None, &[]).await.unwrap();
    assert_eq!(db.connection().sqls(), vec!["SELECT * FROM t_users"]);
    assert!(Db::with_config(MockConnection::default(), &DbConfig::default()).is_err());
}
