use super::*;
use crate::sql::count_placeholders;

fn mysql() -> QueryBuilder {
    QueryBuilder::new(DialectKind::MySql)
}

fn ansi() -> QueryBuilder {
    QueryBuilder::new(DialectKind::Ansi)
}

fn mssql() -> QueryBuilder {
    QueryBuilder::new(DialectKind::SqlServer)
}

#[test]
fn select_everything_by_default() {
    let sub = mysql().get("users", None, &[]).unwrap();
    assert_eq!(sub.sql(), "SELECT * FROM users");
    assert!(sub.params().is_empty());
}

#[test]
fn joins_render_in_insertion_order() {
    let mut qb = mysql();
    qb.join("orders o", "o.user_id = u.id", "left")
        .unwrap()
        .join("payments p", "USING (order_id)", "")
        .unwrap()
        .where_("u.active", 1);
    let sub = qb.get("users u", None, &["u.id", "o.total"]).unwrap();
    assert_eq!(
        sub.sql(),
        "SELECT u.id, o.total FROM users u LEFT JOIN orders o ON o.user_id = u.id \
         JOIN payments p USING (order_id) WHERE u.active = ?"
    );
}

#[test]
fn unknown_join_type_is_rejected() {
    let mut qb = mysql();
    match qb.join("orders", "a = b", "CROSS") {
        Err(DbError::InvalidJoinType(t)) => assert_eq!(t, "CROSS"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(qb.is_reset());
}

#[test]
fn join_where_extends_the_on_condition() {
    let mut qb = mysql();
    qb.join("orders o", "o.user_id = u.id", "LEFT")
        .unwrap()
        .join_where("orders o", "o.status", "=", "paid")
        .unwrap()
        .join_or_where("orders o", "o.total", ">", 100)
        .unwrap();
    let sub = qb.get("users u", None, &[]).unwrap();
    assert_eq!(
        sub.sql(),
        "SELECT * FROM users u LEFT JOIN orders o ON o.user_id = u.id \
         AND o.status = ? OR o.total > ?"
    );
    assert_eq!(sub.params(), &[Value::from("paid"), Value::Int(100)]);

    assert!(mysql().join_where("missing", "a", "=", 1).is_err());
}

#[test]
fn subquery_as_join_target() {
    let mut inner = mysql();
    inner.set_alias(Some("t".into()));
    let sub = inner
        .where_("state", "open")
        .get("orders", None, &["user_id"])
        .unwrap();
    assert_eq!(sub.alias(), Some("t"));

    let mut qb = mysql();
    qb.join(sub, "t.user_id = u.id", "INNER")
        .unwrap()
        .join_where("t", "t.user_id", ">", 10)
        .unwrap()
        .where_("u.active", 1);
    let outer = qb.get("users u", None, &["u.id"]).unwrap();
    assert_eq!(
        outer.sql(),
        "SELECT u.id FROM users u INNER JOIN (SELECT user_id FROM orders WHERE state = ?) t \
         ON t.user_id = u.id AND t.user_id > ? WHERE u.active = ?"
    );
    assert_eq!(
        outer.params(),
        &[Value::from("open"), Value::Int(10), Value::Int(1)]
    );
}

#[test]
fn exists_and_in_with_subqueries() {
    let orders = mysql()
        .where_expr("o.user_id = u.id", &[])
        .get("orders o", None, &["1"])
        .unwrap();
    let banned = mysql()
        .where_("reason", "spam")
        .get("bans", None, &["user_id"])
        .unwrap();
    let mut qb = mysql();
    qb.where_op("", "EXISTS", orders)
        .where_op("u.id", "NOT IN", banned);
    let sub = qb.get("users u", None, &[]).unwrap();
    assert_eq!(
        sub.sql(),
        "SELECT * FROM users u WHERE EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id) \
         AND u.id NOT IN (SELECT user_id FROM bans WHERE reason = ?)"
    );
    assert_eq!(count_placeholders(sub.sql()), sub.params().len());
}

#[test]
fn empty_in_list_never_matches() {
    let mut qb = ansi();
    qb.where_op("id", "IN", Vec::<i64>::new())
        .or_where_op("id", "NOT IN", Vec::<i64>::new());
    let sub = qb.get("t", None, &[]).unwrap();
    assert_eq!(sub.sql(), "SELECT * FROM t WHERE 1=0 OR 1=1");
    assert!(sub.params().is_empty());
}

#[test]
fn grouping_and_having() {
    let mut qb = ansi();
    qb.where_("active", true)
        .group_by("dept")
        .group_by("role")
        .having_op("COUNT(*)", ">", 5)
        .or_having("MAX(level)", 9);
    let sub = qb.get("staff", None, &["dept", "role", "COUNT(*)"]).unwrap();
    assert_eq!(
        sub.sql(),
        "SELECT dept, role, COUNT(*) FROM staff WHERE active = ? GROUP BY dept, role \
         HAVING COUNT(*) > ? OR MAX(level) = ?"
    );
}

#[test]
fn ordering_defaults_and_replacement() {
    let mut qb = ansi();
    qb.order_by("created_at", "")
        .unwrap()
        .order_by("name", "asc")
        .unwrap()
        .order_by("created_at", "ASC")
        .unwrap();
    let sub = qb.get("users", None, &[]).unwrap();
    assert_eq!(
        sub.sql(),
        "SELECT * FROM users ORDER BY created_at ASC, name ASC"
    );
    assert!(matches!(
        ansi().order_by("id", "SIDEWAYS"),
        Err(DbError::InvalidOrderDirection(_))
    ));
}

#[test]
fn order_by_strips_unsafe_characters() {
    let mut qb = mysql();
    qb.order_by("name; DROP TABLE users", "ASC").unwrap();
    let sub = qb.get("users", None, &[]).unwrap();
    assert_eq!(sub.sql(), "SELECT * FROM users ORDER BY nameDROPTABLEusers ASC");
}

#[test]
fn random_order_uses_dialect_function() {
    let mut qb = mysql();
    qb.order_by("rand()", "").unwrap();
    assert_eq!(
        qb.get("t", None, &[]).unwrap().sql(),
        "SELECT * FROM t ORDER BY RAND()"
    );

    let mut qb = ansi();
    qb.order_by("RAND()", "").unwrap();
    assert_eq!(
        qb.get("t", None, &[]).unwrap().sql(),
        "SELECT * FROM t ORDER BY RANDOM()"
    );
}

#[test]
fn order_by_explicit_values() {
    let mut qb = mysql();
    qb.order_by_field("status", "ASC", &["new", "paid"]).unwrap();
    assert_eq!(
        qb.get("orders", None, &[]).unwrap().sql(),
        "SELECT * FROM orders ORDER BY FIELD(status, \"new\",\"paid\") ASC"
    );

    let mut qb = ansi();
    qb.order_by_field("status", "DESC", &["new", "paid"]).unwrap();
    assert_eq!(
        qb.get("orders", None, &[]).unwrap().sql(),
        "SELECT * FROM orders ORDER BY CASE status WHEN 'new' THEN 0 \
         WHEN 'paid' THEN 1 ELSE 2 END DESC"
    );
}

#[test]
fn query_options_and_row_locks() {
    let mut qb = mysql();
    qb.set_query_options(&["sql_no_cache", "FOR UPDATE"])
        .unwrap()
        .where_("id", 1);
    assert_eq!(
        qb.get("accounts", Limit::Count(1), &[]).unwrap().sql(),
        "SELECT SQL_NO_CACHE * FROM accounts WHERE id = ? LIMIT 1 FOR UPDATE"
    );

    assert!(matches!(
        mssql().set_query_option("SQL_NO_CACHE"),
        Err(DbError::InvalidQueryOption { .. })
    ));
}

#[test]
fn sql_server_limits_with_top() {
    let mut qb = mssql();
    qb.set_query_option("DISTINCT").unwrap();
    assert_eq!(
        qb.get("users", Limit::Count(10), &["name"]).unwrap().sql(),
        "SELECT DISTINCT TOP 10 name FROM users"
    );
    let mut qb = mssql();
    qb.order_by("id", "ASC").unwrap();
    assert_eq!(
        qb.get("users", Limit::Range { offset: 20, count: 10 }, &[])
            .unwrap()
            .sql(),
        "SELECT * FROM users ORDER BY id ASC OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[test]
fn prefix_applies_to_unqualified_tables() {
    let mut qb = mysql();
    qb.set_prefix("app_");
    qb.join("orders o", "o.user_id = u.id", "").unwrap();
    assert_eq!(
        qb.get("users u", None, &[]).unwrap().sql(),
        "SELECT * FROM app_users u JOIN app_orders o ON o.user_id = u.id"
    );
    assert_eq!(
        qb.get("audit.events", None, &[]).unwrap().sql(),
        "SELECT * FROM audit.events"
    );
}

#[test]
fn count_probe_wraps_grouped_selects() {
    let mut qb = ansi();
    qb.set_query_option("DISTINCT")
        .unwrap()
        .where_("active", true)
        .order_by("dept", "ASC")
        .unwrap();
    let probe = qb.renderer(&qb.state).count_probe("staff", &["dept"]).unwrap();
    assert_eq!(
        probe.as_str(),
        "SELECT COUNT(*) FROM (SELECT DISTINCT dept FROM staff WHERE active = ?) \
         AS total_count_probe"
    );

    let mut qb = ansi();
    qb.where_("active", true).order_by("dept", "ASC").unwrap();
    let probe = qb.renderer(&qb.state).count_probe("staff", &[]).unwrap();
    assert_eq!(probe.as_str(), "SELECT COUNT(*) FROM staff WHERE active = ?");
}

#[test]
fn delete_with_join_targets_main_alias() {
    let mut qb = mysql();
    qb.join("sessions s", "s.user_id = u.id", "INNER")
        .unwrap()
        .where_("s.expired", 1);
    let sql = qb.renderer(&qb.state).delete("users u", None).unwrap();
    assert_eq!(
        sql.as_str(),
        "DELETE u FROM users u INNER JOIN sessions s ON s.user_id = u.id WHERE s.expired = ?"
    );
}

#[test]
fn update_renders_joins_before_set() {
    let mut qb = mysql();
    qb.join("teams t", "t.id = u.team_id", "")
        .unwrap()
        .where_("t.name", "core");
    let data = vec![("u.level".to_string(), Operand::from(3))];
    let sql = qb.renderer(&qb.state).update("users u", &data, None).unwrap();
    assert_eq!(
        sql.as_str(),
        "UPDATE users u JOIN teams t ON t.id = u.team_id SET u.`level` = ? WHERE t.name = ?"
    );
    assert_eq!(sql.params(), &[Value::Int(3), Value::from("core")]);
}

#[test]
fn update_limits_per_dialect() {
    let data = vec![("name".to_string(), Operand::from("x"))];

    let mut qb = mssql();
    qb.where_("id", 1);
    let sql = qb
        .renderer(&qb.state)
        .update("users", &data, Some(Limit::Count(5)))
        .unwrap();
    assert_eq!(sql.as_str(), "UPDATE TOP (5) users SET [name] = ? WHERE id = ?");

    let qb = ansi();
    let err = qb
        .renderer(&qb.state)
        .update("users", &data, Some(Limit::Count(5)))
        .unwrap_err();
    assert!(matches!(err, DbError::Unsupported { .. }));

    let qb = mysql();
    assert!(
        qb.renderer(&qb.state)
            .update("users", &data, Some(Limit::Range { offset: 1, count: 5 }))
            .is_err()
    );
}

#[test]
fn ansi_upsert_uses_on_conflict() {
    let mut qb = ansi();
    qb.on_duplicate(&["login"], Some("id"));
    let data = vec![
        ("id".to_string(), Operand::from(1)),
        ("login".to_string(), Operand::from("ann")),
    ];
    let sql = qb
        .renderer(&qb.state)
        .insert(StatementKind::Insert, "users", &data)
        .unwrap();
    assert_eq!(
        sql.as_str(),
        "INSERT INTO users (\"id\", \"login\") VALUES (?, ?) \
         ON CONFLICT (\"id\") DO UPDATE SET \"login\" = ?"
    );
}

#[test]
fn upsert_column_missing_from_row_is_a_payload_error() {
    let mut qb = mysql();
    qb.on_duplicate(&["email"], None);
    let data = vec![("login".to_string(), Operand::from("ann"))];
    let err = qb
        .renderer(&qb.state)
        .insert(StatementKind::Insert, "users", &data)
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidPayload { column, .. } if column == "email"));
}

#[test]
fn sql_server_has_no_upsert_or_returning() {
    let data = vec![("login".to_string(), Operand::from("ann"))];
    let mut qb = mssql();
    qb.on_duplicate(&["login"], None);
    assert!(
        qb.renderer(&qb.state)
            .insert(StatementKind::Insert, "users", &data)
            .is_err()
    );
    let mut qb = mssql();
    qb.returning("id");
    assert!(
        qb.renderer(&qb.state)
            .insert(StatementKind::Insert, "users", &data)
            .is_err()
    );
}

#[test]
fn interval_specs() {
    let qb = mysql();
    assert_eq!(qb.interval("-1d", None).unwrap(), "NOW() - INTERVAL 1 DAY");
    assert_eq!(
        qb.interval("+3M", Some("created_at")).unwrap(),
        "created_at + INTERVAL 3 MONTH"
    );
    assert_eq!(qb.interval("10", None).unwrap(), "NOW() + INTERVAL 10 DAY");
    assert_eq!(qb.interval("", Some("created_at")).unwrap(), "created_at");
    assert_eq!(qb.now("+2h").unwrap(), Operand::raw("NOW() + INTERVAL 2 HOUR"));
    assert!(matches!(
        qb.interval("two days", None),
        Err(DbError::InvalidInterval(_))
    ));
    assert!(qb.interval("5w", None).is_err());
}

#[test]
fn now_as_condition_value() {
    let mut qb = ansi();
    let cutoff = qb.now("-7d").unwrap();
    qb.where_op("last_seen", "<", cutoff);
    assert_eq!(
        qb.get("users", None, &[]).unwrap().sql(),
        "SELECT * FROM users WHERE last_seen < CURRENT_TIMESTAMP - INTERVAL '7 day'"
    );
}

#[test]
fn get_resets_and_fork_starts_clean() {
    let mut qb = mysql();
    qb.set_prefix("app_").where_("a", 1).with_total_count();
    let fork = qb.fork(Some("x".into()));
    assert!(fork.is_reset());
    assert_eq!(fork.prefix(), "app_");
    assert_eq!(fork.alias(), Some("x"));
    assert!(!qb.is_reset());
    qb.get("t", None, &[]).unwrap();
    assert!(qb.is_reset());
}
