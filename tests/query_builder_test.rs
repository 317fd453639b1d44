//! Statement builder behavior on filters parsed from JSON.

use rowcache::domain::models::{ColumnNaming, FieldSet, Filter, SortDirection, SqlValue};
use rowcache::services::{QueryBuilder, SelectQuery};
use serde_json::json;

fn parse(value: serde_json::Value) -> Filter {
    Filter::from_json(&value).expect("valid filter")
}

#[test]
fn test_gte_and_ilike_number_in_order() {
    let filter = parse(json!({"age": {"gte": 18}, "name": {"ilike": "jo"}}));
    let clause = QueryBuilder::new().build_where_clause(&filter, 1);

    assert_eq!(clause.clause, "WHERE age >= $1 AND name ILIKE $2");
    assert_eq!(clause.values, vec![SqlValue::Int(18), SqlValue::Text("%jo%".into())]);
}

#[test]
fn test_in_list_advances_the_counter_by_its_length() {
    let filter = parse(json!({"id": {"in": [1, 2, 3]}, "status": "open"}));
    let clause = QueryBuilder::new().build_where_clause(&filter, 4);

    assert_eq!(clause.clause, "WHERE id IN ($4, $5, $6) AND status = $7");
    assert_eq!(clause.values.len(), 4);
}

#[test]
fn test_or_groups_with_sibling() {
    let filter = parse(json!({"or": [{"a": 1}, {"b": 2}], "c": 3}));
    let clause = QueryBuilder::new().build_where_clause(&filter, 1);

    assert_eq!(clause.clause, "WHERE ((a = $1) OR (b = $2)) AND c = $3");
    assert_eq!(
        clause.values,
        vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
    );
}

#[test]
fn test_operator_precedence_picks_like_over_equality_fallbacks() {
    let filter = parse(json!({"name": {"gte": "a", "like": "b"}}));
    let clause = QueryBuilder::new().build_where_clause(&filter, 1);

    assert_eq!(clause.clause, "WHERE name LIKE $1");
    assert_eq!(clause.values, vec![SqlValue::Text("%b%".into())]);
}

#[test]
fn test_range_and_not_in() {
    let filter = parse(json!({
        "created_at": {"range": ["2024-01-01", "2024-12-31"]},
        "kind": {"notIn": ["spam", "bulk"]},
        "score": {"neq": 0}
    }));
    let clause = QueryBuilder::new().build_where_clause(&filter, 1);

    assert_eq!(
        clause.clause,
        "WHERE created_at BETWEEN $1 AND $2 AND kind NOT IN ($3, $4) AND score != $5"
    );
    assert_eq!(clause.values.len(), 5);
}

#[test]
fn test_malformed_filter_is_rejected() {
    assert!(Filter::from_json(&json!({"id": {"in": 5}})).is_err());
    assert!(Filter::from_json(&json!({"id": {"range": [1]}})).is_err());
    assert!(Filter::from_json(&json!({"or": {"a": 1}})).is_err());
    assert!(Filter::from_json(&json!({"id; DROP TABLE todos": 1})).is_err());
}

#[test]
fn test_snake_case_naming_applies_to_filters_and_updates() {
    let builder = QueryBuilder::with_naming(ColumnNaming::SnakeCase);
    let filter = Filter::new().eq("taskName", "ship");
    assert_eq!(builder.build_where_clause(&filter, 1).clause, "WHERE task_name = $1");

    let update = builder.build_update_clause(&FieldSet::new().set("taskName", "ship"));
    assert_eq!(update.set_clause, "task_name = $2");

    let verbatim = QueryBuilder::new().build_update_clause(&FieldSet::new().set("taskName", "ship"));
    assert_eq!(verbatim.set_clause, "taskName = $2");
}

#[test]
fn test_select_with_join_filter_and_paging() {
    let query = SelectQuery::new("todos")
        .columns(["todos.*", "users.name"])
        .join("users", "users.id = todos.owner_id")
        .filter(Filter::new().eq("users.name", "ada").is_in("todos.id", [7, 8]))
        .order_by("todos.task_due_date", SortDirection::Desc)
        .limit(20)
        .offset(40);
    let statement = QueryBuilder::new().build_select_query_with_joins(&query);

    assert_eq!(
        statement.sql,
        "SELECT todos.*, users.name FROM todos JOIN users ON users.id = todos.owner_id \
         WHERE users.name = $1 AND todos.id IN ($2, $3) \
         ORDER BY todos.task_due_date DESC LIMIT $4 OFFSET $5"
    );
    assert_eq!(statement.values[3], SqlValue::Int(20));
    assert_eq!(statement.values[4], SqlValue::Int(40));
    assert!(statement.returns_rows());
}
