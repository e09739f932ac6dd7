//! Operation batch tests
//!
//! Drives `OperationExecutor` end to end against `MemoryStore` with a fixed
//! clock (2024-05-15).
//!
//! Test Categories:
//! 1. Transaction scoping
//! 2. Validation before any store call
//! 3. Filter semantics
//! 4. Write results
//! 5. Query log

use serde_json::{json, Value};

use relop::{ExecutorConfig, FixedClock, MemoryStore, OperationExecutor, QueryError};

fn orders() -> MemoryStore {
    MemoryStore::from_value(&json!({
        "orders": [
            {"id": 1, "status": "paid", "total": 150, "customer": "Ada Lovelace", "due_on": "2024-05-01"},
            {"id": 2, "status": "paid", "total": 80, "customer": "Grace Hopper", "due_on": "2024-05-10"},
            {"id": 3, "status": "open", "total": 300, "customer": "ada", "due_on": "2024-05-15"},
            {"id": 7, "status": "paid", "total": 120, "customer": "Linus", "due_on": "2024-05-20"}
        ],
        "users": [
            {"id": 1, "name": "Ada"}
        ]
    }))
    .unwrap()
}

fn executor(store: MemoryStore) -> OperationExecutor<MemoryStore> {
    OperationExecutor::new(store, ExecutorConfig::default())
        .with_clock(FixedClock::at_date(2024, 5, 15).unwrap())
}

fn ids(result: &Value) -> Vec<i64> {
    result
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect()
}

// =============================================================================
// TRANSACTION SCOPING
// =============================================================================

#[test]
fn test_single_select_opens_no_transaction() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({"type": "select", "tableName": "orders"}))
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(ex.store().stats().begins, 0);
    assert_eq!(ex.store().stats().selects, 1);
}

#[test]
fn test_single_count_opens_no_transaction() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!([{"type": "count", "tableName": "orders"}]))
        .unwrap();

    assert_eq!(results[0].result, json!({"count": 4}));
    assert_eq!(ex.store().stats().begins, 0);
}

#[test]
fn test_single_insert_opens_one_transaction() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({"type": "insert", "tableName": "orders", "data": {"status": "open", "total": 5}}))
        .unwrap();

    // One-operation batches still come back as a list
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result, json!({"id": 8}));

    let stats = ex.store().stats();
    assert_eq!(stats.begins, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.rollbacks, 0);
}

#[test]
fn test_batch_of_reads_shares_one_transaction() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!([
            {"type": "select", "tableName": "orders"},
            {"type": "count", "tableName": "users"}
        ]))
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[1].result, json!({"count": 1}));
    assert_eq!(ex.store().stats().begins, 1);
    assert_eq!(ex.store().stats().commits, 1);
}

#[test]
fn test_failure_rolls_back_whole_batch() {
    let mut ex = executor(orders());
    let err = ex
        .run_json(&json!([
            {"type": "insert", "tableName": "orders", "data": {"status": "open", "total": 9}},
            {"type": "update", "tableName": "missing_table", "data": {"status": "x"},
             "filters": {"op": "and", "conditions": [{"attribute": "id", "op": "is", "value": 1}]}}
        ]))
        .unwrap_err();

    assert_eq!(err.code(), "EXECUTION_FAILURE");
    assert_eq!(err.status_code(), 500);

    let store = ex.store();
    assert_eq!(store.table("orders").unwrap().len(), 4);
    assert_eq!(store.stats().rollbacks, 1);
    assert_eq!(store.stats().commits, 0);
    assert!(ex.query_log().len() == 1);
}

#[test]
fn test_results_keep_submitted_order() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!([
            {"type": "count", "tableName": "orders"},
            {"type": "delete", "tableName": "orders",
             "filters": {"op": "and", "conditions": [{"attribute": "status", "op": "is", "value": "open"}]}},
            {"type": "count", "tableName": "orders"}
        ]))
        .unwrap();

    assert_eq!(results[0].result, json!({"count": 4}));
    assert_eq!(results[1].result, json!({"rows_affected": 1}));
    assert_eq!(results[2].result, json!({"count": 3}));
}

// =============================================================================
// VALIDATION BEFORE STORE CALLS
// =============================================================================

#[test]
fn test_missing_table_name_makes_no_store_calls() {
    for op in ["select", "count", "insert", "update", "delete"] {
        let mut ex = executor(orders());
        let err = ex
            .run_json(&json!({"type": op, "data": {"a": 1}}))
            .unwrap_err();

        assert!(matches!(err, QueryError::InvalidArgument(_)), "{}: {:?}", op, err);
        assert_eq!(ex.store().stats().statements(), 0, "{}", op);
    }
}

#[test]
fn test_unknown_type_is_unsupported() {
    let mut ex = executor(orders());
    let err = ex
        .run_json(&json!({"type": "upsert", "tableName": "orders"}))
        .unwrap_err();

    assert_eq!(err.code(), "UNSUPPORTED_OPERATION");
    assert_eq!(ex.store().stats().statements(), 0);
}

#[test]
fn test_join_with_short_on_is_rejected() {
    let mut ex = executor(orders());
    let err = ex
        .run_json(&json!({
            "type": "select",
            "tableName": "orders",
            "joins": [{"type": "inner", "table": "users", "on": ["orders.id", "="]}]
        }))
        .unwrap_err();

    assert!(matches!(err, QueryError::InvalidArgument(_)));
    assert_eq!(ex.store().stats().statements(), 0);
}

#[test]
fn test_update_without_filters_is_rejected() {
    let mut ex = executor(orders());
    let err = ex
        .run_json(&json!({"type": "update", "tableName": "orders", "data": {"status": "void"}}))
        .unwrap_err();

    assert!(err.to_string().contains("Update conditions (filters) are required"));
    assert_eq!(ex.store().stats().updates, 0);
    // The transaction was opened for the write and rolled back
    assert_eq!(ex.store().stats().rollbacks, 1);
}

// =============================================================================
// FILTER SEMANTICS
// =============================================================================

#[test]
fn test_paid_and_total_over_hundred() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({
            "type": "select",
            "tableName": "orders",
            "filters": {"op": "and", "conditions": [
                {"attribute": "status", "op": "is", "value": "paid"},
                {"attribute": "total", "op": "greater_than", "value": 100}
            ]},
            "sorts": [{"attribute": "id", "direction": "asc"}]
        }))
        .unwrap();

    let r = &results[0];
    assert_eq!(ids(&r.result), vec![1, 7]);
    assert_eq!(
        r.raw_sql,
        "SELECT * FROM \"orders\" WHERE \"status\" = 'paid' AND \"total\" > 100 ORDER BY \"id\" ASC"
    );
    assert_eq!(r.bindings, vec![json!("paid"), json!(100)]);
}

#[test]
fn test_nested_or_group() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({
            "type": "select",
            "tableName": "orders",
            "filters": {"op": "or", "conditions": [
                {"op": "and", "conditions": [
                    {"attribute": "status", "op": "is", "value": "paid"},
                    {"attribute": "total", "op": "less_than", "value": 100}
                ]},
                {"attribute": "status", "op": "is", "value": "open"}
            ]},
            "sorts": [{"attribute": "id", "direction": "asc"}]
        }))
        .unwrap();

    assert_eq!(ids(&results[0].result), vec![2, 3]);
}

#[test]
fn test_contains_ignores_case() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({
            "type": "select",
            "tableName": "orders",
            "filters": {"op": "and", "conditions": [
                {"attribute": "customer", "op": "contains", "value": "ADA"}
            ]},
            "sorts": [{"attribute": "id", "direction": "asc"}]
        }))
        .unwrap();

    assert_eq!(ids(&results[0].result), vec![1, 3]);
    assert_eq!(results[0].bindings, vec![json!("%ada%")]);
}

#[test]
fn test_date_preset_range() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({
            "type": "select",
            "tableName": "orders",
            "filters": {"op": "and", "conditions": [
                {"attribute": "due_on", "op": "is", "value": "last_7_days"}
            ]},
            "sorts": [{"attribute": "id", "direction": "asc"}]
        }))
        .unwrap();

    assert_eq!(ids(&results[0].result), vec![2, 3]);
}

#[test]
fn test_json_path_attribute_is_aliased() {
    let store = MemoryStore::from_value(&json!({
        "products": [
            {"id": 1, "meta": "{\"info\": {\"color\": \"red\"}}"},
            {"id": 2, "meta": {"info": {"color": "blue"}}}
        ]
    }))
    .unwrap();
    let mut ex = executor(store);
    let results = ex
        .run_json(&json!({
            "type": "select",
            "tableName": "products",
            "attributes": ["id", "meta->info->color"],
            "sorts": [{"attribute": "id", "direction": "asc"}]
        }))
        .unwrap();

    assert_eq!(
        results[0].result,
        json!([
            {"id": 1, "meta_info_color": "red"},
            {"id": 2, "meta_info_color": "blue"}
        ])
    );
}

// =============================================================================
// WRITE RESULTS
// =============================================================================

#[test]
fn test_delete_by_id_reports_one_row() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({
            "type": "delete",
            "tableName": "orders",
            "filters": {"op": "and", "conditions": [{"attribute": "id", "op": "is", "value": 7}]}
        }))
        .unwrap();

    assert_eq!(results[0].result, json!({"rows_affected": 1}));
    assert!(results[0].sql.starts_with("DELETE FROM \"orders\""));
    assert_eq!(ex.store().table("orders").unwrap().len(), 3);
}

#[test]
fn test_soft_delete_stamps_column() {
    let mut ex = executor(orders());
    ex.run_json(&json!({
        "type": "delete",
        "tableName": "orders",
        "deleteColumn": "deleted_at",
        "filters": {"op": "and", "conditions": [{"attribute": "id", "op": "is", "value": 2}]}
    }))
    .unwrap();

    let rows = ex.store().table("orders").unwrap();
    assert_eq!(rows.len(), 4);
    let stamped = rows.iter().find(|r| r["id"] == json!(2)).unwrap();
    assert_eq!(stamped["deleted_at"], json!("2024-05-15 00:00:00"));

    let results = ex
        .run_json(&json!({"type": "count", "tableName": "orders", "deleteColumn": "deleted_at"}))
        .unwrap();
    assert_eq!(results[0].result, json!({"count": 3}));
}

#[test]
fn test_bulk_insert_echoes_rows() {
    let mut ex = executor(orders());
    let data = json!([
        {"status": "open", "total": 1},
        {"status": "open", "total": 2}
    ]);
    let results = ex
        .run_json(&json!({"type": "insert", "tableName": "orders", "data": data.clone()}))
        .unwrap();

    assert_eq!(results[0].result, data);
    assert_eq!(ex.store().table("orders").unwrap().len(), 6);
}

#[test]
fn test_update_reports_rows_affected() {
    let mut ex = executor(orders());
    let results = ex
        .run_json(&json!({
            "type": "update",
            "tableName": "orders",
            "data": {"status": "archived"},
            "filters": {"op": "and", "conditions": [{"attribute": "status", "op": "is", "value": "paid"}]}
        }))
        .unwrap();

    assert_eq!(results[0].result, json!({"rows_affected": 3}));
}

// =============================================================================
// QUERY LOG
// =============================================================================

#[test]
fn test_query_log_tracks_executed_operations() {
    let mut ex = executor(orders());
    ex.run_json(&json!([
        {"type": "select", "tableName": "orders", "attributes": ["id"]},
        {"type": "count", "tableName": "orders"}
    ]))
    .unwrap();

    let log = ex.query_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].sql, "SELECT \"id\" FROM \"orders\"");
    assert!(log[1].bindings.is_empty());

    ex.clear_query_log();
    assert!(ex.query_log().is_empty());
}
