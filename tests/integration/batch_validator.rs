#![allow(missing_docs)]

use draftgraph::validator::{parse_batch, validate_batch};
use draftgraph::GraphError;
use serde_json::json;

fn expect_shape(raw: serde_json::Value) -> String {
    match validate_batch(&raw) {
        Err(GraphError::Shape(message)) => message,
        other => panic!("expected shape error, got {other:?}"),
    }
}

fn empty_batch() -> serde_json::Value {
    json!({
        "txnId": 1,
        "vertexIdMap": [],
        "edgeIdMap": [],
        "transactions": []
    })
}

#[test]
fn accepts_a_well_formed_batch() {
    let raw = json!({
        "txnId": 7,
        "vertexIdMap": [["tmp-1", "v-9"]],
        "edgeIdMap": [],
        "transactions": [
            {"insert": {"id": "tmp-2", "label": "Person", "properties": {"name": "Alice"}}},
            {"insertEdge": {"id": "tmp-3", "type": "Knows", "start": "tmp-2",
                             "end": "v-9", "properties": {}}},
            {"deleteVertex": {"id": "v-9", "label": "Person", "properties": {}}}
        ]
    });
    let request = parse_batch(&raw.to_string()).expect("valid batch");
    assert_eq!(request.txn_id, 7);
    assert_eq!(request.transactions.len(), 3);
    assert_eq!(request.vertex_id_map, vec![("tmp-1".to_string(), "v-9".to_string())]);
}

#[test]
fn rejects_missing_required_keys() {
    let message = expect_shape(json!({
        "txnId": 1,
        "vertexIdMap": [],
        "transactions": []
    }));
    assert!(message.contains("edgeIdMap"), "got: {message}");
}

#[test]
fn rejects_id_map_entries_that_are_not_pairs() {
    let mut raw = empty_batch();
    raw["vertexIdMap"] = json!([["tmp-1", "v-1", "extra"]]);
    let message = expect_shape(raw);
    assert!(message.contains("exactly 2 elements"), "got: {message}");

    let mut raw = empty_batch();
    raw["edgeIdMap"] = json!([["tmp-1"]]);
    let message = expect_shape(raw);
    assert!(message.contains("exactly 2 elements"), "got: {message}");
}

#[test]
fn rejects_vertex_payload_without_label() {
    let mut raw = empty_batch();
    raw["transactions"] = json!([
        {"insert": {"id": "tmp-1", "properties": {}}}
    ]);
    let message = expect_shape(raw);
    assert!(message.contains("label"), "got: {message}");
}

#[test]
fn rejects_vertex_payload_without_property_map() {
    let mut raw = empty_batch();
    raw["transactions"] = json!([
        {"merge": {"id": "tmp-1", "label": "Person", "properties": "oops"}}
    ]);
    let message = expect_shape(raw);
    assert!(message.contains("property map"), "got: {message}");
}

#[test]
fn rejects_edge_payload_missing_endpoint() {
    let mut raw = empty_batch();
    raw["transactions"] = json!([
        {"insertEdge": {"id": "tmp-1", "type": "Knows", "start": "a", "properties": {}}}
    ]);
    let message = expect_shape(raw);
    assert!(message.contains("end"), "got: {message}");
}

#[test]
fn rejects_unknown_and_doubled_operations() {
    let mut raw = empty_batch();
    raw["transactions"] = json!([{"upsert": {"id": "x"}}]);
    let message = expect_shape(raw);
    assert!(message.contains("unknown operation"), "got: {message}");

    let mut raw = empty_batch();
    raw["transactions"] = json!([{
        "insert": {"id": "a", "label": "A", "properties": {}},
        "merge": {"id": "b", "label": "B", "properties": {}}
    }]);
    let message = expect_shape(raw);
    assert!(message.contains("exactly one operation"), "got: {message}");
}

#[test]
fn reports_the_first_violation_with_its_position() {
    let mut raw = empty_batch();
    raw["transactions"] = json!([
        {"insert": {"id": "ok", "label": "A", "properties": {}}},
        {"deleteEdge": {"id": "bad", "start": "a", "end": "b", "properties": {}}}
    ]);
    let message = expect_shape(raw);
    assert!(message.contains("transactions[1]"), "got: {message}");
    assert!(message.contains("type"), "got: {message}");
}

#[test]
fn rejects_non_numeric_txn_id() {
    let mut raw = empty_batch();
    raw["txnId"] = json!("seven");
    let message = expect_shape(raw);
    assert!(message.contains("txnId"), "got: {message}");
}

#[test]
fn rejects_invalid_json_before_any_store_access() {
    assert!(matches!(
        parse_batch("{not json"),
        Err(GraphError::Shape(_))
    ));
}
