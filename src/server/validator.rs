//! Structural validation of commit batches.
//!
//! Every check here runs before any backing-store access; the first violated
//! rule short-circuits with a `Shape` error naming it. A batch that passes
//! deserializes losslessly into the closed [`CommitRequest`] union.

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::wire::CommitRequest;

const REQUIRED_KEYS: [&str; 4] = ["txnId", "vertexIdMap", "edgeIdMap", "transactions"];
const VERTEX_OPS: [&str; 4] = ["insert", "replace", "merge", "deleteVertex"];
const EDGE_OPS: [&str; 3] = ["insertEdge", "replaceEdge", "deleteEdge"];

/// Parses and validates a raw JSON batch.
pub fn parse_batch(raw: &str) -> Result<CommitRequest> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| GraphError::Shape(format!("batch is not valid JSON: {err}")))?;
    validate_batch(&value)?;
    serde_json::from_value(value)
        .map_err(|err| GraphError::Shape(format!("batch failed to deserialize: {err}")))
}

/// Validates an already-parsed JSON batch.
pub fn validate_batch(batch: &Value) -> Result<()> {
    let obj = batch
        .as_object()
        .ok_or_else(|| shape("batch must be a JSON object"))?;
    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(shape(format!("missing required key {key:?}")));
        }
    }
    if !obj["txnId"].is_u64() {
        return Err(shape("txnId must be an unsigned integer"));
    }
    check_id_map(&obj["vertexIdMap"], "vertexIdMap")?;
    check_id_map(&obj["edgeIdMap"], "edgeIdMap")?;

    let transactions = obj["transactions"]
        .as_array()
        .ok_or_else(|| shape("transactions must be an array"))?;
    for (index, mutation) in transactions.iter().enumerate() {
        check_mutation(mutation, index)?;
    }
    Ok(())
}

fn check_id_map(value: &Value, name: &str) -> Result<()> {
    let entries = value
        .as_array()
        .ok_or_else(|| shape(format!("{name} must be an array")))?;
    for (index, entry) in entries.iter().enumerate() {
        let pair = entry
            .as_array()
            .ok_or_else(|| shape(format!("{name}[{index}] must be an array")))?;
        if pair.len() != 2 {
            return Err(shape(format!(
                "{name}[{index}] must have exactly 2 elements, got {}",
                pair.len()
            )));
        }
        if !pair.iter().all(Value::is_string) {
            return Err(shape(format!("{name}[{index}] entries must be strings")));
        }
    }
    Ok(())
}

fn check_mutation(mutation: &Value, index: usize) -> Result<()> {
    let obj = mutation
        .as_object()
        .ok_or_else(|| shape(format!("transactions[{index}] must be an object")))?;
    if obj.len() != 1 {
        return Err(shape(format!(
            "transactions[{index}] must contain exactly one operation, got {}",
            obj.len()
        )));
    }
    let (op, payload) = obj.iter().next().ok_or_else(|| {
        shape(format!("transactions[{index}] must contain one operation"))
    })?;
    if VERTEX_OPS.contains(&op.as_str()) {
        check_vertex_payload(payload, index, op)
    } else if EDGE_OPS.contains(&op.as_str()) {
        check_edge_payload(payload, index, op)
    } else {
        Err(shape(format!(
            "transactions[{index}] has unknown operation {op:?}"
        )))
    }
}

fn check_vertex_payload(payload: &Value, index: usize, op: &str) -> Result<()> {
    let obj = payload
        .as_object()
        .ok_or_else(|| shape(format!("transactions[{index}].{op} must be an object")))?;
    if !obj.get("label").map(Value::is_string).unwrap_or(false) {
        return Err(shape(format!(
            "transactions[{index}].{op} must carry exactly one label"
        )));
    }
    if !obj.get("properties").map(Value::is_object).unwrap_or(false) {
        return Err(shape(format!(
            "transactions[{index}].{op} must carry a property map"
        )));
    }
    if !obj.get("id").map(Value::is_string).unwrap_or(false) {
        return Err(shape(format!("transactions[{index}].{op} must carry an id")));
    }
    Ok(())
}

fn check_edge_payload(payload: &Value, index: usize, op: &str) -> Result<()> {
    let obj = payload
        .as_object()
        .ok_or_else(|| shape(format!("transactions[{index}].{op} must be an object")))?;
    for field in ["type", "start", "end", "id"] {
        if !obj.get(field).map(Value::is_string).unwrap_or(false) {
            return Err(shape(format!(
                "transactions[{index}].{op} must carry a {field}"
            )));
        }
    }
    if !obj.get("properties").map(Value::is_object).unwrap_or(false) {
        return Err(shape(format!(
            "transactions[{index}].{op} must carry a property map"
        )));
    }
    Ok(())
}

fn shape(message: impl Into<String>) -> GraphError {
    GraphError::Shape(message.into())
}
