#![allow(missing_docs)]

use std::sync::Once;

use draftgraph::{
    EdgeId, GraphError, Mutation, PropertyMap, PropertyValue, Result, Session, SqliteGraphStore,
    VertexId,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("draftgraph=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn props(entries: &[(&str, PropertyValue)]) -> PropertyMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn alice_scenario_end_to_end() -> Result<()> {
    init_tracing();
    let mut session = Session::new();
    let mut server = SqliteGraphStore::open_in_memory()?;
    let txn = session.begin();

    session.insert_vertex(
        txn,
        VertexId::new("tmp-1"),
        "Person",
        props(&[("name", "Alice".into())]),
    )?;
    session.merge_vertex_properties(txn, &VertexId::new("tmp-1"), props(&[("age", 30.into())]))?;

    let request = session.prepare_commit(txn)?;
    // The batch carries the net state for tmp-1: both properties.
    let Mutation::Insert(insert) = &request.transactions[0] else {
        panic!("first mutation should be an insert");
    };
    assert_eq!(insert.id, "tmp-1");
    assert_eq!(insert.label, "Person");
    assert_eq!(insert.properties["name"], PropertyValue::from("Alice"));
    assert_eq!(insert.properties["age"], PropertyValue::from(30));

    let response = server.apply_commit(&request)?;
    assert_eq!(
        response.client_to_server_vertex_id_map,
        vec![("tmp-1".to_string(), "v-1".to_string())]
    );

    let outcome = session.apply_commit_response(&response)?;
    assert!(outcome.is_clean());

    let vertex = session.store().vertex(&VertexId::new("v-1")).unwrap();
    assert_eq!(vertex.properties["name"], PropertyValue::from("Alice"));
    assert_eq!(vertex.properties["age"], PropertyValue::from(30));
    assert!(session.store().vertex(&VertexId::new("tmp-1")).is_none());

    // Committed transactions accept no further local mutation.
    assert!(session.is_empty(txn)?);
    assert!(matches!(
        session.merge_vertex_properties(txn, &VertexId::new("v-1"), PropertyMap::new()),
        Err(GraphError::TransactionClosed(_))
    ));
    Ok(())
}

#[test]
fn commit_rewrites_edge_endpoints_and_adjacency() -> Result<()> {
    let mut session = Session::new();
    let mut server = SqliteGraphStore::open_in_memory()?;
    let txn = session.begin();

    let alice = session.mint_vertex_id();
    let bob = session.mint_vertex_id();
    let likes = session.mint_edge_id();
    session.insert_vertex(txn, alice.clone(), "Person", PropertyMap::new())?;
    session.insert_vertex(txn, bob.clone(), "Person", PropertyMap::new())?;
    session.insert_edge(
        txn,
        likes.clone(),
        "Likes",
        alice.clone(),
        bob.clone(),
        PropertyMap::new(),
    )?;

    let request = session.prepare_commit(txn)?;
    let response = server.apply_commit(&request)?;
    session.apply_commit_response(&response)?;

    // No entity key or edge endpoint still uses a mapped temporary id.
    for id in session.store().vertex_ids() {
        assert!(!id.is_temporary(), "vertex {id} left unreconciled");
    }
    for id in session.store().edge_ids() {
        assert!(!id.is_temporary(), "edge {id} left unreconciled");
    }
    let edge = session.store().edge(&EdgeId::new("e-1")).unwrap();
    assert!(!edge.source.is_temporary());
    assert!(!edge.target.is_temporary());
    let source = session.store().vertex(&edge.source).unwrap();
    assert!(source.outgoing["Likes"].contains(&EdgeId::new("e-1")));

    // The server stored the permanent endpoints.
    let stored = server.edge("e-1")?.unwrap();
    assert_eq!(stored.start, edge.source.as_str());
    assert_eq!(stored.end, edge.target.as_str());
    Ok(())
}

#[test]
fn insert_then_delete_ships_both_operations() -> Result<()> {
    let mut session = Session::new();
    let mut server = SqliteGraphStore::open_in_memory()?;
    let txn = session.begin();

    let id = session.mint_vertex_id();
    session.insert_vertex(txn, id.clone(), "Scratch", props(&[("kept", false.into())]))?;
    session.delete_vertex(txn, &id)?;

    let request = session.prepare_commit(txn)?;
    assert_eq!(request.transactions.len(), 2);
    assert!(matches!(request.transactions[0], Mutation::Insert(_)));
    assert!(matches!(request.transactions[1], Mutation::DeleteVertex(_)));
    // The insert payload is served from the delete step's snapshot.
    let Mutation::Insert(insert) = &request.transactions[0] else {
        unreachable!();
    };
    assert_eq!(insert.properties["kept"], PropertyValue::from(false));

    let response = server.apply_commit(&request)?;
    assert_eq!(response.data.len(), 2);
    assert_eq!(server.vertex_count()?, 0);

    session.apply_commit_response(&response)?;
    assert_eq!(session.store().vertex_count(), 0);
    Ok(())
}

#[test]
fn second_prepare_while_in_flight_is_rejected() -> Result<()> {
    let mut session = Session::new();
    let txn = session.begin();
    session.insert_vertex(txn, VertexId::new("tmp-1"), "Person", PropertyMap::new())?;

    let _request = session.prepare_commit(txn)?;
    assert!(matches!(
        session.prepare_commit(txn),
        Err(GraphError::TransactionClosed(_))
    ));
    // No local mutation or revert while the commit is in flight.
    assert!(matches!(
        session.insert_vertex(txn, VertexId::new("tmp-2"), "Person", PropertyMap::new()),
        Err(GraphError::TransactionClosed(_))
    ));
    assert!(matches!(
        session.revert_all(txn),
        Err(GraphError::TransactionClosed(_))
    ));

    // A failed send reopens the transaction for retry.
    session.commit_failed(txn)?;
    let retry = session.prepare_commit(txn)?;
    assert_eq!(retry.transactions.len(), 1);
    Ok(())
}

#[test]
fn known_id_maps_ride_along_on_later_batches() -> Result<()> {
    let mut session = Session::new();
    let mut server = SqliteGraphStore::open_in_memory()?;

    let first = session.begin();
    let alice = session.mint_vertex_id();
    session.insert_vertex(first, alice.clone(), "Person", PropertyMap::new())?;
    let response = server.apply_commit(&session.prepare_commit(first)?)?;
    session.apply_commit_response(&response)?;

    // A later transaction's batch carries the learned mapping so the server
    // can resolve cross-batch references before a full round trip.
    let second = session.begin();
    session.merge_vertex_properties(
        second,
        &VertexId::new("v-1"),
        props(&[("age", 31.into())]),
    )?;
    let request = session.prepare_commit(second)?;
    assert!(request
        .vertex_id_map
        .contains(&(alice.as_str().to_string(), "v-1".to_string())));

    let response = server.apply_commit(&request)?;
    session.apply_commit_response(&response)?;
    let stored = server.vertex("v-1")?.unwrap();
    assert_eq!(stored.properties["age"], PropertyValue::from(31));
    Ok(())
}

#[test]
fn merge_payload_carries_net_values_of_patched_keys() -> Result<()> {
    let mut session = Session::new();
    let txn = session.begin();
    let id = VertexId::new("tmp-1");

    session.insert_vertex(txn, id.clone(), "Person", PropertyMap::new())?;
    session.merge_vertex_properties(txn, &id, props(&[("age", 30.into())]))?;
    // A later merge of the same key wins; both steps serialize the net value.
    session.merge_vertex_properties(txn, &id, props(&[("age", 31.into())]))?;

    let request = session.prepare_commit(txn)?;
    for mutation in &request.transactions[1..] {
        let Mutation::Merge(merge) = mutation else {
            panic!("expected merge mutations");
        };
        assert_eq!(merge.properties["age"], PropertyValue::from(31));
    }
    Ok(())
}

#[test]
fn wire_shapes_round_trip_through_json() -> Result<()> {
    let mut session = Session::new();
    let txn = session.begin();
    session.insert_vertex(
        txn,
        VertexId::new("tmp-1"),
        "Person",
        props(&[("name", "Alice".into())]),
    )?;
    let request = session.prepare_commit(txn)?;

    let raw = serde_json::to_value(&request).expect("serialize");
    assert_eq!(raw["txnId"], txn);
    assert!(raw["vertexIdMap"].is_array());
    assert_eq!(raw["transactions"][0]["insert"]["id"], "tmp-1");
    assert_eq!(raw["transactions"][0]["insert"]["label"], "Person");
    assert_eq!(
        raw["transactions"][0]["insert"]["properties"]["name"],
        "Alice"
    );
    Ok(())
}
