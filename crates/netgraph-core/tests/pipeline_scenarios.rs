//! End-to-end runs over small SQLite arc tables.
//!
//! Each scenario builds a `roads` table in memory, runs the full
//! validate-then-build pipeline and inspects the report or the decoded
//! NETWORK-DATA table.

use netgraph_core::config::NetworkConfig;
use netgraph_core::db;
use netgraph_core::diagnostics::Diagnostic;
use netgraph_core::error::ErrorCode;
use netgraph_core::expand::{ArcDirection, DirectionPolicy, OnewaySign, expand_signed};
use netgraph_core::geometry::{GeometryService, WkbGeometry};
use netgraph_core::pipeline::{self, RunError, RunOutcome, VirtualOutcome};
use netgraph_core::validate::Stage;
use netgraph_core::{IdentityKind, NodeIdentity};
use rusqlite::{Connection, ToSql, params};
use rusqlite::types::Value;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn roads_db() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(
        "CREATE TABLE roads (
            id INTEGER PRIMARY KEY,
            node_from,
            node_to,
            geom TEXT,
            cost REAL,
            fromto INTEGER,
            tofrom INTEGER
        )",
    )
    .expect("create roads");
    conn
}

fn road(conn: &Connection, id: i64, from: &dyn ToSql, to: &dyn ToSql, geom: &str, cost: f64) {
    conn.execute(
        "INSERT INTO roads (id, node_from, node_to, geom, cost, fromto, tofrom)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, 1)",
        params![id, from, to, geom, cost],
    )
    .expect("insert road");
}

fn config() -> NetworkConfig {
    NetworkConfig {
        table: Some("roads".into()),
        from_column: Some("node_from".into()),
        to_column: Some("node_to".into()),
        geometry_column: Some("geom".into()),
        cost_column: Some("cost".into()),
        ..NetworkConfig::default()
    }
}

fn with_output(mut config: NetworkConfig) -> NetworkConfig {
    config.output_table = Some("roads_net".into());
    config
}

fn run(conn: &mut Connection, config: &NetworkConfig) -> RunOutcome {
    let settings = config.resolve().expect("valid options");
    pipeline::run(conn, &settings).expect("pipeline run")
}

fn chain(conn: &Connection) {
    road(conn, 1, &1, &2, "LINESTRING(0 0, 1 0)", 2.0);
    road(conn, 2, &2, &3, "LINESTRING(1 0, 1 2)", 3.0);
    road(conn, 3, &3, &4, "LINESTRING(1 2, 4 6)", 10.0);
}

// ---------------------------------------------------------------------------
// Valid graphs
// ---------------------------------------------------------------------------

#[test]
fn valid_chain_round_trips_through_network_data() {
    let mut conn = roads_db();
    chain(&conn);

    let outcome = run(&mut conn, &with_output(config()));
    assert!(outcome.report.is_valid(), "{:?}", outcome.report.diagnostics);
    let summary = outcome.output.expect("network data written");
    assert_eq!(summary.nodes, 4);
    assert_eq!(summary.arcs, 6);
    assert_eq!(outcome.virtual_table, VirtualOutcome::Skipped);

    let stats = outcome.report.stats.expect("stats for a valid graph");
    assert_eq!(stats.node_count, 4);
    assert_eq!(stats.arc_count, 6);

    let decoded = db::load_network_data(&conn, "roads_net").expect("decode output");
    assert_eq!(decoded.header.node_count, 4);
    assert_eq!(decoded.header.kind, IdentityKind::Integer);
    assert_eq!(decoded.header.table, "roads");
    assert_eq!(decoded.nodes.len(), 4);
    assert_eq!(decoded.arc_count(), 6);
    let identities: Vec<_> = decoded.nodes.iter().map(|n| n.identity.clone()).collect();
    assert_eq!(
        identities,
        (1..=4).map(NodeIdentity::integer).collect::<Vec<_>>()
    );
}

#[test]
fn text_codes_are_sorted_bytewise() {
    let mut conn = roads_db();
    road(&conn, 1, &"b", &"a", "LINESTRING(0 0, 1 0)", 1.0);
    road(&conn, 2, &"a", &"C", "LINESTRING(1 0, 2 0)", 1.0);

    let outcome = run(&mut conn, &with_output(config()));
    assert!(outcome.report.is_valid(), "{:?}", outcome.report.diagnostics);

    let decoded = db::load_network_data(&conn, "roads_net").expect("decode output");
    assert_eq!(decoded.header.kind, IdentityKind::Code);
    assert_eq!(decoded.header.max_code_len, 2);
    let codes: Vec<_> = decoded.nodes.iter().map(|n| n.identity.to_string()).collect();
    assert_eq!(codes, ["C", "a", "b"]);
}

#[test]
fn zero_rows_build_an_empty_network() {
    let mut conn = roads_db();

    let outcome = run(&mut conn, &with_output(config()));
    assert!(outcome.report.is_valid());
    let stats = outcome.report.stats.expect("stats");
    assert_eq!(stats.node_count, 0);
    assert_eq!(stats.arc_count, 0);
    let summary = outcome.output.expect("header written");
    assert_eq!(summary.blocks, 0);

    let decoded = db::load_network_data(&conn, "roads_net").expect("decode output");
    assert_eq!(decoded.header.node_count, 0);
    assert!(decoded.nodes.is_empty());
}

#[test]
fn validation_is_idempotent() {
    let mut conn = roads_db();
    chain(&conn);
    road(&conn, 4, &4, &4, "LINESTRING(4 6, 5 6, 4 6)", 1.0);

    let first = run(&mut conn, &config());
    let second = run(&mut conn, &config());
    assert_eq!(
        serde_json::to_value(&first.report).expect("serialize"),
        serde_json::to_value(&second.report).expect("serialize")
    );
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

#[test]
fn one_way_row_yields_a_single_forward_arc() {
    let mut conn = roads_db();
    road(&conn, 1, &1, &2, "LINESTRING(0 0, 1 0)", 1.0);
    conn.execute("UPDATE roads SET tofrom = 0", [])
        .expect("mark one-way");

    let mut config = config();
    config.oneway_fromto = Some("fromto".into());
    config.oneway_tofrom = Some("tofrom".into());
    let outcome = run(&mut conn, &config);

    let graph = outcome.report.graph.expect("graph");
    assert_eq!(graph.arc_count(), 1);
    let one = graph.find(&NodeIdentity::integer(1)).expect("node 1");
    let two = graph.find(&NodeIdentity::integer(2)).expect("node 2");
    let arcs = graph.outgoing(one);
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].to, two);
    assert!(graph.outgoing(two).is_empty());
}

#[test]
fn row_closed_both_ways_is_only_a_warning() {
    let mut conn = roads_db();
    road(&conn, 1, &1, &2, "LINESTRING(0 0, 1 0)", 1.0);
    road(&conn, 2, &2, &3, "LINESTRING(1 0, 2 0)", 1.0);
    conn.execute("UPDATE roads SET fromto = 0, tofrom = 0 WHERE id = 2", [])
        .expect("close row");

    let mut config = with_output(config());
    config.oneway_fromto = Some("fromto".into());
    config.oneway_tofrom = Some("tofrom".into());
    let outcome = run(&mut conn, &config);

    assert!(outcome.report.is_valid());
    assert_eq!(outcome.report.warning_count(), 1);
    assert!(matches!(
        outcome.report.diagnostics[0],
        Diagnostic::BothDirectionsForbidden { row_id: 2, .. }
    ));
    let stats = outcome.report.stats.expect("stats");
    assert_eq!(stats.node_count, 3);
    assert_eq!(stats.arc_count, 2);
    assert!(outcome.output.is_some());
}

#[test]
fn unidirectional_policy_keeps_row_direction() {
    let mut conn = roads_db();
    chain(&conn);

    let mut config = config();
    config.direction = Some(DirectionPolicy::Unidirectional);
    let outcome = run(&mut conn, &config);

    let stats = outcome.report.stats.expect("stats");
    assert_eq!(stats.arc_count, 3);
    assert_eq!(stats.max_in_degree, 1);
}

#[test]
fn reverse_sign_walks_the_geometry_backwards() {
    let line = WkbGeometry
        .line(&Value::Text("LINESTRING(0 0, 1 0, 2 1)".into()))
        .expect("parse line");

    let directed = expand_signed(OnewaySign::from(-1), false, &line);
    assert_eq!(directed.len(), 1);
    assert_eq!(directed[0].direction, ArcDirection::Reverse);
    let xs: Vec<_> = directed[0].line.points.iter().map(|p| p.x).collect();
    assert_eq!(xs, [2.0, 1.0, 0.0]);
}

// ---------------------------------------------------------------------------
// Topology defects
// ---------------------------------------------------------------------------

#[test]
fn closed_ring_is_rejected_without_growing_the_graph() {
    let mut conn = roads_db();
    chain(&conn);
    road(&conn, 7, &2, &2, "LINESTRING(1 0, 2 2, 1 0)", 1.0);

    let outcome = run(&mut conn, &with_output(config()));
    let report = &outcome.report;
    assert_eq!(report.stage, Stage::Topology);
    assert!(!report.is_valid());
    assert_eq!(report.fatal_count(), 1);
    assert!(matches!(
        report.diagnostics[0],
        Diagnostic::SelfLoopArc { row_id: 7 }
    ));
    assert!(report.graph.is_none());
    assert!(outcome.output.is_none());
    assert!(!db::relation_exists(&conn, "roads_net").expect("catalog"));
}

#[test]
fn shared_endpoint_with_two_coordinates_reports_once() {
    let mut conn = roads_db();
    road(&conn, 1, &1, &2, "LINESTRING(0 0, 1 0)", 1.0);
    road(&conn, 2, &2, &3, "LINESTRING(5 5, 6 6)", 1.0);

    let outcome = run(&mut conn, &config());
    let conflicts: Vec<_> = outcome
        .report
        .diagnostics
        .iter()
        .filter(|d| d.code() == ErrorCode::CoordinateConflict)
        .collect();
    assert_eq!(conflicts.len(), 1);
    match conflicts[0] {
        Diagnostic::CoordinateConflict {
            row_id, identity, ..
        } => {
            assert_eq!(*row_id, 2);
            assert_eq!(*identity, NodeIdentity::integer(2));
        }
        other => panic!("unexpected diagnostic {other:?}"),
    }
}

#[test]
fn non_positive_costs_are_batched() {
    let mut conn = roads_db();
    chain(&conn);
    conn.execute("UPDATE roads SET cost = -1 WHERE id = 1", [])
        .expect("negative cost");
    conn.execute("UPDATE roads SET cost = 0 WHERE id = 3", [])
        .expect("zero cost");

    let outcome = run(&mut conn, &config());
    let rows: Vec<_> = outcome
        .report
        .diagnostics
        .iter()
        .filter(|d| d.code() == ErrorCode::NonPositiveCost)
        .filter_map(Diagnostic::row_id)
        .collect();
    assert_eq!(rows, [1, 3]);
    assert!(outcome.report.stats.is_none());
}

// ---------------------------------------------------------------------------
// Schema and types
// ---------------------------------------------------------------------------

#[test]
fn every_missing_column_is_reported() {
    let mut conn = roads_db();
    let mut config = config();
    config.cost_column = Some("speed".into());
    config.name_column = Some("label".into());

    let outcome = run(&mut conn, &config);
    assert_eq!(outcome.report.stage, Stage::Schema);
    let codes: Vec<_> = outcome.report.diagnostics.iter().map(Diagnostic::code).collect();
    assert_eq!(codes, [ErrorCode::ColumnNotFound, ErrorCode::ColumnNotFound]);
}

#[test]
fn missing_table_stops_before_scanning() {
    let mut conn = roads_db();
    let mut config = config();
    config.table = Some("streets".into());

    let outcome = run(&mut conn, &config);
    assert_eq!(outcome.report.rows, 0);
    assert!(matches!(
        outcome.report.diagnostics.as_slice(),
        [Diagnostic::MissingTable { .. }]
    ));
}

#[test]
fn mixed_node_types_stop_after_pass_a() {
    let mut conn = roads_db();
    road(&conn, 1, &1, &2, "LINESTRING(0 0, 1 0)", 1.0);
    road(&conn, 2, &"a", &3, "LINESTRING(1 0, 2 0)", 1.0);

    let outcome = run(&mut conn, &config());
    assert_eq!(outcome.report.stage, Stage::Types);
    assert!(outcome.report.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::MixedNodeTypes {
            from: None,
            to: Some(IdentityKind::Integer)
        }
    )));
}

#[test]
fn point_geometry_is_a_type_inconsistency() {
    let mut conn = roads_db();
    road(&conn, 1, &1, &2, "POINT(0 0)", 1.0);

    let outcome = run(&mut conn, &config());
    assert_eq!(outcome.report.stage, Stage::Types);
    assert_eq!(
        outcome.report.diagnostics[0].code(),
        ErrorCode::TypeInconsistency
    );
}

// ---------------------------------------------------------------------------
// A* coefficient
// ---------------------------------------------------------------------------

#[test]
fn coefficient_is_the_smallest_cost_per_length() {
    let mut conn = roads_db();
    chain(&conn);

    let outcome = run(&mut conn, &with_output(config()));
    assert_eq!(outcome.report.a_star_coefficient, Some(1.5));
    let decoded = db::load_network_data(&conn, "roads_net").expect("decode output");
    assert_eq!(decoded.header.a_star_coefficient, Some(1.5));
    assert!(decoded.nodes.iter().all(|n| n.coordinate.is_some()));
}

#[test]
fn omitted_cost_column_fixes_coefficient_at_one() {
    let mut conn = roads_db();
    chain(&conn);
    let mut config = with_output(config());
    config.cost_column = None;

    let outcome = run(&mut conn, &config);
    assert_eq!(outcome.report.a_star_coefficient, Some(1.0));
    let decoded = db::load_network_data(&conn, "roads_net").expect("decode output");
    assert_eq!(decoded.header.a_star_coefficient, Some(1.0));
}

#[test]
fn disabled_geometry_builds_without_coordinates() {
    let mut conn = roads_db();
    chain(&conn);
    let mut config = with_output(config());
    config.geometry_column = Some("NONE".into());

    let outcome = run(&mut conn, &config);
    assert!(outcome.report.is_valid());
    assert_eq!(outcome.report.a_star_coefficient, None);
    let decoded = db::load_network_data(&conn, "roads_net").expect("decode output");
    assert_eq!(decoded.header.geometry_column, None);
    assert!(decoded.nodes.iter().all(|n| n.coordinate.is_none()));
}

// ---------------------------------------------------------------------------
// Output table handling
// ---------------------------------------------------------------------------

#[test]
fn existing_output_table_needs_overwrite() {
    let mut conn = roads_db();
    chain(&conn);
    conn.execute_batch("CREATE TABLE roads_net (x)")
        .expect("seed output");

    let settings = with_output(config()).resolve().expect("valid options");
    let err = pipeline::run(&mut conn, &settings).expect_err("output exists");
    assert!(matches!(err, RunError::OutputTableExists(_)));
    assert_eq!(err.code(), ErrorCode::OutputTableExists);

    let mut config = with_output(config());
    config.overwrite_output = Some(true);
    let outcome = run(&mut conn, &config);
    assert!(outcome.output.is_some());
    assert_eq!(
        db::load_network_data(&conn, "roads_net")
            .expect("decode output")
            .arc_count(),
        6
    );
}

#[test]
fn virtual_table_failure_is_not_fatal() {
    let mut conn = roads_db();
    chain(&conn);
    let mut config = with_output(config());
    config.virtual_table = Some("roads_vnet".into());

    let outcome = run(&mut conn, &config);
    assert!(outcome.output.is_some());
    assert!(matches!(
        outcome.virtual_table,
        VirtualOutcome::Failed { ref table, .. } if table == "roads_vnet"
    ));
    assert!(db::relation_exists(&conn, "roads_net").expect("catalog"));
}
