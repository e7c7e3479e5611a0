//! E2E tests for `netgraph inspect`.

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn netgraph() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netgraph"));
    cmd.env("NETGRAPH_LOG", "error");
    cmd.env_remove("NETGRAPH_FORMAT");
    cmd
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

/// Build `streets_net` from a three-arc network keyed by text codes.
fn built_network(dir: &Path) -> PathBuf {
    let db = dir.join("streets.sqlite");
    let conn = Connection::open(&db).expect("create db");
    conn.execute_batch(
        "CREATE TABLE streets (node_a TEXT, node_b TEXT, shape BLOB, name TEXT);
         INSERT INTO streets VALUES ('north', 'centre', 'LINESTRING(0 10, 0 0)', 'Main St');
         INSERT INTO streets VALUES ('centre', 'south', 'LINESTRING(0 0, 0 -10)', 'Main St');
         INSERT INTO streets VALUES ('centre', 'east', 'LINESTRING(0 0, 10 0)', 'Side St');",
    )
    .expect("seed streets");
    drop(conn);

    netgraph()
        .args([
            "validate",
            "--db-path",
            path_str(&db),
            "--table",
            "streets",
            "--from-column",
            "node_a",
            "--to-column",
            "node_b",
            "--geometry-column",
            "shape",
            "--name-column",
            "name",
            "--unidirectional",
            "--output-table",
            "streets_net",
        ])
        .assert()
        .success();
    db
}

#[test]
fn inspect_json_decodes_header_and_totals() {
    let dir = TempDir::new().expect("temp dir");
    let db = built_network(dir.path());

    let output = netgraph()
        .args([
            "inspect",
            "--db-path",
            path_str(&db),
            "--table",
            "streets_net",
            "--format",
            "json",
        ])
        .output()
        .expect("inspect should not crash");
    assert!(
        output.status.success(),
        "inspect failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["header"]["table"], "streets");
    assert_eq!(json["header"]["from_column"], "node_a");
    assert_eq!(json["header"]["geometry_column"], "shape");
    assert_eq!(json["header"]["name_column"], "name");
    assert_eq!(json["header"]["kind"], "code");
    assert_eq!(json["header"]["max_code_len"], 7);
    assert_eq!(json["header"]["a_star_coefficient"], 1.0);
    assert_eq!(json["nodes"], 4);
    assert_eq!(json["arcs"], 3);
    assert_eq!(json["max_out_degree"], 2);
    assert_eq!(json["unplaced_nodes"], 0);
}

#[test]
fn inspect_text_is_line_oriented() {
    let dir = TempDir::new().expect("temp dir");
    let db = built_network(dir.path());

    netgraph()
        .args([
            "inspect",
            "--db-path",
            path_str(&db),
            "--table",
            "streets_net",
            "--format",
            "text",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("source=streets"))
        .stdout(predicate::str::contains("nodes=4 arcs=3"));
}

#[test]
fn inspect_missing_table_fails() {
    let dir = TempDir::new().expect("temp dir");
    let db = built_network(dir.path());

    netgraph()
        .args([
            "inspect",
            "--db-path",
            path_str(&db),
            "--table",
            "nope",
            "--format",
            "json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn inspect_rejects_non_network_tables() {
    let dir = TempDir::new().expect("temp dir");
    let db = dir.path().join("other.sqlite");
    let conn = Connection::open(&db).expect("create db");
    conn.execute_batch(
        "CREATE TABLE junk (\"Id\" INTEGER PRIMARY KEY, \"NetworkData\" BLOB);
         INSERT INTO junk VALUES (0, x'DEADBEEF');",
    )
    .expect("seed junk");
    drop(conn);

    netgraph()
        .args(["inspect", "--db-path", path_str(&db), "--table", "junk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("decode NETWORK-DATA table junk"));
}
