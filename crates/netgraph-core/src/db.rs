//! SQLite storage for NETWORK-DATA tables.
//!
//! The whole write phase (optional drop, create, header, blocks) runs in one
//! transaction, so readers either see the complete artifact or none of it.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::{path::Path, time::Duration};

use crate::encode::{
    BlockSink, DecodedNetwork, EncodeError, EncodeSummary, NetworkDataReader, NetworkHeader,
    encode_graph,
};
use crate::graph::Graph;
use crate::source::quote_ident;

/// Busy timeout used for netgraph connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open an existing database.
///
/// # Errors
///
/// Returns an error if the file is missing or cannot be configured.
pub fn open(path: &Path) -> Result<Connection> {
    if !path.exists() {
        anyhow::bail!("database {} does not exist", path.display());
    }
    let conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;
    configure_connection(&conn).context("configure sqlite pragmas")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Whether any table or view named `name` exists, case-insensitively.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub fn relation_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE Upper(name) = Upper(?1) LIMIT 1",
        [name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// A [`BlockSink`] inserting into a NETWORK-DATA table inside a transaction.
pub struct SqliteSink<'t> {
    tx: &'t Transaction<'t>,
    insert: String,
}

impl<'t> SqliteSink<'t> {
    #[must_use]
    pub fn new(tx: &'t Transaction<'t>, table: &str) -> Self {
        Self {
            tx,
            insert: format!(
                "INSERT INTO {} (\"Id\", \"NetworkData\") VALUES (?1, ?2)",
                quote_ident(table)
            ),
        }
    }
}

impl BlockSink for SqliteSink<'_> {
    fn write_block(&mut self, id: i64, blob: &[u8]) -> Result<(), EncodeError> {
        self.tx.prepare_cached(&self.insert)?.execute(params![id, blob])?;
        Ok(())
    }
}

/// Create `table` and fill it with the encoded `graph`, atomically.
///
/// With `overwrite`, an existing table of that name is dropped first.
///
/// # Errors
///
/// Returns an [`EncodeError`]; on any error nothing is committed.
#[tracing::instrument(skip(conn, graph, header))]
pub fn write_network_data(
    conn: &mut Connection,
    table: &str,
    overwrite: bool,
    graph: &Graph,
    header: NetworkHeader,
) -> Result<EncodeSummary, EncodeError> {
    let tx = conn.transaction()?;
    if overwrite {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
    }
    tx.execute_batch(&format!(
        "CREATE TABLE {} (\"Id\" INTEGER PRIMARY KEY, \"NetworkData\" BLOB NOT NULL)",
        quote_ident(table)
    ))?;
    let summary = encode_graph(graph, header, SqliteSink::new(&tx, table))?;
    tx.commit()?;
    tracing::info!(table, blocks = summary.blocks, "NETWORK-DATA committed");
    Ok(summary)
}

/// Create a VirtualNetwork table over `network_table`.
///
/// Needs a connection with the VirtualNetwork module loaded.
///
/// # Errors
///
/// Returns the SQLite error, typically "no such module".
pub fn create_virtual_network(
    conn: &Connection,
    virtual_table: &str,
    network_table: &str,
    overwrite: bool,
) -> rusqlite::Result<()> {
    if overwrite {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(virtual_table)))?;
    }
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE {} USING VirtualNetwork({})",
        quote_ident(virtual_table),
        quote_ident(network_table)
    ))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read every blob of a NETWORK-DATA table in `Id` order and decode it.
///
/// # Errors
///
/// Returns an error if the table cannot be read or a blob is malformed.
pub fn load_network_data(conn: &Connection, table: &str) -> Result<DecodedNetwork> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT \"NetworkData\" FROM {} ORDER BY \"Id\"",
            quote_ident(table)
        ))
        .with_context(|| format!("read NETWORK-DATA table {table}"))?;
    let blobs = stmt
        .query_map([], |row| row.get::<_, Vec<u8>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read NETWORK-DATA table {table}"))?;
    NetworkDataReader::decode_all(blobs.iter().map(Vec::as_slice))
        .with_context(|| format!("decode NETWORK-DATA table {table}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityKind, NodeIdentity};
    use crate::registry::NodeRegistry;
    use crate::graph::ArcBuilder;
    use tempfile::TempDir;

    fn small_graph() -> Graph {
        let mut registry = NodeRegistry::new(IdentityKind::Integer);
        for id in [1, 2, 3] {
            registry.observe(NodeIdentity::integer(id)).expect("observe");
        }
        let mut builder = ArcBuilder::new(registry.finalize());
        builder
            .add_arc(1, &NodeIdentity::integer(1), &NodeIdentity::integer(2), None, None, 2.0)
            .expect("arc");
        builder
            .add_arc(2, &NodeIdentity::integer(2), &NodeIdentity::integer(3), None, None, 1.0)
            .expect("arc");
        builder.finish()
    }

    fn header() -> NetworkHeader {
        NetworkHeader {
            node_count: 3,
            kind: IdentityKind::Integer,
            max_code_len: 0,
            table: "roads".into(),
            from_column: "a".into(),
            to_column: "b".into(),
            geometry_column: None,
            name_column: None,
            a_star_coefficient: None,
        }
    }

    fn temp_db() -> (TempDir, Connection) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("net.sqlite");
        let conn = Connection::open(&path).expect("create db");
        drop(conn);
        let conn = open(&path).expect("open db");
        (dir, conn)
    }

    #[test]
    fn open_rejects_missing_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(open(&dir.path().join("absent.sqlite")).is_err());
    }

    #[test]
    fn write_then_load_round_trips() {
        let (_dir, mut conn) = temp_db();
        let summary = write_network_data(&mut conn, "roads_net", false, &small_graph(), header())
            .expect("write");
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.arcs, 2);

        let decoded = load_network_data(&conn, "roads_net").expect("load");
        assert_eq!(decoded.header, header());
        assert_eq!(decoded.nodes.len(), 3);
        assert_eq!(decoded.arc_count(), 2);
        assert!(relation_exists(&conn, "ROADS_NET").expect("catalog"));
    }

    #[test]
    fn existing_table_without_overwrite_rolls_back() {
        let (_dir, mut conn) = temp_db();
        conn.execute_batch("CREATE TABLE roads_net (x INTEGER)").expect("seed");
        let err = write_network_data(&mut conn, "roads_net", false, &small_graph(), header())
            .expect_err("table exists");
        assert!(matches!(err, EncodeError::Storage(_)));
        let cols: i64 = conn
            .query_row("SELECT count(*) FROM pragma_table_info('roads_net')", [], |r| r.get(0))
            .expect("table info");
        assert_eq!(cols, 1);
    }

    #[test]
    fn overwrite_replaces_table() {
        let (_dir, mut conn) = temp_db();
        conn.execute_batch("CREATE TABLE roads_net (x INTEGER)").expect("seed");
        write_network_data(&mut conn, "roads_net", true, &small_graph(), header())
            .expect("overwrite");
        let rows: i64 = conn
            .query_row("SELECT count(*) FROM roads_net", [], |r| r.get(0))
            .expect("count");
        assert_eq!(rows, 2);
    }

    #[test]
    fn virtual_network_needs_its_module() {
        let (_dir, mut conn) = temp_db();
        write_network_data(&mut conn, "roads_net", false, &small_graph(), header())
            .expect("write");
        assert!(create_virtual_network(&conn, "roads_vnet", "roads_net", false).is_err());
    }
}
