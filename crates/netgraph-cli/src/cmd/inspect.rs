//! `netgraph inspect`: decode an existing NETWORK-DATA table.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use netgraph_core::db;
use netgraph_core::encode::{DecodedNetwork, NetworkHeader};
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode, rendered};

/// Arguments for `netgraph inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// SQLite database holding the NETWORK-DATA table.
    #[arg(long)]
    pub db_path: PathBuf,

    /// NETWORK-DATA table to decode.
    #[arg(long)]
    pub table: String,
}

/// Report payload for `netgraph inspect`.
#[derive(Debug, Serialize)]
struct InspectPayload {
    table: String,
    header: NetworkHeader,
    blocks: usize,
    nodes: usize,
    arcs: usize,
    max_out_degree: usize,
    /// Nodes stored without a coordinate in an A* network.
    unplaced_nodes: usize,
}

impl InspectPayload {
    fn new(table: String, network: DecodedNetwork) -> Self {
        let unplaced_nodes = if network.header.a_star() {
            network
                .nodes
                .iter()
                .filter(|n| n.coordinate.is_none())
                .count()
        } else {
            0
        };
        Self {
            table,
            blocks: network.blocks,
            nodes: network.nodes.len(),
            arcs: network.arc_count(),
            max_out_degree: network.nodes.iter().map(|n| n.arcs.len()).max().unwrap_or(0),
            unplaced_nodes,
            header: network.header,
        }
    }
}

/// Execute `netgraph inspect`.
///
/// # Errors
///
/// Returns an error if the database or table cannot be read or decoded.
pub fn run_inspect(args: &InspectArgs, output: OutputMode) -> anyhow::Result<()> {
    let network = rendered(
        output,
        db::open(&args.db_path).and_then(|conn| db::load_network_data(&conn, &args.table)),
    )?;
    tracing::info!(
        table = %args.table,
        blocks = network.blocks,
        nodes = network.nodes.len(),
        "NETWORK-DATA decoded"
    );
    let payload = InspectPayload::new(args.table.clone(), network);
    render_mode(output, &payload, render_text, render_pretty)
}

fn optional(name: Option<&str>) -> &str {
    name.unwrap_or("-")
}

fn render_text(payload: &InspectPayload, w: &mut dyn Write) -> io::Result<()> {
    let header = &payload.header;
    writeln!(
        w,
        "table={} source={} from={} to={} geometry={} name={}",
        payload.table,
        header.table,
        header.from_column,
        header.to_column,
        optional(header.geometry_column.as_deref()),
        optional(header.name_column.as_deref()),
    )?;
    writeln!(
        w,
        "kind={} blocks={} nodes={} arcs={} max_out={}",
        header.kind, payload.blocks, payload.nodes, payload.arcs, payload.max_out_degree
    )?;
    if let Some(coefficient) = header.a_star_coefficient {
        writeln!(
            w,
            "a_star_coefficient={coefficient} unplaced={}",
            payload.unplaced_nodes
        )?;
    }
    Ok(())
}

fn render_pretty(payload: &InspectPayload, w: &mut dyn Write) -> io::Result<()> {
    let header = &payload.header;
    pretty_section(w, &format!("NETWORK-DATA \"{}\"", payload.table))?;
    pretty_kv(w, "Source table", &header.table)?;
    pretty_kv(w, "FromNode column", &header.from_column)?;
    pretty_kv(w, "ToNode column", &header.to_column)?;
    pretty_kv(w, "Geometry column", optional(header.geometry_column.as_deref()))?;
    pretty_kv(w, "Name column", optional(header.name_column.as_deref()))?;
    pretty_kv(w, "Node identity", header.kind.to_string())?;
    if header.max_code_len > 0 {
        pretty_kv(w, "Max code length", header.max_code_len.to_string())?;
    }
    match header.a_star_coefficient {
        Some(coefficient) => {
            pretty_kv(w, "A* heuristic coefficient", format!("{coefficient:.6}"))?;
            pretty_kv(w, "Unplaced nodes", payload.unplaced_nodes.to_string())?;
        }
        None => pretty_kv(w, "A* support", "excluded")?,
    }
    writeln!(w)?;
    pretty_kv(w, "Blocks", payload.blocks.to_string())?;
    pretty_kv(w, "# Nodes", payload.nodes.to_string())?;
    pretty_kv(w, "# Arcs", payload.arcs.to_string())?;
    pretty_kv(w, "Node max outcoming arcs", payload.max_out_degree.to_string())
}
