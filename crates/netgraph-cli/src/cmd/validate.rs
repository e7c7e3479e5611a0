//! `netgraph validate`: check an arc table and optionally build NETWORK-DATA.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use netgraph_core::config::{ConfigError, NetworkConfig};
use netgraph_core::db;
use netgraph_core::diagnostics::Diagnostic;
use netgraph_core::encode::EncodeSummary;
use netgraph_core::error::ErrorCode;
use netgraph_core::expand::DirectionPolicy;
use netgraph_core::pipeline::{self, RunOutcome, VirtualOutcome};
use netgraph_core::stats::GraphStats;
use netgraph_core::validate::Stage;
use netgraph_core::IdentityKind;
use serde::Serialize;

use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode, rendered,
};

/// Arguments for `netgraph validate`.
#[derive(Args, Debug, Default)]
pub struct ValidateArgs {
    /// SQLite database holding the arc table.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Arc table to validate.
    #[arg(long)]
    pub table: Option<String>,

    /// Column holding the arc's start node.
    #[arg(long)]
    pub from_column: Option<String>,

    /// Column holding the arc's end node.
    #[arg(long)]
    pub to_column: Option<String>,

    /// Column holding the traversal cost; defaults to geometric length.
    #[arg(long)]
    pub cost_column: Option<String>,

    /// LINESTRING geometry column; NULL, NONE or NO disables geometry.
    #[arg(long)]
    pub geometry_column: Option<String>,

    /// Column holding a road name.
    #[arg(long)]
    pub name_column: Option<String>,

    /// Integer column; 0 forbids travelling from ToNode to FromNode.
    #[arg(long)]
    pub oneway_tofrom: Option<String>,

    /// Integer column; 0 forbids travelling from FromNode to ToNode.
    #[arg(long)]
    pub oneway_fromto: Option<String>,

    /// Every row is a two-way arc (default).
    #[arg(long, conflicts_with = "unidirectional")]
    pub bidirectional: bool,

    /// Every row is a single FromNode to ToNode arc.
    #[arg(long)]
    pub unidirectional: bool,

    /// Store node coordinates and the A* coefficient (default).
    #[arg(long, conflicts_with = "a_star_excluded")]
    pub a_star_supported: bool,

    /// Omit A* support from the output.
    #[arg(long)]
    pub a_star_excluded: bool,

    /// Write NETWORK-DATA into this table.
    #[arg(long)]
    pub output_table: Option<String>,

    /// Create a VirtualNetwork table over the output table.
    #[arg(long)]
    pub virtual_table: Option<String>,

    /// Replace existing output and virtual tables.
    #[arg(long)]
    pub overwrite_output: bool,

    /// TOML file with the same options; flags override it.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ValidateArgs {
    /// The options given on the command line, as config overrides.
    fn overrides(&self) -> NetworkConfig {
        let direction = if self.unidirectional {
            Some(DirectionPolicy::Unidirectional)
        } else if self.bidirectional {
            Some(DirectionPolicy::Bidirectional)
        } else {
            None
        };
        let a_star = if self.a_star_excluded {
            Some(false)
        } else if self.a_star_supported {
            Some(true)
        } else {
            None
        };
        NetworkConfig {
            db_path: self.db_path.clone(),
            table: self.table.clone(),
            from_column: self.from_column.clone(),
            to_column: self.to_column.clone(),
            cost_column: self.cost_column.clone(),
            geometry_column: self.geometry_column.clone(),
            name_column: self.name_column.clone(),
            oneway_tofrom: self.oneway_tofrom.clone(),
            oneway_fromto: self.oneway_fromto.clone(),
            direction,
            a_star,
            output_table: self.output_table.clone(),
            virtual_table: self.virtual_table.clone(),
            overwrite_output: self.overwrite_output.then_some(true),
        }
    }

    fn effective_config(&self) -> anyhow::Result<NetworkConfig> {
        let base = match &self.config {
            Some(path) => NetworkConfig::load(path)?,
            None => NetworkConfig::default(),
        };
        Ok(base.merge(self.overrides()))
    }
}

#[derive(Debug, Serialize)]
struct DiagnosticLine<'a> {
    code: &'static str,
    fatal: bool,
    message: String,
    #[serde(flatten)]
    detail: &'a Diagnostic,
}

/// Report payload for `netgraph validate`.
#[derive(Debug, Serialize)]
struct ValidatePayload<'a> {
    valid: bool,
    table: &'a str,
    stage: Stage,
    rows: u64,
    identity_kind: Option<IdentityKind>,
    fatal: usize,
    warnings: usize,
    diagnostics: Vec<DiagnosticLine<'a>>,
    stats: Option<GraphStats>,
    a_star_coefficient: Option<f64>,
    output_table: Option<&'a str>,
    output: Option<EncodeSummary>,
    virtual_table: &'a VirtualOutcome,
}

impl<'a> ValidatePayload<'a> {
    fn new(outcome: &'a RunOutcome, output_table: Option<&'a str>) -> Self {
        let report = &outcome.report;
        Self {
            valid: report.is_valid(),
            table: &report.table,
            stage: report.stage,
            rows: report.rows,
            identity_kind: report.identity_kind,
            fatal: report.fatal_count(),
            warnings: report.warning_count(),
            diagnostics: report
                .diagnostics
                .iter()
                .map(|d| DiagnosticLine {
                    code: d.code().code(),
                    fatal: d.is_fatal(),
                    message: d.to_string(),
                    detail: d,
                })
                .collect(),
            stats: report.stats,
            a_star_coefficient: report.a_star_coefficient,
            output_table: outcome.output.and(output_table),
            output: outcome.output,
            virtual_table: &outcome.virtual_table,
        }
    }
}

/// Execute `netgraph validate`.
///
/// # Errors
///
/// Returns an error when the options are invalid, the database cannot be
/// read or written, or the table fails validation.
pub fn run_validate(args: &ValidateArgs, output: OutputMode) -> anyhow::Result<()> {
    let config = rendered(output, args.effective_config())?;
    let settings = match config.resolve() {
        Ok(settings) => settings,
        Err(err) => return config_failure(output, &err),
    };
    let Some(db_path) = config.db_path.as_deref() else {
        return config_failure(output, &ConfigError::Missing("db-path"));
    };

    let mut conn = rendered(output, db::open(db_path))?;
    let outcome = match pipeline::run(&mut conn, &settings) {
        Ok(outcome) => outcome,
        Err(err) => {
            render_error(output, &CliError::coded(err.code(), err.to_string()))?;
            return Err(err).context("netgraph validate failed");
        }
    };

    let payload = ValidatePayload::new(&outcome, settings.output_table.as_deref());
    render_mode(output, &payload, render_text, render_pretty)?;

    if !payload.valid {
        anyhow::bail!(
            "table {} failed validation with {} fatal diagnostic(s)",
            payload.table,
            payload.fatal
        );
    }
    Ok(())
}

fn config_failure(output: OutputMode, err: &ConfigError) -> anyhow::Result<()> {
    render_error(
        output,
        &CliError::coded(ErrorCode::InvalidConfig, err.to_string()),
    )?;
    Err(anyhow::Error::new(err.clone()).context("invalid options"))
}

fn render_text(payload: &ValidatePayload<'_>, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "valid={} table={} stage={} rows={} fatal={} warnings={}",
        payload.valid,
        payload.table,
        stage_name(payload.stage),
        payload.rows,
        payload.fatal,
        payload.warnings
    )?;
    for line in &payload.diagnostics {
        let severity = if line.fatal { "fatal" } else { "warning" };
        writeln!(w, "{} {severity} {}", line.code, line.message)?;
    }
    if let Some(stats) = &payload.stats {
        writeln!(
            w,
            "stats arcs={} nodes={} max_in={} max_out={} terminal={} passthrough={}",
            stats.arc_count,
            stats.node_count,
            stats.max_in_degree,
            stats.max_out_degree,
            stats.terminal_count,
            stats.passthrough_count
        )?;
    }
    if let Some(coefficient) = payload.a_star_coefficient {
        writeln!(w, "a_star_coefficient={coefficient}")?;
    }
    if let (Some(table), Some(summary)) = (payload.output_table, &payload.output) {
        writeln!(
            w,
            "output table={table} blocks={} nodes={} arcs={} bytes={}",
            summary.blocks, summary.nodes, summary.arcs, summary.bytes
        )?;
    }
    match payload.virtual_table {
        VirtualOutcome::Skipped => {}
        VirtualOutcome::Created { table } => writeln!(w, "virtual_table created {table}")?,
        VirtualOutcome::Failed { table, reason } => {
            writeln!(w, "virtual_table failed {table}: {reason}")?;
        }
    }
    Ok(())
}

fn render_pretty(payload: &ValidatePayload<'_>, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Validation of \"{}\"", payload.table))?;
    pretty_kv(w, "Result", if payload.valid { "valid" } else { "INVALID" })?;
    pretty_kv(w, "Stage reached", stage_name(payload.stage))?;
    pretty_kv(w, "Rows", payload.rows.to_string())?;
    if let Some(kind) = payload.identity_kind {
        pretty_kv(w, "Node identity", kind.to_string())?;
    }

    if !payload.diagnostics.is_empty() {
        writeln!(w)?;
        pretty_section(
            w,
            &format!(
                "Diagnostics ({} fatal, {} warning)",
                payload.fatal, payload.warnings
            ),
        )?;
        for line in &payload.diagnostics {
            let marker = if line.fatal { "ERROR" } else { "WARN " };
            writeln!(w, "{marker} {} {}", line.code, line.message)?;
            if let Some(hint) = line.detail.code().hint() {
                writeln!(w, "      {hint}")?;
            }
        }
    }

    if let Some(stats) = &payload.stats {
        writeln!(w)?;
        pretty_section(w, "Graph statistics")?;
        pretty_kv(w, "# Arcs", stats.arc_count.to_string())?;
        pretty_kv(w, "# Nodes", stats.node_count.to_string())?;
        pretty_kv(w, "Node max incoming arcs", stats.max_in_degree.to_string())?;
        pretty_kv(w, "Node max outcoming arcs", stats.max_out_degree.to_string())?;
        pretty_kv(
            w,
            "# Nodes cardinality=1 [terminal nodes]",
            stats.terminal_count.to_string(),
        )?;
        pretty_kv(
            w,
            "# Nodes cardinality=2 [pass-through]",
            stats.passthrough_count.to_string(),
        )?;
        if let Some(coefficient) = payload.a_star_coefficient {
            pretty_kv(w, "A* heuristic coefficient", format!("{coefficient:.6}"))?;
        }
    }

    if let (Some(table), Some(summary)) = (payload.output_table, &payload.output) {
        writeln!(w)?;
        pretty_section(w, &format!("NETWORK-DATA \"{table}\""))?;
        pretty_kv(w, "Blocks", summary.blocks.to_string())?;
        pretty_kv(w, "Nodes", summary.nodes.to_string())?;
        pretty_kv(w, "Arcs", summary.arcs.to_string())?;
        pretty_kv(w, "Bytes", summary.bytes.to_string())?;
    }
    match payload.virtual_table {
        VirtualOutcome::Skipped => {}
        VirtualOutcome::Created { table } => {
            pretty_kv(w, "VirtualNetwork", format!("\"{table}\" created"))?;
        }
        VirtualOutcome::Failed { table, reason } => {
            pretty_kv(w, "VirtualNetwork", format!("\"{table}\" NOT created: {reason}"))?;
        }
    }
    Ok(())
}

const fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Schema => "schema",
        Stage::Types => "types",
        Stage::Topology => "topology",
    }
}
