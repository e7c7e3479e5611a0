//! Topology validation.
//!
//! [`TopologyValidator::run`] checks the table in three steps and stops at
//! the first step that reports a fatal diagnostic:
//!
//! 1. [`schema`]: the table and every configured column exist.
//! 2. [`types`] (pass A): every column holds only allowed value types; node
//!    identities are collected into a [`NodeRegistry`].
//! 3. [`topology`] (pass B): costs are positive and arcs are built through
//!    the direction policy. Every row is evaluated even after a failure.
//!
//! A run with no fatal diagnostic yields the finished [`Graph`].

pub mod schema;
pub mod topology;
pub mod types;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::NetworkSettings;
use crate::diagnostics::Diagnostic;
use crate::encode::{EncodeError, NetworkHeader};
use crate::geometry::GeometryService;
use crate::graph::{Graph, GraphError};
use crate::identity::IdentityKind;
use crate::registry::NodeRegistry;
use crate::source::{SourceError, TabularSource};
use crate::stats::GraphStats;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("reading the arc table failed: {0}")]
    Source(#[from] SourceError),

    #[error("internal consistency failure: {0}")]
    Internal(GraphError),
}

/// Which step a validation run stopped after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schema,
    Types,
    Topology,
}

/// Everything a validation run found.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub table: String,
    pub stage: Stage,
    pub rows: u64,
    pub identity_kind: Option<IdentityKind>,
    pub diagnostics: Vec<Diagnostic>,
    /// Present only for a valid graph.
    pub stats: Option<GraphStats>,
    /// Present only when A* support is enabled.
    pub a_star_coefficient: Option<f64>,
    #[serde(skip)]
    pub graph: Option<Graph>,
}

impl ValidationReport {
    fn new(table: &str, stage: Stage) -> Self {
        Self {
            table: table.to_string(),
            stage,
            rows: 0,
            identity_kind: None,
            diagnostics: Vec::new(),
            stats: None,
            a_star_coefficient: None,
            graph: None,
        }
    }

    /// No fatal diagnostic was found; warnings are allowed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fatal_count() == 0
    }

    #[must_use]
    pub fn fatal_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_fatal()).count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.fatal_count()
    }

    /// The NETWORK-DATA header for the validated graph.
    ///
    /// Returns `None` when the run produced no graph.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooManyNodes`] if the node count does not fit
    /// the header.
    pub fn network_header(
        &self,
        settings: &NetworkSettings,
    ) -> Result<Option<NetworkHeader>, EncodeError> {
        let Some(graph) = &self.graph else {
            return Ok(None);
        };
        let node_count = u32::try_from(graph.node_count())
            .map_err(|_| EncodeError::TooManyNodes(graph.node_count()))?;
        // Codes are capped at 31 bytes, so the width always fits a byte.
        let max_code_len = u8::try_from(graph.max_code_len()).unwrap_or(u8::MAX);
        Ok(Some(NetworkHeader {
            node_count,
            kind: graph.kind().unwrap_or(IdentityKind::Integer),
            max_code_len,
            table: settings.table.clone(),
            from_column: settings.from_column.clone(),
            to_column: settings.to_column.clone(),
            geometry_column: settings.geometry_column.clone(),
            name_column: settings.name_column.clone(),
            a_star_coefficient: self.a_star_coefficient,
        }))
    }
}

/// Runs the validation steps over one arc table.
pub struct TopologyValidator<'a> {
    source: &'a dyn TabularSource,
    geometry: &'a dyn GeometryService,
    settings: &'a NetworkSettings,
}

impl<'a> TopologyValidator<'a> {
    #[must_use]
    pub fn new(
        source: &'a dyn TabularSource,
        geometry: &'a dyn GeometryService,
        settings: &'a NetworkSettings,
    ) -> Self {
        Self {
            source,
            geometry,
            settings,
        }
    }

    /// Validate the table and, when it is clean, build its graph.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the source fails or an internal
    /// invariant breaks. Problems in the data are diagnostics, not errors.
    #[instrument(skip_all, fields(table = %self.settings.table))]
    pub fn run(&self) -> Result<ValidationReport, ValidationError> {
        let settings = self.settings;
        let mut report = ValidationReport::new(&settings.table, Stage::Schema);

        report.diagnostics = schema::check(self.source, settings)?;
        if !report.is_valid() {
            tracing::info!(
                missing = report.diagnostics.len(),
                "schema check failed"
            );
            return Ok(report);
        }

        report.stage = Stage::Types;
        let mut registry = NodeRegistry::uncommitted();
        let pass_a = types::scan(self.source, self.geometry, settings, &mut registry)?;
        report.rows = pass_a.rows;
        report.identity_kind = pass_a.identity_kind;
        report.diagnostics.extend(pass_a.diagnostics);
        tracing::info!(
            rows = report.rows,
            fatal = report.fatal_count(),
            staged = registry.staged_len(),
            "pass A complete"
        );
        if !report.is_valid() {
            return Ok(report);
        }

        report.stage = Stage::Topology;
        let table = registry.finalize();
        let pass_b = topology::scan(self.source, self.geometry, settings, table)?;
        report.diagnostics.extend(pass_b.diagnostics);
        report.a_star_coefficient = pass_b.a_star_coefficient;
        tracing::info!(
            rows = pass_b.rows,
            arcs = pass_b.graph.arc_count(),
            fatal = report.fatal_count(),
            warnings = report.warning_count(),
            "pass B complete"
        );

        if report.is_valid() {
            let stats = GraphStats::from_graph(&pass_b.graph);
            tracing::info!(
                nodes = stats.node_count,
                arcs = stats.arc_count,
                max_in = stats.max_in_degree,
                max_out = stats.max_out_degree,
                "graph validated"
            );
            report.stats = Some(stats);
            report.graph = Some(pass_b.graph);
        }
        Ok(report)
    }
}
