//! One validate-then-build run over a SQLite connection.

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::NetworkSettings;
use crate::db;
use crate::encode::{EncodeError, EncodeSummary};
use crate::error::ErrorCode;
use crate::geometry::WkbGeometry;
use crate::source::SqliteTable;
use crate::validate::{TopologyValidator, ValidationError, ValidationReport};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("output table \"{0}\" already exists")]
    OutputTableExists(String),

    #[error("writing NETWORK-DATA failed: {0}")]
    Encode(#[from] EncodeError),
}

impl RunError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(ValidationError::Internal(_)) => ErrorCode::InternalUnexpected,
            Self::Validation(ValidationError::Source(_)) | Self::Encode(_) => {
                ErrorCode::EncodeFailed
            }
            Self::OutputTableExists(_) => ErrorCode::OutputTableExists,
        }
    }
}

/// Result of the optional VirtualNetwork step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VirtualOutcome {
    Skipped,
    Created { table: String },
    Failed { table: String, reason: String },
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub report: ValidationReport,
    /// Present when a NETWORK-DATA table was written.
    pub output: Option<EncodeSummary>,
    pub virtual_table: VirtualOutcome,
}

/// Validate the configured table and, when it is clean and an output table
/// is configured, write NETWORK-DATA and the optional virtual table.
///
/// A failed validation is not an error: the report carries the diagnostics
/// and nothing is written.
///
/// # Errors
///
/// Returns [`RunError`] if reading, the output-table check, or the write
/// transaction fails.
#[instrument(skip_all, fields(table = %settings.table))]
pub fn run(conn: &mut Connection, settings: &NetworkSettings) -> Result<RunOutcome, RunError> {
    let report = {
        let source = SqliteTable::new(conn);
        TopologyValidator::new(&source, &WkbGeometry, settings).run()?
    };

    let mut outcome = RunOutcome {
        report,
        output: None,
        virtual_table: VirtualOutcome::Skipped,
    };
    let Some(out) = settings.output_table.as_deref() else {
        return Ok(outcome);
    };
    let Some(header) = outcome.report.network_header(settings)? else {
        tracing::info!(out, "validation failed, NETWORK-DATA not written");
        return Ok(outcome);
    };
    let Some(graph) = outcome.report.graph.take() else {
        return Ok(outcome);
    };

    if !settings.overwrite_output && db::relation_exists(conn, out).map_err(EncodeError::from)? {
        return Err(RunError::OutputTableExists(out.to_string()));
    }
    let summary = db::write_network_data(conn, out, settings.overwrite_output, &graph, header)?;
    outcome.report.graph = Some(graph);
    outcome.output = Some(summary);

    if let Some(virt) = settings.virtual_table.as_deref() {
        outcome.virtual_table =
            match db::create_virtual_network(conn, virt, out, settings.overwrite_output) {
                Ok(()) => VirtualOutcome::Created {
                    table: virt.to_string(),
                },
                Err(err) => {
                    tracing::warn!(virt, error = %err, "VirtualNetwork table not created");
                    VirtualOutcome::Failed {
                        table: virt.to_string(),
                        reason: err.to_string(),
                    }
                }
            };
    }
    Ok(outcome)
}
