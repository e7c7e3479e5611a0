//! netgraph-core library.
//!
//! Turns a relational table of arcs into a validated routing graph and
//! serializes it as NETWORK-DATA blocks for an external Dijkstra/A* engine.
//!
//! Pipeline: [`validate::TopologyValidator`] scans the table twice, feeding a
//! [`registry::NodeRegistry`] and then a [`graph::ArcBuilder`] through the
//! [`expand`] policy; [`stats::GraphStats`] summarizes the result and
//! [`encode::NetworkDataEncoder`] writes it through a [`encode::BlockSink`].
//! [`pipeline::run`] strings these together over a SQLite connection, with
//! [`db`] owning the output transaction.
//!
//! # Conventions
//!
//! - **Errors**: library errors are `thiserror` enums; `anyhow` only at the
//!   storage and config-file boundaries.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod db;
pub mod diagnostics;
pub mod encode;
pub mod error;
pub mod expand;
pub mod geometry;
pub mod graph;
pub mod identity;
pub mod pipeline;
pub mod registry;
pub mod source;
pub mod stats;
pub mod validate;

pub use identity::{IdentityKind, NodeIdentity};
