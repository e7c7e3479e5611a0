#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "netgraph: routing graph validator and NETWORK-DATA builder",
    long_about = None
)]
struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Validate an arc table and optionally build NETWORK-DATA",
        long_about = "Check that an arc table forms a consistent routing graph. With \
                      --output-table the validated graph is written as NETWORK-DATA.",
        after_help = "EXAMPLES:\n    # Validate only\n    netgraph validate --db-path roads.sqlite --table roads \\\n        --from-column node_from --to-column node_to --geometry-column geom\n\n    # Build NETWORK-DATA with one-way columns\n    netgraph validate --db-path roads.sqlite --table roads \\\n        --from-column node_from --to-column node_to --geometry-column geom \\\n        --oneway-fromto fromto --oneway-tofrom tofrom --output-table roads_net\n\n    # Read options from a file\n    netgraph validate --config network.toml"
    )]
    Validate(cmd::validate::ValidateArgs),

    #[command(
        about = "Decode an existing NETWORK-DATA table",
        after_help = "EXAMPLES:\n    netgraph inspect --db-path roads.sqlite --table roads_net --format json"
    )]
    Inspect(cmd::inspect::InspectArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NETGRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "netgraph=debug,info"
        } else {
            "netgraph=info,warn"
        })
    });

    let format = env::var("NETGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the report, logs go to stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    match &cli.command {
        Commands::Validate(args) => cmd::validate::run_validate(args, output),
        Commands::Inspect(args) => cmd::inspect::run_inspect(args, output),
    }
}
