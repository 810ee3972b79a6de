//! The `vellum` command line.
//!
//! ```text
//! vellum inspect <catalog> [--json]
//! vellum find <catalog> [items…] [--first]
//! vellum render (--config <file> | --catalog <file>) <template> [--info <json>] [--param k=v]…
//! ```
//!
//! Commands write their results to the writer given to [`run`]; logging goes
//! to stderr through `tracing` (see [`init_logging`]).

mod commands;
mod logging;

pub use commands::run;
pub use logging::init_logging;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Inspect, query and render compiled template catalogs.
#[derive(Debug, Parser)]
#[command(name = "vellum", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every position of a catalog with its name, group and tags.
    Inspect {
        /// Compiled catalog (.json, .yaml or .yml)
        catalog: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run a query and print the references it finds.
    Find {
        /// Compiled catalog (.json, .yaml or .yml)
        catalog: PathBuf,
        /// Query items: id:<ref>, name:<name>, catalog:<group>, tag:<tag>, +all, +any
        items: Vec<String>,
        /// Only print the first result
        #[arg(long)]
        first: bool,
    },
    /// Render a template and print its output.
    Render(RenderArgs),
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Render configuration file (YAML or JSON)
    #[arg(long, conflicts_with = "catalog", required_unless_present = "catalog")]
    pub config: Option<PathBuf>,
    /// Compiled catalog to render from, with default settings
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Template name or reference
    pub template: String,
    /// Additional info passed to the template, as JSON
    #[arg(long)]
    pub info: Option<String>,
    /// Render parameter as key=value; the value is parsed as JSON when possible
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}
