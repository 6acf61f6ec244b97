//! Standard command line tools, used by the scriptir binary.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use thiserror::Error;

pub mod graph_io;
pub mod print;
pub mod substitute;
pub mod validate;

/// CLI arguments.
#[derive(Parser, Debug)]
#[clap(version, long_about = None)]
#[clap(about = "scriptir graph tools.")]
#[non_exhaustive]
pub enum CliArgs {
    /// Validate a serialized graph.
    Validate(validate::ValArgs),
    /// Write a graph in textual form.
    Print(print::PrintArgs),
    /// Substitute and inline calls, preparing a graph for export.
    Substitute(substitute::SubstituteArgs),
}

impl CliArgs {
    /// The verbosity requested for the subcommand.
    pub fn verbosity(&self) -> &Verbosity<InfoLevel> {
        match self {
            CliArgs::Validate(args) => &args.input_args.verbose,
            CliArgs::Print(args) => &args.input_args.verbose,
            CliArgs::Substitute(args) => &args.input_args.verbose,
        }
    }

    /// Install a `tracing` subscriber writing to stderr at the requested
    /// verbosity.
    pub fn init_tracing(&self) {
        tracing_subscriber::fmt()
            .with_max_level(self.verbosity().tracing_level_filter())
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .init();
    }

    /// Run the subcommand.
    pub fn run(self) -> anyhow::Result<()> {
        match self {
            CliArgs::Validate(mut args) => args.run(),
            CliArgs::Print(mut args) => args.run(),
            CliArgs::Substitute(mut args) => args.run(),
        }
    }
}

/// Error type for the CLI.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CliError {
    /// Error reading input or writing output.
    #[error("Error reading from path: {0}")]
    InputFile(#[from] std::io::Error),
    /// Error parsing input.
    #[error("Error parsing input: {0}")]
    Parse(#[from] serde_json::Error),
    /// The input graph is invalid.
    #[error("Invalid graph: {0}")]
    Validate(#[from] scriptir_core::graph::ValidationError),
    /// Error running the call substitution pass.
    #[error("Call substitution failed: {0}")]
    Substitute(#[from] scriptir_passes::CallSubstitutionError),
}
