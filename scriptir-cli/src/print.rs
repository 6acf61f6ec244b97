//! The `print` subcommand.
use anyhow::Result;
use clap::Parser;
use clio::Output;

use crate::CliError;
use crate::graph_io::{GraphInputArgs, write_graph};

/// Write a graph in the textual form of TorchScript IR dumps.
#[derive(Parser, Debug)]
#[clap(version, long_about = None)]
#[clap(about = "Print a graph as text.")]
#[non_exhaustive]
pub struct PrintArgs {
    /// Graph input.
    #[command(flatten)]
    pub input_args: GraphInputArgs,

    /// Output file. Use '-' for stdout.
    #[clap(short, long, value_parser, default_value = "-")]
    pub output: Output,
}

impl PrintArgs {
    /// Validate the input graph, then write its textual form to the output.
    pub fn run(&mut self) -> Result<()> {
        let graph = self.input_args.get_graph()?;
        graph.validate().map_err(CliError::from)?;
        write_graph(&mut self.output, &graph, true)?;
        Ok(())
    }
}
