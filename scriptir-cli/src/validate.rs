//! The `validate` subcommand.

use std::io::Read;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::CliError;
use crate::graph_io::GraphInputArgs;

/// Validate a serialized graph.
#[derive(Parser, Debug)]
#[clap(version, long_about = None)]
#[clap(about = "Validate a graph.")]
#[non_exhaustive]
pub struct ValArgs {
    /// Graph input.
    #[command(flatten)]
    pub input_args: GraphInputArgs,
}

/// String to print when validation is successful.
pub const VALID_PRINT: &str = "Graph valid!";

impl ValArgs {
    /// Validate the graph.
    ///
    /// # Arguments
    ///
    /// * `input_override` - Optional reader to use instead of the CLI input argument.
    pub fn run_with_input<R: Read>(&mut self, input_override: Option<R>) -> Result<()> {
        let graph = match input_override {
            Some(reader) => self.input_args.get_graph_from_reader(reader)?,
            None => self.input_args.get_graph()?,
        };
        graph.validate().map_err(CliError::from)?;
        info!("{VALID_PRINT}");
        Ok(())
    }

    /// Validate the graph read from the CLI input.
    pub fn run(&mut self) -> Result<()> {
        self.run_with_input(None::<&[u8]>)
    }
}
