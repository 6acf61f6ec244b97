//! Input/output arguments for the scriptir CLI.

use std::io::{BufReader, Read, Write};

use clap_verbosity_flag::{InfoLevel, Verbosity};
use clio::{Input, Output};
use scriptir_core::Graph;

use crate::CliError;

/// Arguments for reading a graph input.
#[derive(Debug, clap::Args)]
pub struct GraphInputArgs {
    /// Input file containing a JSON-serialized graph. Defaults to `-` for
    /// stdin.
    #[arg(value_parser, default_value = "-", help_heading = "Input")]
    pub input: Input,

    /// Verbosity.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl GraphInputArgs {
    /// Read a graph from the input.
    ///
    /// The graph is not validated.
    pub fn get_graph(&mut self) -> Result<Graph, CliError> {
        let reader = BufReader::new(&mut self.input);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Read a graph from a generic reader, such as an in-memory buffer.
    pub fn get_graph_from_reader<R: Read>(&self, reader: R) -> Result<Graph, CliError> {
        Ok(serde_json::from_reader(BufReader::new(reader))?)
    }
}

/// Arguments for writing a graph output.
#[derive(Debug, clap::Args)]
pub struct GraphOutputArgs {
    /// Output file. Use '-' for stdout.
    #[clap(short, long, value_parser, default_value = "-", help_heading = "Output")]
    pub output: Output,

    /// Write the textual form of the graph instead of JSON.
    #[clap(long, help_heading = "Output")]
    pub text: bool,
}

impl GraphOutputArgs {
    /// Write `graph` to the output, in the requested format.
    pub fn write_graph(&mut self, graph: &Graph) -> Result<(), CliError> {
        write_graph(&mut self.output, graph, self.text)
    }
}

/// Write `graph` to `writer`, either as JSON or in textual form.
pub fn write_graph(mut writer: impl Write, graph: &Graph, text: bool) -> Result<(), CliError> {
    if text {
        write!(writer, "{graph}")?;
    } else {
        serde_json::to_writer_pretty(&mut writer, graph)?;
        writeln!(writer)?;
    }
    Ok(())
}
