//! The `substitute` subcommand.
use anyhow::Result;
use clap::Parser;
use scriptir_passes::call_substitution::SubstitutionRule;
use scriptir_passes::validation::ValidationLevel;
use scriptir_passes::{CallSubstitutionPass, SubstitutionTable};
use tracing::info;

use crate::CliError;
use crate::graph_io::{GraphInputArgs, GraphOutputArgs};

/// Replace calls to graph functions and methods by dedicated operations or by
/// the bodies of their callees.
#[derive(Parser, Debug)]
#[clap(version, long_about = None)]
#[clap(about = "Substitute and inline calls in a graph.")]
#[non_exhaustive]
pub struct SubstituteArgs {
    /// Graph input.
    #[command(flatten)]
    pub input_args: GraphInputArgs,

    /// Graph output.
    #[command(flatten)]
    pub output_args: GraphOutputArgs,

    /// Do not replace `torch.nn.functional.interpolate` by
    /// `aten::__interpolate`.
    #[clap(long)]
    pub no_default_rules: bool,

    /// Additional rule, e.g. `torch.nn.functional.interpolate=aten::__interpolate`
    /// or `my.module.f=inline`. Later rules take precedence.
    #[clap(long = "rule", value_name = "NAMESPACE.NAME=NS::OP")]
    pub rules: Vec<SubstitutionRule>,
}

impl SubstituteArgs {
    /// The substitution table selected by the arguments.
    pub fn table(&self) -> SubstitutionTable {
        let mut table = if self.no_default_rules {
            SubstitutionTable::new()
        } else {
            SubstitutionTable::onnx()
        };
        table.extend(self.rules.iter().cloned());
        table
    }

    /// Run the pass on the input graph and write the result to the output.
    pub fn run(&mut self) -> Result<()> {
        let mut graph = self.input_args.get_graph()?;
        let report = CallSubstitutionPass::default()
            .with_table(self.table())
            .validation_level(ValidationLevel::Validate)
            .run(&mut graph)
            .map_err(CliError::from)?;
        info!("Calls: {report}");
        self.output_args.write_graph(&graph)?;
        Ok(())
    }
}
