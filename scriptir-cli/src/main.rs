//! Validate, print and rewrite serialized graphs on the command line

use clap::Parser as _;
use scriptir_cli::CliArgs;

fn main() {
    let args = CliArgs::parse();
    args.init_tracing();
    // With logging turned off, only the exit status reports failure.
    let report_errors = args.verbosity().tracing_level().is_some();
    if let Err(e) = args.run() {
        if report_errors {
            eprintln!("{e:#}");
        }
        std::process::exit(1);
    }
}
