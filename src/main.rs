use clap::Parser;
use deskbroom::cli::{Args, run_cli};
use deskbroom::logging::setup_logging;
use deskbroom::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    match run_cli(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
