// tern CLI entry point
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use tern_cli::{check, logging, render_codes, Cli, Commands};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            files,
            config,
            format,
            verbose,
        } => {
            logging::init(verbose);
            let output = check(&files, config.as_deref(), format)?;
            print!("{}", output.rendered);
            Ok(if output.failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Codes => {
            print!("{}", render_codes());
            Ok(ExitCode::SUCCESS)
        }
    }
}
