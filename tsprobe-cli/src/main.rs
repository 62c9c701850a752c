mod cli;
mod error;

use crate::{
    cli::{Args, Commands},
    error::{AppError, Result},
};
use clap::Parser;
use std::process;
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use tsprobe_engine::{AnalyzeOptions, OutputContext, analyze, extract};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args) {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Analyze {
            source,
            output_dir,
            metadata_only,
            report_partial_psi,
        } => {
            if !source.is_file() {
                return Err(AppError::InvalidInput(format!(
                    "source file not found: {}",
                    source.display()
                )));
            }
            let out = OutputContext::new(&output_dir)?;
            let opts = AnalyzeOptions {
                metadata_only,
                report_partial_psi,
            };
            info!(source = %source.display(), output = %output_dir.display(), "starting analysis");
            analyze(&source, &out, &opts)?;
        }
        Commands::Extract {
            source,
            output_dir,
            pid,
        } => {
            if !source.is_file() {
                return Err(AppError::InvalidInput(format!(
                    "source file not found: {}",
                    source.display()
                )));
            }
            let out = OutputContext::new(&output_dir)?;
            info!(source = %source.display(), pid, "starting extraction");
            extract(&source, &out, pid)?;
        }
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
