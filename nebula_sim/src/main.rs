// nebula_sim/src/main.rs

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use nebula_sim::cli::{Cli, Command};
use nebula_sim::commands::{self, write_json};
use nebula_sim::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Command::Simulate { config, out } => {
            let config = commands::load(&config)?;
            let run = commands::simulate(&config)?;
            write_json(&run.input, out.as_deref())?;
        }
        Command::Assimilate {
            input,
            out,
            scenario,
            preset,
            run_log,
        } => {
            let request = commands::read_run_input(&input)?;
            let mut ctx = SessionContext::new(RunMetadata { scenario, preset });
            if let Some(path) = run_log {
                ctx = ctx.with_run_log(Arc::new(CsvRunLog::new(path)));
            }
            match assimilate(&request, &ctx) {
                Ok(response) => write_json(&response, out.as_deref())?,
                Err(e) => {
                    error!("Assimilation failed ({}): {}", e.status(), e);
                    write_json(&e.to_body(), out.as_deref())?;
                    return Err(e.into());
                }
            }
        }
        Command::Run { config, out } => {
            let config = commands::load(&config)?;
            let response = commands::run_scenario(&config)?;
            if let Some(path) = out.as_deref() {
                write_json(&response, Some(path))?;
            }
        }
        Command::Sweep {
            config,
            scales,
            tolerance,
        } => {
            let config = commands::load(&config)?;
            commands::sweep_scenario(&config, &scales, tolerance)?;
        }
        Command::ShowConfig { config } => {
            let config = commands::load(&config)?;
            print!("{}", config.to_toml()?);
        }
    }

    info!("Done");
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
