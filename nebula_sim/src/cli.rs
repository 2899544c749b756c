// nebula_sim/src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nebula: sequential state estimation for noisy telemetry.
///
/// This struct defines the command-line arguments of the `nebula` binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable DEBUG logging, including one line per filter step.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a synthetic measurement series and write it as a run record.
    Simulate {
        /// The path to the scenario TOML file.
        #[arg(short, long, default_value = "assets/scenarios/leo_circular.toml")]
        config: PathBuf,
        /// Where to write the JSON record (stdout when omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Filter a JSON run record.
    Assimilate {
        /// The JSON run record to filter.
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the JSON result (stdout when omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Scenario label for the run log.
        #[arg(long, default_value = "custom")]
        scenario: String,
        /// Preset label for the run log.
        #[arg(long)]
        preset: Option<String>,
        /// Append a row to this CSV run log.
        #[arg(long)]
        run_log: Option<PathBuf>,
    },
    /// Simulate, filter and log a scenario in one go, then print a summary.
    Run {
        #[arg(short, long, default_value = "assets/scenarios/leo_circular.toml")]
        config: PathBuf,
        /// Also write the full JSON result here.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Filter a scenario under scaled Q and R and rank the tunings.
    Sweep {
        #[arg(short, long, default_value = "assets/scenarios/leo_circular.toml")]
        config: PathBuf,
        /// Scale factors applied to both Q and R.
        #[arg(long, value_delimiter = ',', default_value = "0.1,1,10")]
        scales: Vec<f64>,
        /// Accepted ratio between mean NIS and the measurement dimension.
        #[arg(long, default_value_t = 3.0)]
        tolerance: f64,
    },
    /// Print the configuration after environment overrides, as TOML.
    ShowConfig {
        #[arg(short, long, default_value = "assets/scenarios/leo_circular.toml")]
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sweep_scales() {
        let cli = Cli::parse_from(["nebula", "sweep", "--scales", "0.5,2", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Sweep {
                scales, tolerance, ..
            } => {
                assert_eq!(scales, vec![0.5, 2.0]);
                assert_eq!(tolerance, 3.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn assimilate_requires_input() {
        assert!(Cli::try_parse_from(["nebula", "assimilate"]).is_err());
        let cli = Cli::parse_from(["nebula", "assimilate", "-i", "run.json"]);
        match cli.command {
            Command::Assimilate {
                input, scenario, ..
            } => {
                assert_eq!(input, PathBuf::from("run.json"));
                assert_eq!(scenario, "custom");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
