use clap::{Parser, Subcommand};
use log::Level;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubArgs,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Increase verbosity",
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbose: bool,

    #[arg(short = 'q', long = "quiet", help = "Decrease verbosity", global = true)]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::Debug
        } else if self.quiet {
            Level::Warn
        } else {
            Level::Info
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SubArgs {
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
    #[command(name = "plan")]
    Plan {
        #[command(flatten)]
        args: PlanArgs,
    },
}

/// Build the reference tree described by a config file
///
/// # Example
///
/// ```bash,no_run
/// genomeprep run -c config.toml -t 4
/// ```
///
/// # Arguments
///
/// * `config` - Path to the configuration file
/// * `threads` - Maximum number of stages running at once
///
/// # Note
///
/// * `threads` overrides `max_forks` in `[global]`
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to the configuration file",
        value_name = "CONFIG",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[arg(
        short = 't',
        long = "threads",
        help = "Maximum number of stages running at once",
        value_name = "THREADS"
    )]
    pub threads: Option<usize>,
}

/// Print the stage order and commands of a run without executing anything
///
/// # Example
///
/// ```bash,no_run
/// genomeprep plan -c config.toml
/// ```
#[derive(Debug, Parser, Clone)]
pub struct PlanArgs {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to the configuration file",
        value_name = "CONFIG",
        default_value = "config.toml"
    )]
    pub config: PathBuf,
}
