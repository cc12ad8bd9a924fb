use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Catchment analytics CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "catchment", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full radius + containment pipeline from a config file
    Run(RunArgs),

    /// Normalize a raw demographic feed into the keyed tract table
    Census(CensusArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON run configuration
    #[arg(value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CensusArgs {
    /// Headerless fixed-column demographic CSV
    #[arg(value_hint = ValueHint::FilePath)]
    pub feed: PathBuf,

    /// Output location (directory).
    #[arg(short, long, default_value = "output", value_hint = ValueHint::DirPath)]
    pub out: PathBuf,
}
