use anyhow::Result;
use clap::Parser;

use catchment::cli::{Cli, Commands};
use catchment::commands;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Run(args) => commands::run(&cli, args),
        Commands::Census(args) => commands::census(&cli, args),
    }
}
