use anyhow::Result;

use crate::census::CensusTable;
use crate::cli::{CensusArgs, RunArgs};
use crate::common::{self, ensure_dir_exists};
use crate::config::PipelineConfig;
use crate::pipeline;

pub fn run(cli: &crate::cli::Cli, args: &RunArgs) -> Result<()> {
    if cli.verbose > 0 {
        eprintln!("[run] config={}", args.config.display());
    }

    let config = PipelineConfig::from_json_file(&args.config)?;
    let report = pipeline::run(&config, cli.verbose)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn census(cli: &crate::cli::Cli, args: &CensusArgs) -> Result<()> {
    if cli.verbose > 0 {
        eprintln!("[census] feed={} -> {}", args.feed.display(), args.out.display());
    }

    ensure_dir_exists(&args.out)?;
    let table = CensusTable::load(&args.feed)?;
    let df = table.to_dataframe()?;
    common::data::write_table(&args.out, "census_tracts", &df)?;

    println!("Wrote {} tracts -> {}", df.height(), args.out.display());
    Ok(())
}
