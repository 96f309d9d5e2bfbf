use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Runtime;

use bar_pipeline::{Cli, load_data, run_pipeline};

fn main() -> Result<()> {
    // A. Init Logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    // B. Parse Args
    let args = Cli::parse();
    #[cfg(debug_assertions)]
    log::info!("Parsed arguments: {:?}", args);

    // C. Data Loading (Blocking)
    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    let loaded = rt.block_on(load_data(&args))?;
    log::info!("Loaded {} bars from {}", loaded.bars.len(), loaded.source);

    // D. Indicators, live replay, decimation
    let summary = run_pipeline(&args, loaded)?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{}", json);
    Ok(())
}
