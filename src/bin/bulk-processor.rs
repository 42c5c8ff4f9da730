//! Bulk processor binary: generate synthetic cards and process them on
//! parallel lanes, then exit.

use std::path::PathBuf;

use clap::Parser;

use reactive_mesh::bulk::{BulkProcessor, CardMetaData};
use reactive_mesh::lifecycle::startup;

#[derive(Parser)]
#[command(name = "bulk-processor")]
#[command(about = "Process synthetic card records on parallel lanes")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of items to generate (overrides bulk.items)
    #[arg(long)]
    items: Option<usize>,

    /// Number of lanes (overrides bulk.lanes)
    #[arg(long)]
    lanes: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::init(cli.config.as_deref())?;

    let items = cli.items.unwrap_or(config.bulk.items);
    let lanes = cli.lanes.unwrap_or(config.bulk.lanes);

    let cards = CardMetaData::batch(&mut rand::thread_rng(), items);
    let report = BulkProcessor::new(lanes)?.process(cards, |lane, card| {
        tracing::info!(lane, card_id = %card.card_id, tur = %card.tur, "Processed card");
        Ok::<_, std::convert::Infallible>(())
    });

    println!("processed={} failed={}", report.processed, report.failed);
    Ok(())
}
