use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use contracting_chain::export::write_csv_file;
use contracting_chain::{ChainAssembler, ChainConfig, InMemorySource, RawContract, TimeoutSource};

/// Build the contracting chain of a public entity from exported contract data.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON array of the entity's contracts, tagged with `nom_raz_soc_stand`
    #[arg(long)]
    entity: PathBuf,

    /// JSON object mapping each target name to its contracts
    #[arg(long)]
    targets: PathBuf,

    /// Targets to process; defaults to every tagged target of the entity
    #[arg(long = "names", num_args = 1..)]
    names: Vec<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output CSV path
    #[arg(long, default_value = "contracting_chain.csv")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = ChainConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.log_config();

    let entity_file = File::open(&args.entity)
        .with_context(|| format!("Failed to open {}", args.entity.display()))?;
    let entity_contracts: Vec<RawContract> = serde_json::from_reader(BufReader::new(entity_file))
        .with_context(|| format!("Failed to parse {}", args.entity.display()))?;

    let targets_file = File::open(&args.targets)
        .with_context(|| format!("Failed to open {}", args.targets.display()))?;
    let source = InMemorySource::from_reader(BufReader::new(targets_file))
        .with_context(|| format!("Failed to parse {}", args.targets.display()))?;
    info!(
        "Loaded {} entity contracts and contract sets for {} targets",
        entity_contracts.len(),
        source.len()
    );

    let names: Vec<String> = if args.names.is_empty() {
        entity_contracts
            .iter()
            .filter_map(|c| c.counterparty_key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        args.names
    };
    info!("Processing {} targets", names.len());

    let table = match config.fetch_timeout() {
        Some(timeout) => ChainAssembler::new(TimeoutSource::new(source, timeout), config)
            .run(&names, entity_contracts),
        None => ChainAssembler::new(source, config).run(&names, entity_contracts),
    }
    .context("Chain assembly failed")?;

    write_csv_file(&table, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    Ok(())
}
