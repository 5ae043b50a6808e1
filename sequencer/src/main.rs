use anyhow::Result;
use clap::Parser;
use core_logic::{setup_logger, SequencerConfig, SqliteStore};
use dotenv::dotenv;
use sequencer::{EthersChainClient, KeyStore, Sequencer};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = setup_logger();
    dotenv().ok();

    let args = Args::parse();
    info!("Loading config from: {}", args.config);

    let config = match SequencerConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Ok(());
        }
    };
    info!("Configuration loaded for chain ID: {}", config.chain_id);

    let keys = KeyStore::load(&config.wallet_source, config.chain_id)?;
    let chain = Arc::new(EthersChainClient::new(&config.rpc_url, &keys)?);
    let store = Arc::new(SqliteStore::new(&config.db_path).await?);

    let sequencer = Sequencer::start(&config, keys.addresses().to_vec(), chain, store)?;

    tokio::signal::ctrl_c().await?;
    sequencer.shutdown();

    Ok(())
}
