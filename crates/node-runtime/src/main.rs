//! # CS-BFT Node Runtime
//!
//! Boots a local devnet: one wallet-backed verifier per configured node,
//! sharing an in-memory chain and network.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, then `CS_*` environment overrides)
//! 2. Open or create each node's wallet and derive its main account
//! 3. Start consensus on every verifier and the block producer
//! 4. Log committed blocks until Ctrl+C

use anyhow::{Context, Result};
use node_runtime::{Devnet, NodeConfig};
use shared_types::{hash_hex, Block};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env().context("invalid node configuration")?;
    info!(
        nodes = config.devnet.nodes,
        verifiers = config.verifier_number,
        change_point_period = config.change_point_period,
        home = %config.wallet.home_dir.display(),
        "Starting CS-BFT devnet"
    );

    let devnet = Devnet::with_wallets(config).context("failed to prepare devnet")?;
    let mut blocks = devnet.network().subscribe_blocks();
    devnet.start();

    let log_blocks = tokio::spawn(async move {
        let mut last = 0u64;
        loop {
            match blocks.recv().await {
                Ok((from, block)) => {
                    if block.number() > last {
                        last = block.number();
                        info!(
                            height = block.number(),
                            hash = %hash_hex(&block.hash()),
                            producer = %block.producer,
                            announced_by = %from,
                            "Block committed"
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Block log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Devnet is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    log_blocks.abort();
    devnet.stop();
    Ok(())
}
