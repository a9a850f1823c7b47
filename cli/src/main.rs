//! chainsync CLI — run the transaction sync and manage its checkpoint.
//!
//! Usage:
//! ```bash
//! chainsync run --infura-project-id <ID> --db ./chainsync.db
//! chainsync run --rpc-url http://localhost:8545 --failure-policy halt
//! chainsync status --db ./chainsync.db
//! chainsync reset  --db ./chainsync.db
//! ```

mod args;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};

use chainsync_core::checkpoint::{CheckpointManager, CheckpointStore};
use chainsync_evm::{HttpClientConfig, HttpRpcClient, SyncBuilder};
use chainsync_storage::SqliteStorage;

use crate::args::{Cli, Command, DbArgs, RunArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_config());

    match &cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Status(args) => cmd_status(args).await,
        Command::Reset(args) => cmd_reset(args).await,
    }
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let endpoint = args.rpc.endpoint()?;
    let client = HttpRpcClient::new(
        endpoint,
        HttpClientConfig {
            request_timeout: Duration::from_secs(args.rpc.request_timeout_secs),
        },
    )?;
    let storage = Arc::new(SqliteStorage::open(&args.db.db).await?);

    let mut controller = SyncBuilder::new()
        .checkpoint_key(&args.db.checkpoint_key)
        .batch_size(args.batch_size)
        .checkpoint_interval(args.checkpoint_interval)
        .poll_interval_ms(args.poll_interval_ms)
        .failure_policy(args.failure_policy)
        .build_rpc(client, storage.clone(), storage);

    controller.start().await?;
    info!(db = %args.db.db, policy = ?args.failure_policy, "sync running, Ctrl-C to stop");

    let ended_on_its_own = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("interrupt received, stopping");
            false
        }
        _ = controller.wait_stopped() => true,
    };

    controller.stop().await;
    if ended_on_its_own {
        warn!("sync ended without an interrupt; restart to resume from the checkpoint");
        bail!("block subscription ended");
    }
    Ok(())
}

async fn cmd_status(args: &DbArgs) -> Result<()> {
    let storage = SqliteStorage::open(&args.db).await?;
    let checkpoint = storage.load(&args.checkpoint_key).await?;
    let count = storage.transaction_count().await?;

    match checkpoint {
        Some(cp) => println!(
            "checkpoint '{}': block {} (saved at unix {})",
            cp.key, cp.block_number, cp.updated_at
        ),
        None => println!("checkpoint '{}': none (next run starts at chain head)", args.checkpoint_key),
    }
    println!("stored transactions: {count}");
    Ok(())
}

async fn cmd_reset(args: &DbArgs) -> Result<()> {
    let storage = Arc::new(SqliteStorage::open(&args.db).await?);
    let mut checkpoint = CheckpointManager::new(storage, args.checkpoint_key.clone(), 1);
    checkpoint.reset().await?;
    info!(key = %args.checkpoint_key, "checkpoint deleted");
    println!("checkpoint '{}' reset", args.checkpoint_key);
    Ok(())
}
