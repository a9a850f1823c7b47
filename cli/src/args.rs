use clap::{Args, Parser, Subcommand};

use chainsync_core::checkpoint::DEFAULT_CHECKPOINT_KEY;
use chainsync_core::config::FailurePolicy;
use chainsync_evm::providers::infura_url;

use crate::logging::LogConfig;

#[derive(Parser, Debug)]
#[command(name = "chainsync", version)]
#[command(about = "Checkpointed Ethereum transaction ingestion", long_about = None)]
pub struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit JSON logs
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            json: self.json_logs,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync transactions from the node into the database until interrupted
    Run(RunArgs),
    /// Print the checkpoint and the number of stored transactions
    Status(DbArgs),
    /// Delete the checkpoint; the next run starts at the chain head
    Reset(DbArgs),
}

#[derive(Args, Debug)]
pub struct DbArgs {
    /// SQLite database path or URL
    #[arg(long, default_value = "chainsync.db")]
    pub db: String,

    /// Checkpoint key
    #[arg(long, default_value = DEFAULT_CHECKPOINT_KEY)]
    pub checkpoint_key: String,
}

#[derive(Args, Debug)]
pub struct RpcArgs {
    /// Node JSON-RPC endpoint
    #[arg(long, conflicts_with = "infura_project_id")]
    pub rpc_url: Option<String>,

    /// Infura project id, used when --rpc-url is not given
    #[arg(long)]
    pub infura_project_id: Option<String>,

    /// Chain id for the Infura endpoint
    #[arg(long, default_value_t = 1)]
    pub chain_id: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl RpcArgs {
    /// The endpoint to connect to.
    pub fn endpoint(&self) -> anyhow::Result<String> {
        match (&self.rpc_url, &self.infura_project_id) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(id)) => Ok(infura_url(id, self.chain_id)?),
            (None, None) => anyhow::bail!("either --rpc-url or --infura-project-id is required"),
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub rpc: RpcArgs,

    /// Records per bulk insert
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Write the checkpoint every N blocks
    #[arg(long, default_value_t = 1)]
    pub checkpoint_interval: u64,

    /// Head poll interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// What to do after a block fails: continue | halt
    #[arg(long, default_value = "continue")]
    pub failure_policy: FailurePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["chainsync", "run", "--rpc-url", "http://localhost:8545"])
            .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.db.db, "chainsync.db");
        assert_eq!(args.db.checkpoint_key, "transactions");
        assert_eq!(args.batch_size, 100);
        assert_eq!(args.failure_policy, FailurePolicy::Continue);
        assert_eq!(args.rpc.endpoint().unwrap(), "http://localhost:8545");
    }

    #[test]
    fn infura_endpoint() {
        let cli = Cli::try_parse_from([
            "chainsync",
            "run",
            "--infura-project-id",
            "abc",
            "--failure-policy",
            "halt",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.rpc.endpoint().unwrap(), "https://mainnet.infura.io/v3/abc");
        assert_eq!(args.failure_policy, FailurePolicy::Halt);
    }

    #[test]
    fn endpoint_required() {
        let cli = Cli::try_parse_from(["chainsync", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.rpc.endpoint().is_err());
    }

    #[test]
    fn global_log_flags() {
        let cli = Cli::try_parse_from(["chainsync", "status", "--json-logs", "--log-level", "debug"])
            .unwrap();
        let log = cli.log_config();
        assert!(log.json);
        assert_eq!(log.level, "debug");
    }
}
