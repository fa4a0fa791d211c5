//! # Node Configuration
//!
//! Unified configuration for every subsystem plus the runtime parameters of
//! the node itself.
//!
//! Defaults carry the production calibration. `CS_*` environment variables
//! override single fields:
//!
//! | Variable | Field |
//! |---|---|
//! | `CS_DEVNET_NODES` | `devnet.nodes` |
//! | `CS_VERIFIER_NUMBER` | `verifier_number` |
//! | `CS_CHANGE_POINT_PERIOD` | `change_point_period` |
//! | `CS_SYNC_BLOCK_DELAY_MS` | `sync_block_delay` |
//! | `CS_FETCH_TIMEOUT_MS` | `fetcher.fetch_timeout` |
//! | `CS_ROUND_TIMEOUT_MS` | proposal, prevote and precommit timeouts |
//! | `CS_WAIT_NEW_ROUND_MS` | `bft.timeouts.wait_new_round` |
//! | `CS_DATA_DIR` | `wallet.home_dir` |
//! | `CS_WALLET_PASSWORD` | `devnet.wallet_password` |

use cs_02_soft_wallet::{WalletConfig, WalletManagerConfig};
use cs_03_block_pool::PoolConfig;
use cs_04_block_fetcher::FetcherConfig;
use cs_05_bft_state_machine::BftConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Consensus timeouts and queue sizes.
    pub bft: BftConfig,
    pub pool: PoolConfig,
    pub fetcher: FetcherConfig,
    pub wallet: WalletConfig,
    pub wallet_manager: WalletManagerConfig,
    /// Delay between pooling a block and announcing it with `SyncBlock`.
    pub sync_block_delay: Duration,
    /// Blocks per verifier epoch; the last block of an epoch is a change point.
    pub change_point_period: u64,
    /// Size of each epoch's verifier committee.
    pub verifier_number: usize,
    /// Local devnet started by the binary.
    pub devnet: DevnetConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bft: BftConfig::default(),
            pool: PoolConfig::default(),
            fetcher: FetcherConfig::default(),
            wallet: WalletConfig::default(),
            wallet_manager: WalletManagerConfig::default(),
            sync_block_delay: Duration::from_millis(500),
            change_point_period: 10,
            verifier_number: 22,
            devnet: DevnetConfig::default(),
        }
    }
}

/// Local devnet configuration.
#[derive(Debug, Clone)]
pub struct DevnetConfig {
    /// Number of candidate nodes; committees rotate over them when there
    /// are more nodes than `verifier_number`.
    pub nodes: usize,
    /// Password protecting each node's wallet file.
    pub wallet_password: String,
    /// A height without a decision for this long gets a new candidate block
    /// from the next node.
    pub produce_retry: Duration,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            nodes: 4,
            wallet_password: "devnet-password".to_string(),
            produce_retry: Duration::from_secs(15),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("change point period must be positive")]
    ZeroChangePointPeriod,

    #[error("verifier number must be positive")]
    ZeroVerifierNumber,

    #[error("devnet needs at least one node")]
    NoDevnetNodes,
}

impl NodeConfig {
    /// Fast timeouts and cheap wallet parameters rooted at `home_dir`.
    pub fn for_testing(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            bft: BftConfig::for_testing(),
            pool: PoolConfig::for_testing(),
            fetcher: FetcherConfig::for_testing(),
            wallet: WalletConfig::for_testing(home_dir),
            wallet_manager: WalletManagerConfig::for_testing(),
            sync_block_delay: Duration::from_millis(50),
            devnet: DevnetConfig {
                produce_retry: Duration::from_secs(2),
                ..DevnetConfig::default()
            },
            ..Self::default()
        }
    }

    /// Defaults overridden by the process environment, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply every `CS_*` override that `lookup` knows.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(nodes) = parse_var(&lookup, "CS_DEVNET_NODES")? {
            self.devnet.nodes = nodes;
        }
        if let Some(number) = parse_var(&lookup, "CS_VERIFIER_NUMBER")? {
            self.verifier_number = number;
        }
        if let Some(period) = parse_var(&lookup, "CS_CHANGE_POINT_PERIOD")? {
            self.change_point_period = period;
        }
        if let Some(ms) = parse_var(&lookup, "CS_SYNC_BLOCK_DELAY_MS")? {
            self.sync_block_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "CS_FETCH_TIMEOUT_MS")? {
            self.fetcher.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "CS_ROUND_TIMEOUT_MS")? {
            let timeout = Duration::from_millis(ms);
            self.bft.timeouts.proposal = timeout;
            self.bft.timeouts.pre_vote = timeout;
            self.bft.timeouts.pre_commit = timeout;
        }
        if let Some(ms) = parse_var(&lookup, "CS_WAIT_NEW_ROUND_MS")? {
            self.bft.timeouts.wait_new_round = Duration::from_millis(ms);
        }
        if let Some(dir) = lookup("CS_DATA_DIR") {
            self.wallet.home_dir = PathBuf::from(dir);
        }
        if let Some(password) = lookup("CS_WALLET_PASSWORD") {
            self.devnet.wallet_password = password;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.change_point_period == 0 {
            return Err(ConfigError::ZeroChangePointPeriod);
        }
        if self.verifier_number == 0 {
            return Err(ConfigError::ZeroVerifierNumber);
        }
        if self.devnet.nodes == 0 {
            return Err(ConfigError::NoDevnetNodes);
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
