//! Configuration for the ledger and the node serving it

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fs;
use std::path::Path;

use crate::blockchain::chain::MINING_REWARD;
use crate::blockchain::pow::{ProofOfWork, MAX_DIFFICULTY, MINING_DIFFICULTY};

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Ledger behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading hex zeros required of a proof
    pub difficulty: usize,

    /// Value of the reward paid to the node for each sealed block
    pub mining_reward: f32,

    /// Nonces tried before a search gives up; unbounded when absent
    pub max_attempts: Option<u64>,

    /// Threads used for the nonce search
    pub workers: usize,

    /// Reject transfers whose sender's replayed balance is below the value
    pub require_sufficient_funds: bool,

    /// Reject transfers whose sender is not the address of the signing key
    pub bind_sender_to_key: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: MINING_DIFFICULTY,
            mining_reward: MINING_REWARD,
            max_attempts: None,
            workers: 1,
            require_sufficient_funds: false,
            bind_sender_to_key: false,
        }
    }
}

impl LedgerConfig {
    /// Checks values that would make mining impossible
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds the maximum of {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }

        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }

        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }

        if !self.mining_reward.is_finite() {
            return Err(ConfigError::Invalid("mining_reward must be finite".to_string()));
        }

        Ok(())
    }

    /// Builds the nonce search these settings describe
    pub fn proof_of_work(&self) -> ProofOfWork {
        ProofOfWork::new(self.difficulty)
            .with_max_attempts(self.max_attempts)
            .with_workers(self.workers)
    }
}

/// Node settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub ledger: LedgerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            host: "0.0.0.0".to_string(),
            port: 3333,
            ledger: LedgerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loads and validates a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&raw)?;
        config.ledger.validate()?;
        Ok(config)
    }
}
