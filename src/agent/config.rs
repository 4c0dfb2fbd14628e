//! Agent configuration
//!
//! One serializable document covering the PPO hyperparameters, the network
//! architecture and the agent-level knobs (update cadence, pretraining,
//! seeding). Missing JSON fields fall back to their defaults.

use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{policy::NetworkConfig, train::ppo::PPOConfig};

/// Full agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// PPO hyperparameters
    pub ppo: PPOConfig,

    /// Actor and critic architecture
    pub network: NetworkConfig,

    /// Completed episodes since the last update needed to trigger the next
    pub min_episodes_per_update: usize,

    /// Keep every N-th transition when batching (1 keeps all)
    pub subsample_ratio: usize,

    /// Synthetic samples for actor warm-start (0 disables pretraining)
    pub pretrain_samples: usize,

    /// Full-batch pretraining epochs
    pub pretrain_epochs: usize,

    /// Counter-steer gain of the pretraining heuristic
    pub pretrain_gain: f32,

    /// Pretraining learning rate
    pub pretrain_learning_rate: f64,

    /// Seed for weight init, action noise and shuffling; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ppo: PPOConfig::default(),
            network: NetworkConfig::default(),
            min_episodes_per_update: 16,
            subsample_ratio: 1,
            pretrain_samples: 2048,
            pretrain_epochs: 200,
            pretrain_gain: 2.0,
            pretrain_learning_rate: 1e-3,
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set PPO hyperparameters
    pub fn ppo(mut self, ppo: PPOConfig) -> Self {
        self.ppo = ppo;
        self
    }

    /// Set network architecture
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Set the update threshold
    pub fn min_episodes_per_update(mut self, episodes: usize) -> Self {
        self.min_episodes_per_update = episodes;
        self
    }

    /// Set the batching subsample ratio
    pub fn subsample_ratio(mut self, ratio: usize) -> Self {
        self.subsample_ratio = ratio;
        self
    }

    /// Set pretraining size; `0` samples skips pretraining
    pub fn pretrain(mut self, samples: usize, epochs: usize) -> Self {
        self.pretrain_samples = samples;
        self.pretrain_epochs = epochs;
        self
    }

    /// Fix the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.ppo.validate().context("invalid PPO config")?;
        self.network.validate().context("invalid network config")?;
        ensure!(self.min_episodes_per_update > 0, "min_episodes_per_update must be positive");
        ensure!(self.subsample_ratio > 0, "subsample_ratio must be positive");
        ensure!(self.pretrain_gain > 0.0, "pretrain_gain must be positive");
        ensure!(self.pretrain_learning_rate > 0.0, "pretrain_learning_rate must be positive");
        Ok(())
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
