//! PPO configuration and hyperparameters
//!
//! This module defines the configuration parameters for PPO training
//! and provides validation and builder pattern methods.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// PPO configuration parameters
///
/// Defaults suit a single steering output trained from a few dozen
/// completed episodes per update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOConfig {
    /// Adam learning rate, shared by the actor and critic optimizers
    pub learning_rate: f64,

    /// Passes over the buffer per update
    pub n_epochs: usize,

    /// Minibatch size for training
    pub batch_size: usize,

    /// Discount factor (gamma)
    pub gamma: f64,

    /// GAE lambda parameter
    pub gae_lambda: f64,

    /// PPO clipping parameter (epsilon)
    pub clip_range: f64,

    /// Entropy bonus coefficient
    pub ent_coef: f64,

    /// Value loss coefficient
    ///
    /// Inert: the critic has its own optimizer, so its loss is never summed
    /// with the policy loss. Kept so configurations written for
    /// shared-network trainers still load.
    pub vf_coef: f64,

    /// Per-network gradient norm clip, off when `None`
    pub max_grad_norm: Option<f64>,

    /// Stop after the first epoch whose mean approximate KL exceeds this
    pub target_kl: Option<f64>,
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            n_epochs: 4,
            batch_size: 64,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: 0.1,
            ent_coef: 0.01,
            vf_coef: 0.5,
            max_grad_norm: None,
            target_kl: None,
        }
    }
}

impl PPOConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            return Err(anyhow!("learning_rate must be positive"));
        }
        if self.n_epochs == 0 {
            return Err(anyhow!("n_epochs must be positive"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be positive"));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(anyhow!("gamma must be in (0, 1]"));
        }
        if !(self.gae_lambda > 0.0 && self.gae_lambda <= 1.0) {
            return Err(anyhow!("gae_lambda must be in (0, 1]"));
        }
        if !(self.clip_range > 0.0 && self.clip_range < 1.0) {
            return Err(anyhow!("clip_range must be in (0, 1)"));
        }
        if self.ent_coef < 0.0 {
            return Err(anyhow!("ent_coef must be non-negative"));
        }
        if self.vf_coef < 0.0 {
            return Err(anyhow!("vf_coef must be non-negative"));
        }
        if self.max_grad_norm.is_some_and(|n| n <= 0.0) {
            return Err(anyhow!("max_grad_norm must be positive"));
        }
        if self.target_kl.is_some_and(|kl| kl <= 0.0) {
            return Err(anyhow!("target_kl must be positive"));
        }
        Ok(())
    }

    /// Set learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set number of training epochs
    pub fn n_epochs(mut self, epochs: usize) -> Self {
        self.n_epochs = epochs;
        self
    }

    /// Set minibatch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn gae_lambda(mut self, lambda: f64) -> Self {
        self.gae_lambda = lambda;
        self
    }

    /// Set PPO clipping parameter
    pub fn clip_range(mut self, clip: f64) -> Self {
        self.clip_range = clip;
        self
    }

    /// Set entropy bonus coefficient
    pub fn ent_coef(mut self, coef: f64) -> Self {
        self.ent_coef = coef;
        self
    }

    /// Set value function loss coefficient
    pub fn vf_coef(mut self, coef: f64) -> Self {
        self.vf_coef = coef;
        self
    }

    /// Enable gradient norm clipping
    pub fn max_grad_norm(mut self, norm: f64) -> Self {
        self.max_grad_norm = Some(norm);
        self
    }

    /// Enable KL early stopping
    pub fn target_kl(mut self, kl: f64) -> Self {
        self.target_kl = Some(kl);
        self
    }
}
