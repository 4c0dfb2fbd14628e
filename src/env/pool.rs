//! Vectorized environment pool for parallel execution
//!
//! Steps many independent vehicles at once using Rayon. Every environment in
//! a pool shares the same state and action layout.
//!
//! # Example
//!
//! ```rust
//! use steer_rl::env::{
//!     corridor::{Corridor, CorridorConfig},
//!     pool::EnvPool,
//! };
//!
//! // Create pool with 4 parallel environments
//! let envs = (0..4)
//!     .map(|_| Corridor::new(CorridorConfig::default()))
//!     .collect::<anyhow::Result<Vec<_>>>()
//!     .unwrap();
//! let mut pool = EnvPool::from_envs(envs);
//!
//! // Reset all environments in parallel
//! let states = pool.reset().unwrap();
//!
//! // Step all environments in parallel, one steering command each
//! let actions = vec![vec![0.0]; 4];
//! let results = pool.step(&actions).unwrap();
//! assert_eq!(results.len(), states.len());
//! ```

use anyhow::{ensure, Context, Result};
use rayon::prelude::*;

use crate::env::{Environment, StepResult};

/// A pool of environments for parallel execution
///
/// For N environments with average step time T, a sequential loop costs
/// O(N * T); the pool costs roughly O(T) while N stays below the core count.
pub struct EnvPool<E: Environment> {
    /// Vector of environment instances
    envs: Vec<E>,
}

impl<E: Environment + Send + Sync> EnvPool<E> {
    /// Create a new environment pool
    ///
    /// # Arguments
    ///
    /// * `env_fn` - Factory function to create environment instances
    /// * `num_envs` - Number of parallel environments
    pub fn new<F>(env_fn: F, num_envs: usize) -> Self
    where
        F: FnMut() -> E,
    {
        let envs = std::iter::repeat_with(env_fn).take(num_envs).collect();
        Self { envs }
    }

    /// Build a pool from already constructed environments
    pub fn from_envs(envs: Vec<E>) -> Self {
        Self { envs }
    }

    /// Reset all environments in parallel
    ///
    /// Returns the initial states, one per environment.
    pub fn reset(&mut self) -> Result<Vec<Vec<f32>>> {
        self.envs.par_iter_mut().map(|env| env.reset()).collect()
    }

    /// Step all environments in parallel with given actions
    ///
    /// Finished environments are *not* reset automatically; the caller
    /// decides when to call [`EnvPool::reset_env`].
    ///
    /// # Arguments
    ///
    /// * `actions` - One action vector per environment
    pub fn step(&mut self, actions: &[Vec<f32>]) -> Result<Vec<StepResult>> {
        ensure!(
            actions.len() == self.envs.len(),
            "Number of actions ({}) must match number of environments ({})",
            actions.len(),
            self.envs.len()
        );

        self.envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .enumerate()
            .map(|(i, (env, action))| {
                env.step(action).with_context(|| format!("environment {i} failed to step"))
            })
            .collect()
    }

    /// Reset a specific environment by index
    ///
    /// # Returns
    ///
    /// Initial state of the reset environment
    pub fn reset_env(&mut self, env_id: usize) -> Result<Vec<f32>> {
        let num_envs = self.envs.len();
        let env = self
            .envs
            .get_mut(env_id)
            .with_context(|| format!("environment {env_id} out of range (pool has {num_envs})"))?;
        env.reset()
    }

    /// Current state of every environment
    pub fn states(&self) -> Vec<Vec<f32>> {
        self.envs.par_iter().map(|env| env.state()).collect()
    }

    /// Get the number of environments in the pool
    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    /// State vector length, taken from the first environment
    pub fn state_dim(&self) -> Option<usize> {
        self.envs.first().map(|env| env.state_dim())
    }

    /// Action vector length, taken from the first environment
    pub fn action_dim(&self) -> Option<usize> {
        self.envs.first().map(|env| env.action_dim())
    }

    /// Borrow one environment
    pub fn env(&self, env_id: usize) -> Option<&E> {
        self.envs.get(env_id)
    }
}
