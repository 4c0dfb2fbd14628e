//! Training algorithms
//!
//! PPO itself lives in [`ppo`]; [`runner`] is the collection loop that feeds
//! it from a pool of environments.

pub mod ppo;
pub mod runner;

pub use ppo::{AggregatedStats, PPOConfig, PPOTrainer, TrainingStats};
pub use runner::Runner;
