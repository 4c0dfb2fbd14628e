//! Proximal Policy Optimization (PPO)
//!
//! # Algorithm Overview
//!
//! ```text
//! Collect whole episodes with the current policy
//! Compute Monte-Carlo returns (critic targets) and GAE advantages (actor targets)
//! For n_epochs:
//!     Shuffle the buffer into disjoint minibatches
//!     For each minibatch:
//!         actor step:  -mean(min(r·A, clip(r, 1-ε, 1+ε)·A)) - c_ent·H
//!         clamp log-std
//!         critic step: mean((V(s) - R)²)
//! Clear the buffer
//! ```
//!
//! Actor and critic never share parameters, so each has its own Adam
//! optimizer and the value loss needs no weighting against the policy loss.
//!
//! # References
//!
//! - [Proximal Policy Optimization Algorithms](https://arxiv.org/abs/1707.06347)
//! - [High-Dimensional Continuous Control Using GAE](https://arxiv.org/abs/1506.02438)

mod config;
mod loss;
mod stats;
mod trainer;

pub use config::PPOConfig;
pub use loss::{clipped_surrogate, compute_policy_loss, compute_value_loss};
pub use stats::{AggregatedStats, TrainingStats};
pub use trainer::PPOTrainer;
