//! Rollout buffer for storing and processing episodes
//!
//! This module implements experience storage for PPO training, including:
//! - Transition storage (states, actions, rewards, behavior values/log-probs)
//! - Monte-Carlo returns (critic targets) and GAE advantages (actor targets)
//! - Subsampled, shuffled minibatching
//!
//! # Buffer Layout
//!
//! Unlike a fixed `[num_steps, num_envs]` rollout, the buffer is a single
//! append-only sequence. The surrounding loop flushes one agent's *completed*
//! episode at a time, so every episode occupies a contiguous run that ends
//! with `done = true`. Both backward passes rely on that: a `done` flag cuts
//! return and advantage propagation at the episode boundary.
//!
//! # Example
//!
//! ```rust
//! use steer_rl::buffer::rollout::ExperienceBuffer;
//!
//! let mut buffer = ExperienceBuffer::new(2, 1);
//! buffer.add(&[0.1, 0.2], &[0.5], 1.0, 0.3, -0.9, false);
//! buffer.add(&[0.2, 0.1], &[-0.5], 1.0, 0.2, -0.8, true);
//!
//! buffer.compute_returns_and_advantages(0.0, 0.99, 0.95);
//! assert_eq!(buffer.returns().unwrap().len(), 2);
//! ```

mod gae;
mod sampling;
mod storage;


pub use gae::{compute_gae, compute_mc_returns, normalize_advantages, ADVANTAGE_EPSILON};
pub use sampling::{partition_minibatches, subsample_indices, Minibatch};
pub use storage::{BufferStats, ExperienceBuffer, Transition};
