//! # steer-rl
//!
//! PPO training core for continuous steering control.
//!
//! A fleet of simulated vehicles feeds fixed-shape state vectors into an
//! [`agent::Agent`], which samples steering actions from a Gaussian policy,
//! accumulates whole episodes of experience and periodically runs a PPO
//! update: Monte-Carlo returns train the critic, normalized GAE advantages
//! train the actor through the clipped surrogate objective.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use steer_rl::prelude::*;
//!
//! # #[cfg(feature = "training")]
//! # fn main() -> anyhow::Result<()> {
//! let mut agent = Agent::new(AgentConfig::default())?;
//! let state = vec![0.5_f32; 10];
//!
//! let out = agent.act(&state)?;
//! agent.store(&state, &out.action, 1.0, out.value, out.log_prob, true)?;
//!
//! if agent.should_update() {
//!     let stats = agent.update(&[])?;
//!     println!("policy loss {:.4}", stats.policy_loss);
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "training"))]
//! # fn main() {}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Environment boundary and the corridor test environment
pub mod env;

/// Experience storage, return/advantage computation and minibatching
pub mod buffer;

/// Pure Rust policy snapshots (no libtorch needed)
pub mod inference;

/// Actor/critic networks (requires training feature)
#[cfg(feature = "training")]
pub mod policy;

/// PPO update procedure and rollout runner (requires training feature)
#[cfg(feature = "training")]
pub mod train;

/// Agent façade tying policy, buffer and trainer together (requires training
/// feature)
#[cfg(feature = "training")]
pub mod agent;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        buffer::rollout::{ExperienceBuffer, Minibatch, Transition},
        env::{Environment, StepResult},
        inference::PolicySnapshot,
    };

    #[cfg(feature = "training")]
    pub use crate::{
        agent::{ActOutput, Agent, AgentConfig, Diagnostics, Phase},
        policy::{ActorCritic, NetworkConfig},
        train::ppo::{PPOConfig, PPOTrainer, TrainingStats},
    };
}

/// Current version of steer-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
