//! Policy networks
//!
//! tch-backed actor-critic used for training. A trained policy can be frozen
//! into a [`crate::inference::PolicySnapshot`] for libtorch-free inference.

pub mod actor_critic;
pub mod pretrain;

pub use actor_critic::{ActOutput, ActorCritic, NetworkConfig};
