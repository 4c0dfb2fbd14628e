//! Environment boundary
//!
//! The training core never simulates vehicles itself. Whatever does (a
//! physics step, LIDAR raycasts against the track, collision checks) sits
//! behind [`Environment`] and hands back fixed-shape state vectors, a scalar
//! reward and a termination flag.
//!
//! State layout used throughout the crate:
//!
//! ```text
//! [ range_0 .. range_{k-1} | speed | heading_error ]
//!   normalized to [0, 1]     [0, 1]  signed, [-1, 1]
//! ```

use anyhow::Result;

/// Core trait for simulated driving environments
pub trait Environment {
    /// Reset the environment and return the initial state
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Apply an action for one tick
    fn step(&mut self, action: &[f32]) -> Result<StepResult>;

    /// Current state without advancing the simulation
    fn state(&self) -> Vec<f32>;

    /// Length of state vectors
    fn state_dim(&self) -> usize;

    /// Length of action vectors
    fn action_dim(&self) -> usize;
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Next state
    pub state: Vec<f32>,

    /// Reward received
    pub reward: f32,

    /// Whether the episode ended (crash or time limit)
    pub done: bool,

    /// Additional info
    pub info: StepInfo,
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// The vehicle left the drivable area
    pub crashed: bool,

    /// Steps taken in the current episode
    pub episode_steps: usize,
}

pub mod corridor;
pub mod pool;
