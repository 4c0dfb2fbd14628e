//! Rollout buffer storage and data management
//!
//! This module handles the core storage functionality for the experience
//! buffer: appending transitions, clearing, raw data access and summary
//! statistics.

use serde::{Deserialize, Serialize};

/// One timestep of experience
///
/// `value` and `log_prob` are snapshots taken from the behavior policy when
/// the action was sampled. They are never refreshed during an update; the
/// PPO importance ratio is measured against them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State vector
    pub state: Vec<f32>,

    /// Action vector actually applied (post-clip)
    pub action: Vec<f32>,

    /// Reward received after the action
    pub reward: f32,

    /// Critic estimate at `state`, captured at collection time
    pub value: f32,

    /// Log-density of `action` under the behavior policy
    pub log_prob: f32,

    /// Whether the episode ended on this step
    pub done: bool,
}

/// Append-only experience buffer for PPO
///
/// Stores transitions as parallel columns. `returns` and `advantages` are
/// `None` until [`ExperienceBuffer::compute_returns_and_advantages`] runs and
/// go back to `None` whenever a new transition is appended.
#[derive(Debug, Clone)]
pub struct ExperienceBuffer {
    /// Dimensionality of states
    pub(super) state_dim: usize,

    /// Dimensionality of actions
    pub(super) action_dim: usize,

    /// States [len, state_dim]
    pub(super) states: Vec<Vec<f32>>,

    /// Actions [len, action_dim]
    pub(super) actions: Vec<Vec<f32>>,

    /// Rewards [len]
    pub(super) rewards: Vec<f32>,

    /// Behavior value estimates [len]
    pub(super) values: Vec<f32>,

    /// Behavior log probabilities [len]
    pub(super) log_probs: Vec<f32>,

    /// Episode termination flags [len]
    pub(super) dones: Vec<bool>,

    /// Monte-Carlo returns [len], once computed
    pub(super) returns: Option<Vec<f32>>,

    /// Normalized GAE advantages [len], once computed
    pub(super) advantages: Option<Vec<f32>>,
}

impl ExperienceBuffer {
    /// Create an empty buffer
    ///
    /// # Arguments
    ///
    /// * `state_dim` - Dimensionality of states
    /// * `action_dim` - Dimensionality of actions
    pub fn new(state_dim: usize, action_dim: usize) -> Self {
        Self {
            state_dim,
            action_dim,
            states: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            values: Vec::new(),
            log_probs: Vec::new(),
            dones: Vec::new(),
            returns: None,
            advantages: None,
        }
    }

    /// Append a transition
    ///
    /// Shapes are the caller's responsibility; they are only checked in debug
    /// builds. Appending discards any previously computed returns and
    /// advantages.
    ///
    /// # Arguments
    ///
    /// * `state` - State vector
    /// * `action` - Action applied
    /// * `reward` - Reward received
    /// * `value` - Behavior value estimate
    /// * `log_prob` - Behavior log probability of `action`
    /// * `done` - Whether the episode ended on this step
    pub fn add(
        &mut self,
        state: &[f32],
        action: &[f32],
        reward: f32,
        value: f32,
        log_prob: f32,
        done: bool,
    ) {
        debug_assert_eq!(state.len(), self.state_dim, "state dimension mismatch");
        debug_assert_eq!(action.len(), self.action_dim, "action dimension mismatch");

        self.states.push(state.to_vec());
        self.actions.push(action.to_vec());
        self.rewards.push(reward);
        self.values.push(value);
        self.log_probs.push(log_prob);
        self.dones.push(done);

        self.returns = None;
        self.advantages = None;
    }

    /// Append an owned [`Transition`]
    pub fn push(&mut self, transition: Transition) {
        let Transition { state, action, reward, value, log_prob, done } = transition;
        debug_assert_eq!(state.len(), self.state_dim, "state dimension mismatch");
        debug_assert_eq!(action.len(), self.action_dim, "action dimension mismatch");

        self.states.push(state);
        self.actions.push(action);
        self.rewards.push(reward);
        self.values.push(value);
        self.log_probs.push(log_prob);
        self.dones.push(done);

        self.returns = None;
        self.advantages = None;
    }

    /// Drop every transition and all derived data
    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
        self.values.clear();
        self.log_probs.clear();
        self.dones.clear();
        self.returns = None;
        self.advantages = None;
    }

    /// Number of stored transitions
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// (state_dim, action_dim)
    pub fn dims(&self) -> (usize, usize) {
        (self.state_dim, self.action_dim)
    }

    /// Number of `done = true` markers in the buffer
    pub fn completed_episodes(&self) -> usize {
        self.dones.iter().filter(|&&d| d).count()
    }

    /// Whether returns and advantages are current
    pub fn is_computed(&self) -> bool {
        self.returns.is_some() && self.advantages.is_some()
    }

    /// Copy out the transition at `index`
    pub fn transition(&self, index: usize) -> Option<Transition> {
        (index < self.len()).then(|| Transition {
            state: self.states[index].clone(),
            action: self.actions[index].clone(),
            reward: self.rewards[index],
            value: self.values[index],
            log_prob: self.log_probs[index],
            done: self.dones[index],
        })
    }

    /// Get states
    pub fn states(&self) -> &[Vec<f32>] {
        &self.states
    }

    /// Get actions
    pub fn actions(&self) -> &[Vec<f32>] {
        &self.actions
    }

    /// Get rewards
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Get behavior value estimates
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Get behavior log probabilities
    pub fn log_probs(&self) -> &[f32] {
        &self.log_probs
    }

    /// Get episode termination flags
    pub fn dones(&self) -> &[bool] {
        &self.dones
    }

    /// Monte-Carlo returns, if computed since the last append
    pub fn returns(&self) -> Option<&[f32]> {
        self.returns.as_deref()
    }

    /// Normalized advantages, if computed since the last append
    pub fn advantages(&self) -> Option<&[f32]> {
        self.advantages.as_deref()
    }

    /// Summary statistics
    ///
    /// Never fails: an empty buffer, or one whose returns/advantages have not
    /// been computed yet, reports zeros for the missing parts.
    pub fn stats(&self) -> BufferStats {
        let len = self.len();
        if len == 0 {
            return BufferStats::default();
        }

        let (advantage_mean, advantage_std) =
            self.advantages.as_deref().map(mean_std).unwrap_or((0.0, 0.0));

        BufferStats {
            len,
            completed_episodes: self.completed_episodes(),
            reward_sum: self.rewards.iter().sum(),
            reward_mean: mean_std(&self.rewards).0,
            value_mean: mean_std(&self.values).0,
            return_mean: self.returns.as_deref().map(|r| mean_std(r).0).unwrap_or(0.0),
            advantage_mean,
            advantage_std,
        }
    }
}

/// Summary of buffer contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferStats {
    /// Number of transitions
    pub len: usize,
    /// Number of completed episodes
    pub completed_episodes: usize,
    /// Sum of rewards
    pub reward_sum: f32,
    /// Mean reward per transition
    pub reward_mean: f32,
    /// Mean behavior value estimate
    pub value_mean: f32,
    /// Mean Monte-Carlo return (0 until computed)
    pub return_mean: f32,
    /// Mean advantage (0 until computed)
    pub advantage_mean: f32,
    /// Advantage standard deviation (0 until computed)
    pub advantage_std: f32,
}

/// Population mean and standard deviation; zeros for an empty slice
pub(super) fn mean_std(xs: &[f32]) -> (f32, f32) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let n = xs.len() as f32;
    let mean = xs.iter().sum::<f32>() / n;
    let var = xs.iter().map(|&x| (x - mean).powi(2)).sum::<f32>() / n;
    (mean, var.sqrt())
}
