//! Return and advantage computation
//!
//! Two backward passes over the buffer:
//! - Monte-Carlo discounted returns, used as critic targets
//! - Generalized Advantage Estimation (GAE), used as actor targets
//!
//! The critic regresses on true discounted sums of completed episodes rather
//! than on TD(λ) targets built from its own estimates. The external bootstrap
//! value only ever reaches the still-running tail at the end of the buffer.

use super::storage::{mean_std, ExperienceBuffer};

/// Added to the advantage standard deviation before dividing
pub const ADVANTAGE_EPSILON: f32 = 1e-8;

/// Compute Monte-Carlo discounted returns
///
/// ```text
/// G = bootstrap
/// for t = n-1 .. 0:
///     G = done_t ? r_t : r_t + γ * G
/// ```
///
/// A `done` flag throws away everything accumulated after it, including the
/// bootstrap: the episode is over, there is no future reward.
///
/// # Arguments
/// * `rewards` - Rewards [n]
/// * `dones` - Episode termination flags [n]
/// * `bootstrap_value` - Continuation value after the last step
/// * `gamma` - Discount factor
pub fn compute_mc_returns(
    rewards: &[f32],
    dones: &[bool],
    bootstrap_value: f32,
    gamma: f32,
) -> Vec<f32> {
    debug_assert_eq!(rewards.len(), dones.len());

    let mut returns = vec![0.0; rewards.len()];
    let mut running = bootstrap_value;

    for t in (0..rewards.len()).rev() {
        running = if dones[t] { rewards[t] } else { rewards[t] + gamma * running };
        returns[t] = running;
    }

    returns
}

/// Compute Generalized Advantage Estimation (GAE)
///
/// # Mathematical Formula
/// ```text
/// δ_t = r_t + γ * V_{t+1} * (1 - done_t) - V_t
/// A_t = δ_t + γ * λ * (1 - done_t) * A_{t+1}
/// ```
///
/// `V_{t+1}` is the next stored value, or `bootstrap_value` at the last
/// index. The returned advantages are *not* normalized.
///
/// # Arguments
/// * `rewards` - Rewards [n]
/// * `values` - Behavior value estimates [n]
/// * `dones` - Episode termination flags [n]
/// * `bootstrap_value` - Value estimate after the last step
/// * `gamma` - Discount factor (0 < gamma <= 1)
/// * `gae_lambda` - GAE lambda parameter (0 < lambda <= 1)
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    bootstrap_value: f32,
    gamma: f32,
    gae_lambda: f32,
) -> Vec<f32> {
    let n = rewards.len();
    debug_assert_eq!(values.len(), n);
    debug_assert_eq!(dones.len(), n);

    let mut advantages = vec![0.0; n];
    let mut gae = 0.0;

    for t in (0..n).rev() {
        let next_value = if t + 1 == n { bootstrap_value } else { values[t + 1] };
        let not_done = if dones[t] { 0.0 } else { 1.0 };

        let delta = rewards[t] + gamma * next_value * not_done - values[t];
        gae = delta + gamma * gae_lambda * not_done * gae;
        advantages[t] = gae;
    }

    advantages
}

/// Normalize advantages in place to zero mean and unit standard deviation
///
/// Uses the population standard deviation. A zero-variance input ends up as
/// all zeros thanks to [`ADVANTAGE_EPSILON`].
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }

    let (mean, std) = mean_std(advantages);
    let denom = std + ADVANTAGE_EPSILON;

    for a in advantages.iter_mut() {
        *a = (*a - mean) / denom;
    }
}

impl ExperienceBuffer {
    /// Compute Monte-Carlo returns and normalized GAE advantages
    ///
    /// Always recomputes over the whole buffer. Safe on an empty buffer
    /// (both sequences become empty).
    ///
    /// # Arguments
    ///
    /// * `bootstrap_value` - Continuation value for the unfinished tail
    /// * `gamma` - Discount factor (typically 0.99)
    /// * `gae_lambda` - GAE lambda parameter (typically 0.95)
    pub fn compute_returns_and_advantages(
        &mut self,
        bootstrap_value: f32,
        gamma: f32,
        gae_lambda: f32,
    ) {
        let returns = compute_mc_returns(&self.rewards, &self.dones, bootstrap_value, gamma);

        let mut advantages = compute_gae(
            &self.rewards,
            &self.values,
            &self.dones,
            bootstrap_value,
            gamma,
            gae_lambda,
        );
        normalize_advantages(&mut advantages);

        self.returns = Some(returns);
        self.advantages = Some(advantages);
    }
}
