//! Training statistics for PPO
//!
//! This module defines structures for tracking and aggregating
//! training metrics during PPO training.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Training statistics for a PPO update
///
/// Per-minibatch values are summed with [`TrainingStats::add`] and turned
/// into means with [`TrainingStats::average`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Negated clipped surrogate (without the entropy bonus)
    pub policy_loss: f64,

    /// Critic mean squared error
    pub value_loss: f64,

    /// Policy entropy
    pub entropy: f64,

    /// Fraction of samples whose ratio left the trust region
    pub clip_fraction: f64,

    /// Approximate KL divergence between old and new policies
    pub approx_kl: f64,

    /// Explained variance of value function predictions
    pub explained_var: f64,

    /// Number of minibatches these statistics cover
    pub num_minibatches: usize,
}

impl TrainingStats {
    /// Create zero-initialized statistics
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Statistics for a single minibatch
    pub fn new(
        policy_loss: f64,
        value_loss: f64,
        entropy: f64,
        clip_fraction: f64,
        approx_kl: f64,
        explained_var: f64,
    ) -> Self {
        Self {
            policy_loss,
            value_loss,
            entropy,
            clip_fraction,
            approx_kl,
            explained_var,
            num_minibatches: 1,
        }
    }

    /// Add another statistics instance to this one
    pub fn add(&mut self, other: &TrainingStats) {
        self.policy_loss += other.policy_loss;
        self.value_loss += other.value_loss;
        self.entropy += other.entropy;
        self.clip_fraction += other.clip_fraction;
        self.approx_kl += other.approx_kl;
        self.explained_var += other.explained_var;
        self.num_minibatches += other.num_minibatches;
    }

    /// Compute average statistics across the summed minibatches
    ///
    /// `num_minibatches` is preserved so callers can still tell how much
    /// data the means came from.
    pub fn average(&self) -> Self {
        if self.num_minibatches == 0 {
            return Self::zeros();
        }
        let scale = self.num_minibatches as f64;

        Self {
            policy_loss: self.policy_loss / scale,
            value_loss: self.value_loss / scale,
            entropy: self.entropy / scale,
            clip_fraction: self.clip_fraction / scale,
            approx_kl: self.approx_kl / scale,
            explained_var: self.explained_var / scale,
            num_minibatches: self.num_minibatches,
        }
    }
}

impl AddAssign<&TrainingStats> for TrainingStats {
    fn add_assign(&mut self, other: &TrainingStats) {
        self.add(other);
    }
}

/// Aggregated training statistics across updates
///
/// Provides summary statistics and trends for monitoring training progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedStats {
    /// Statistics from the latest update
    pub current: TrainingStats,

    /// Exponential moving average of recent updates
    pub running_avg: TrainingStats,

    /// Best policy loss achieved so far
    pub best_policy_loss: f64,

    /// Best value loss achieved so far
    pub best_value_loss: f64,

    /// Number of updates folded in
    pub total_updates: usize,
}

impl Default for AggregatedStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatedStats {
    /// Smoothing factor of the running average
    pub const ALPHA: f64 = 0.1;

    /// Create new aggregated statistics
    pub fn new() -> Self {
        Self {
            current: TrainingStats::zeros(),
            running_avg: TrainingStats::zeros(),
            best_policy_loss: f64::INFINITY,
            best_value_loss: f64::INFINITY,
            total_updates: 0,
        }
    }

    /// Update with new training statistics
    ///
    /// The first update seeds the running average directly.
    pub fn update(&mut self, stats: &TrainingStats) {
        self.current = stats.clone();
        self.total_updates += 1;

        if self.total_updates == 1 {
            self.running_avg = stats.clone();
        } else {
            let ema = |old: f64, new: f64| Self::ALPHA * new + (1.0 - Self::ALPHA) * old;
            let avg = &mut self.running_avg;
            avg.policy_loss = ema(avg.policy_loss, stats.policy_loss);
            avg.value_loss = ema(avg.value_loss, stats.value_loss);
            avg.entropy = ema(avg.entropy, stats.entropy);
            avg.clip_fraction = ema(avg.clip_fraction, stats.clip_fraction);
            avg.approx_kl = ema(avg.approx_kl, stats.approx_kl);
            avg.explained_var = ema(avg.explained_var, stats.explained_var);
            avg.num_minibatches = stats.num_minibatches;
        }

        self.best_policy_loss = self.best_policy_loss.min(stats.policy_loss);
        self.best_value_loss = self.best_value_loss.min(stats.value_loss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_average() {
        let mut sum = TrainingStats::zeros();
        sum += &TrainingStats::new(1.0, 4.0, 0.5, 0.1, 0.01, 0.2);
        sum += &TrainingStats::new(3.0, 2.0, 0.5, 0.3, 0.03, 0.4);

        let avg = sum.average();
        assert_eq!(avg.num_minibatches, 2);
        assert!((avg.policy_loss - 2.0).abs() < 1e-12);
        assert!((avg.value_loss - 3.0).abs() < 1e-12);
        assert!((avg.clip_fraction - 0.2).abs() < 1e-12);
        assert!((avg.explained_var - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_average_of_nothing_is_zero() {
        assert_eq!(TrainingStats::zeros().average(), TrainingStats::zeros());
    }

    #[test]
    fn test_aggregated_running_average() {
        let mut agg = AggregatedStats::new();
        agg.update(&TrainingStats::new(1.0, 10.0, 0.0, 0.0, 0.0, 0.0));
        assert_eq!(agg.running_avg.value_loss, 10.0);

        agg.update(&TrainingStats::new(-1.0, 0.0, 0.0, 0.0, 0.0, 0.0));
        assert!((agg.running_avg.value_loss - 9.0).abs() < 1e-12);
        assert!((agg.running_avg.policy_loss - 0.8).abs() < 1e-12);

        assert_eq!(agg.best_policy_loss, -1.0);
        assert_eq!(agg.best_value_loss, 0.0);
        assert_eq!(agg.total_updates, 2);
    }
}
