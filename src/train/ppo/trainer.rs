//! PPO Trainer implementation
//!
//! Owns the two optimizers and the shuffling RNG. The policy and buffer are
//! borrowed mutably for the duration of [`PPOTrainer::update`], which runs
//! to completion before returning.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use tch::{
    nn::{self, OptimizerConfig},
    Kind, Tensor,
};
use tracing::{debug, info, warn};

use super::{
    config::PPOConfig,
    loss::{compute_policy_loss, compute_value_loss},
    stats::TrainingStats,
};
use crate::{
    buffer::rollout::{ExperienceBuffer, Minibatch},
    policy::ActorCritic,
};

/// Minibatch tensors
struct BatchTensors {
    states: Tensor,
    actions: Tensor,
    returns: Tensor,
    advantages: Tensor,
    old_log_probs: Tensor,
}

impl BatchTensors {
    fn from_minibatch(batch: &Minibatch) -> Self {
        let (n, state_dim) = batch.state_shape();
        let (_, action_dim) = batch.action_shape();
        let n = n as i64;

        Self {
            states: Tensor::from_slice(&batch.states).view([n, state_dim as i64]),
            actions: Tensor::from_slice(&batch.actions).view([n, action_dim as i64]),
            returns: Tensor::from_slice(&batch.returns),
            advantages: Tensor::from_slice(&batch.advantages),
            old_log_probs: Tensor::from_slice(&batch.old_log_probs),
        }
    }
}

fn build_optimizers(
    config: &PPOConfig,
    policy: &ActorCritic,
) -> Result<(nn::Optimizer, nn::Optimizer)> {
    let actor = nn::Adam::default()
        .build(policy.actor_var_store(), config.learning_rate)
        .context("building actor optimizer")?;
    let critic = nn::Adam::default()
        .build(policy.critic_var_store(), config.learning_rate)
        .context("building critic optimizer")?;
    Ok((actor, critic))
}

/// PPO Trainer with separate actor and critic optimizers
pub struct PPOTrainer {
    config: PPOConfig,
    actor_optimizer: nn::Optimizer,
    critic_optimizer: nn::Optimizer,
    rng: StdRng,
    total_updates: usize,
}

impl std::fmt::Debug for PPOTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PPOTrainer")
            .field("config", &self.config)
            .field("total_updates", &self.total_updates)
            .finish_non_exhaustive()
    }
}

impl PPOTrainer {
    /// Create a new PPO trainer
    ///
    /// Builds one Adam optimizer over the policy's actor store (weights and
    /// log-std) and another over its critic store.
    ///
    /// # Arguments
    ///
    /// * `config` - PPO configuration parameters
    /// * `policy` - Networks the optimizers will drive
    /// * `rng` - Shuffling source for minibatches
    pub fn new(config: PPOConfig, policy: &ActorCritic, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let (actor_optimizer, critic_optimizer) = build_optimizers(&config, policy)?;
        Ok(Self { config, actor_optimizer, critic_optimizer, rng, total_updates: 0 })
    }

    /// Replace both optimizers with fresh ones
    ///
    /// Adam moment estimates belong to the parameters they were accumulated
    /// on; call this after loading new parameters into `policy`.
    pub fn reset_optimizers(&mut self, policy: &ActorCritic) -> Result<()> {
        let (actor_optimizer, critic_optimizer) = build_optimizers(&self.config, policy)?;
        self.actor_optimizer = actor_optimizer;
        self.critic_optimizer = critic_optimizer;
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    /// Updates that took at least one gradient step
    pub fn total_updates(&self) -> usize {
        self.total_updates
    }

    /// Run one full PPO update and clear the buffer
    ///
    /// # Arguments
    ///
    /// * `policy` - Networks to optimize
    /// * `buffer` - Collected experience; empty on return
    /// * `bootstrap_value` - Continuation value for the unfinished tail
    /// * `subsample_ratio` - Keep every N-th transition when batching
    ///
    /// # Returns
    ///
    /// Mean statistics over the minibatches of the last epoch that ran. When
    /// the buffer is too small for a single minibatch nothing is trained, the
    /// update is not counted and the statistics are all zero.
    pub fn update(
        &mut self,
        policy: &mut ActorCritic,
        buffer: &mut ExperienceBuffer,
        bootstrap_value: f32,
        subsample_ratio: usize,
    ) -> Result<TrainingStats> {
        buffer.compute_returns_and_advantages(
            bootstrap_value,
            self.config.gamma as f32,
            self.config.gae_lambda as f32,
        );

        let mut last_epoch = TrainingStats::zeros();

        for epoch in 0..self.config.n_epochs {
            let batches =
                buffer.get_batches(self.config.batch_size, subsample_ratio, &mut self.rng);
            if batches.is_empty() {
                warn!(
                    buffer_len = buffer.len(),
                    batch_size = self.config.batch_size,
                    "Not enough transitions for a single minibatch; skipping update"
                );
                break;
            }

            let mut epoch_stats = TrainingStats::zeros();
            for batch in &batches {
                epoch_stats += &self.train_minibatch(policy, batch)?;
            }
            last_epoch = epoch_stats.average();

            debug!(
                epoch,
                minibatches = batches.len(),
                policy_loss = last_epoch.policy_loss,
                value_loss = last_epoch.value_loss,
                approx_kl = last_epoch.approx_kl,
                "PPO epoch"
            );

            if let Some(target_kl) = self.config.target_kl {
                if last_epoch.approx_kl > target_kl {
                    debug!(epoch, approx_kl = last_epoch.approx_kl, target_kl, "KL early stop");
                    break;
                }
            }
        }

        let transitions = buffer.len();
        buffer.clear();
        if last_epoch.num_minibatches == 0 {
            return Ok(last_epoch);
        }
        self.total_updates += 1;

        info!(
            update = self.total_updates,
            transitions,
            policy_loss = last_epoch.policy_loss,
            value_loss = last_epoch.value_loss,
            entropy = last_epoch.entropy,
            approx_kl = last_epoch.approx_kl,
            clip_fraction = last_epoch.clip_fraction,
            explained_var = last_epoch.explained_var,
            "PPO update complete"
        );

        Ok(last_epoch)
    }

    /// One actor step followed by one critic step
    fn train_minibatch(
        &mut self,
        policy: &mut ActorCritic,
        batch: &Minibatch,
    ) -> Result<TrainingStats> {
        let t = BatchTensors::from_minibatch(batch);

        // Actor: clipped surrogate minus entropy bonus, then clamp log-std
        let means = policy.actor_mean(&t.states);
        let log_probs = policy.compute_log_prob(&means, &t.actions);
        let (policy_loss, clip_fraction, approx_kl) = compute_policy_loss(
            &log_probs,
            &t.old_log_probs,
            &t.advantages,
            self.config.clip_range,
        );
        let entropy = policy.entropy_tensor();
        let actor_loss = &policy_loss - &entropy * self.config.ent_coef;

        self.actor_optimizer.zero_grad();
        actor_loss.backward();
        if let Some(max_norm) = self.config.max_grad_norm {
            self.actor_optimizer.clip_grad_norm(max_norm);
        }
        self.actor_optimizer.step();
        policy.clamp_log_std();

        // Critic: plain regression onto Monte-Carlo returns
        let values = policy.values(&t.states);
        let (value_loss, explained_var) = compute_value_loss(&values, &t.returns);

        self.critic_optimizer.zero_grad();
        value_loss.backward();
        if let Some(max_norm) = self.config.max_grad_norm {
            self.critic_optimizer.clip_grad_norm(max_norm);
        }
        self.critic_optimizer.step();

        Ok(TrainingStats::new(
            f64::try_from(&policy_loss)?,
            f64::try_from(&value_loss)?,
            f64::try_from(entropy.detach().to_kind(Kind::Double))?,
            clip_fraction,
            approx_kl,
            explained_var,
        ))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::policy::NetworkConfig;

    fn setup(config: PPOConfig) -> (ActorCritic, PPOTrainer) {
        tch::manual_seed(0);
        let network =
            NetworkConfig::default().dims(3, 1).actor_hidden(vec![16]).critic_hidden(vec![16]);
        let policy = ActorCritic::new(network).unwrap();
        let trainer = PPOTrainer::new(config, &policy, StdRng::seed_from_u64(0)).unwrap();
        (policy, trainer)
    }

    /// Episodes of `len` steps where steering toward the sign of the heading
    /// error is rewarded
    fn collect(policy: &ActorCritic, episodes: usize, len: usize) -> ExperienceBuffer {
        let mut buffer = ExperienceBuffer::new(3, 1);
        for e in 0..episodes {
            for t in 0..len {
                let heading = ((e * len + t) as f32 * 0.37).sin();
                let state = [0.5, 0.5, heading];
                let out = policy.act(&state).unwrap();
                let reward = -(out.action[0] + heading).abs();
                buffer.add(&state, &out.action, reward, out.value, out.log_prob, t + 1 == len);
            }
        }
        buffer
    }

    #[test]
    fn test_update_clears_buffer() {
        let (mut policy, mut trainer) = setup(PPOConfig::new().batch_size(16).n_epochs(2));
        let mut buffer = collect(&policy, 4, 16);

        let stats = trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();

        assert!(buffer.is_empty());
        assert!(buffer.returns().is_none());
        assert_eq!(stats.num_minibatches, 4);
        assert!(stats.policy_loss.is_finite());
        assert!(stats.value_loss.is_finite());
        assert_eq!(trainer.total_updates(), 1);
    }

    #[test]
    fn test_first_minibatch_starts_at_ratio_one() {
        let (mut policy, mut trainer) = setup(PPOConfig::new().batch_size(64).n_epochs(1));
        let mut buffer = collect(&policy, 1, 64);

        let stats = trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();

        // A single minibatch is evaluated before any step is taken
        assert_eq!(stats.num_minibatches, 1);
        assert_eq!(stats.clip_fraction, 0.0);
        assert!(stats.approx_kl.abs() < 1e-6);
    }

    #[test]
    fn test_log_std_clamped_after_update() {
        // A huge entropy bonus drives log-std upward every step
        let config = PPOConfig::new().batch_size(8).n_epochs(4).ent_coef(100.0).learning_rate(0.5);
        let (mut policy, mut trainer) = setup(config);
        let mut buffer = collect(&policy, 4, 8);

        trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();

        let log_std = policy.log_std().unwrap();
        assert_eq!(log_std, vec![1.0]);
    }

    #[test]
    fn test_log_std_clamped_at_lower_bound() {
        tch::manual_seed(0);
        let network = NetworkConfig::default()
            .dims(3, 1)
            .actor_hidden(vec![16])
            .critic_hidden(vec![16])
            .log_std_range(-0.55, 1.0);
        let mut policy = ActorCritic::new(network).unwrap();
        // One minibatch, one actor step, no entropy bonus pulling upward
        let config = PPOConfig::new().batch_size(16).n_epochs(1).ent_coef(0.0).learning_rate(0.5);
        let mut trainer = PPOTrainer::new(config, &policy, StdRng::seed_from_u64(0)).unwrap();

        // Actions at the mean are rewarded and actions 1.5σ away punished,
        // so every sample pulls log-std down
        let state = [0.5, 0.5, 0.0];
        let out = policy.act(&state).unwrap();
        let (mean, std) = (out.mean[0], policy.log_std().unwrap()[0].exp());
        let samples: Vec<(f32, f32)> = (0..16)
            .map(|i| match i % 4 {
                1 => (mean + 1.5 * std, -1.0),
                3 => (mean - 1.5 * std, -1.0),
                _ => (mean, 1.0),
            })
            .collect();

        let actions: Vec<f32> = samples.iter().map(|s| s.0).collect();
        let states = Tensor::from_slice(&state.repeat(16)).view([16, 3]);
        let log_probs: Vec<f32> = tch::no_grad(|| {
            let means = policy.actor_mean(&states);
            let lp = policy.compute_log_prob(&means, &Tensor::from_slice(&actions).view([16, 1]));
            Vec::try_from(lp.view([-1])).unwrap()
        });

        let mut buffer = ExperienceBuffer::new(3, 1);
        for (&(action, reward), &log_prob) in samples.iter().zip(&log_probs) {
            buffer.add(&state, &[action], reward, out.value, log_prob, true);
        }

        let stats = trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();

        assert_eq!(stats.num_minibatches, 1);
        assert_eq!(policy.log_std().unwrap(), vec![-0.55]);
    }

    /// `n` copies of one transition, so minibatch order cannot matter
    fn repeated(policy: &ActorCritic, n: usize) -> ExperienceBuffer {
        let state = [0.5, 0.5, 0.2];
        let out = policy.act(&state).unwrap();
        let mut buffer = ExperienceBuffer::new(3, 1);
        for _ in 0..n {
            buffer.add(&state, &out.action, 1.0, out.value, out.log_prob, true);
        }
        buffer
    }

    #[test]
    fn test_reset_optimizers_matches_fresh_trainer() {
        let dir = tempfile::tempdir().unwrap();
        let config = PPOConfig::new().batch_size(16).n_epochs(1).learning_rate(1e-2);
        let (mut policy, mut trainer) = setup(config.clone());
        let mut buffer = collect(&policy, 4, 16);
        trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();
        policy.save(dir.path()).unwrap();

        let network = policy.config().clone();
        let mut restored = ActorCritic::new(network).unwrap();
        restored.load(dir.path()).unwrap();
        let mut fresh = PPOTrainer::new(config, &restored, StdRng::seed_from_u64(5)).unwrap();

        trainer.reset_optimizers(&policy).unwrap();
        let mut a = repeated(&policy, 16);
        let mut b = a.clone();
        trainer.update(&mut policy, &mut a, 0.0, 1).unwrap();
        fresh.update(&mut restored, &mut b, 0.0, 1).unwrap();

        assert_eq!(policy.snapshot().unwrap(), restored.snapshot().unwrap());
        assert_eq!(trainer.total_updates(), 2);
    }

    #[test]
    fn test_critic_moves_toward_returns() {
        let (mut policy, mut trainer) =
            setup(PPOConfig::new().batch_size(32).n_epochs(10).learning_rate(1e-2));
        let mut buffer = collect(&policy, 4, 32);

        buffer.compute_returns_and_advantages(0.0, 0.99, 0.95);
        let flat: Vec<f32> = buffer.states().iter().flatten().copied().collect();
        let states = Tensor::from_slice(&flat).view([-1, 3]);
        let returns = Tensor::from_slice(buffer.returns().unwrap());
        let initial = tch::no_grad(|| {
            f64::try_from((policy.values(&states) - &returns).square().mean(Kind::Float)).unwrap()
        });

        let stats = trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();

        assert!(stats.value_loss < initial, "value loss {initial} -> {}", stats.value_loss);
    }

    #[test]
    fn test_too_small_buffer_skips_training() {
        let (mut policy, mut trainer) = setup(PPOConfig::new().batch_size(64));
        let before = policy.snapshot().unwrap();
        let mut buffer = collect(&policy, 1, 10);

        let stats = trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();

        assert_eq!(stats, TrainingStats::zeros());
        assert!(buffer.is_empty());
        assert_eq!(policy.snapshot().unwrap(), before);
        assert_eq!(trainer.total_updates(), 0);
    }

    #[test]
    fn test_target_kl_stops_early() {
        let config =
            PPOConfig::new().batch_size(16).n_epochs(50).learning_rate(0.05).target_kl(1e-6);
        let (mut policy, mut trainer) = setup(config);
        let mut buffer = collect(&policy, 4, 16);

        let stats = trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();
        assert!(stats.approx_kl > 1e-6);
        assert!(buffer.is_empty());
    }
}
