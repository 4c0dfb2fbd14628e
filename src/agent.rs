//! Agent façade
//!
//! [`Agent`] owns one [`ActorCritic`], one [`ExperienceBuffer`] and the
//! [`PPOTrainer`] driving them. It is the single explicitly owned training
//! context: constructing it initializes and pretrains the networks, dropping
//! it releases everything, and [`Agent::reset`] rebuilds from scratch.
//!
//! ```text
//!            store / act                 update()
//!  ┌────────────┐ ───────────────▶ ┌──────────┐
//!  │ Collecting │                  │ Updating │
//!  └────────────┘ ◀─────────────── └──────────┘
//!        ▲              Ok               │ Err
//!        │ reset()                       ▼
//!        └──────────────────────── ┌────────┐
//!                                  │ Failed │
//!                                  └────────┘
//! ```

mod config;
mod diagnostics;

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info};

pub use self::{
    config::AgentConfig,
    diagnostics::{Diagnostics, Phase},
};
pub use crate::policy::ActOutput;
use crate::{
    buffer::rollout::ExperienceBuffer,
    inference::PolicySnapshot,
    policy::ActorCritic,
    train::ppo::{AggregatedStats, PPOTrainer, TrainingStats},
};

/// PPO agent for continuous steering
#[derive(Debug)]
pub struct Agent {
    config: AgentConfig,
    policy: ActorCritic,
    buffer: ExperienceBuffer,
    trainer: PPOTrainer,

    phase: Phase,
    episodes_since_update: usize,
    total_steps: usize,
    history: AggregatedStats,
}

impl Agent {
    /// Build networks, pretrain the actor and start collecting
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => {
                tch::manual_seed(seed as i64);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        let mut policy = ActorCritic::new(config.network.clone())?;
        policy
            .pretrain(
                config.pretrain_samples,
                config.pretrain_epochs,
                config.pretrain_gain,
                config.pretrain_learning_rate,
                &mut rng,
            )
            .context("actor pretraining failed")?;

        let trainer = PPOTrainer::new(config.ppo.clone(), &policy, StdRng::from_rng(&mut rng)?)?;
        let buffer = ExperienceBuffer::new(config.network.state_dim, config.network.action_dim);

        info!(
            state_dim = config.network.state_dim,
            action_dim = config.network.action_dim,
            min_episodes = config.min_episodes_per_update,
            "Agent ready"
        );

        Ok(Self {
            config,
            policy,
            buffer,
            trainer,
            phase: Phase::Collecting,
            episodes_since_update: 0,
            total_steps: 0,
            history: AggregatedStats::new(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Underlying networks
    pub fn policy(&self) -> &ActorCritic {
        &self.policy
    }

    /// Buffered experience
    pub fn buffer(&self) -> &ExperienceBuffer {
        &self.buffer
    }

    /// Sample an action for one state
    ///
    /// Side-effect free; the caller passes the returned `value` and
    /// `log_prob` back into [`Agent::store`].
    pub fn act(&self, state: &[f32]) -> Result<ActOutput> {
        self.ensure_not_failed()?;
        self.policy.act(state)
    }

    /// Critic estimate for one state (bootstrap queries)
    pub fn value(&self, state: &[f32]) -> Result<f32> {
        self.ensure_not_failed()?;
        self.policy.value(state)
    }

    /// Append one transition
    ///
    /// Rejected unless the agent is collecting, and when the state or action
    /// has the wrong length.
    pub fn store(
        &mut self,
        state: &[f32],
        action: &[f32],
        reward: f32,
        value: f32,
        log_prob: f32,
        done: bool,
    ) -> Result<()> {
        ensure!(self.phase == Phase::Collecting, "cannot store while agent is {}", self.phase);

        let (state_dim, action_dim) = self.buffer.dims();
        ensure!(
            state.len() == state_dim,
            "state has {} entries, expected {state_dim}",
            state.len()
        );
        ensure!(
            action.len() == action_dim,
            "action has {} entries, expected {action_dim}",
            action.len()
        );

        self.buffer.add(state, action, reward, value, log_prob, done);
        self.total_steps += 1;
        if done {
            self.episodes_since_update += 1;
        }
        Ok(())
    }

    /// Whether enough episodes finished for the next update
    pub fn should_update(&self) -> bool {
        self.phase == Phase::Collecting
            && self.episodes_since_update >= self.config.min_episodes_per_update
    }

    /// Run a PPO update over everything buffered
    ///
    /// `bootstrap_values` holds the critic estimates of agents whose episode
    /// is still running; their mean (0 when empty) is the continuation value
    /// of the buffer's tail. A buffer too small for one minibatch is consumed
    /// without training and leaves the update history untouched. On failure
    /// the agent moves to [`Phase::Failed`]
    /// and parameters must be treated as undefined until [`Agent::reset`].
    pub fn update(&mut self, bootstrap_values: &[f32]) -> Result<TrainingStats> {
        ensure!(self.phase == Phase::Collecting, "cannot update while agent is {}", self.phase);
        ensure!(!self.buffer.is_empty(), "cannot update with an empty buffer");

        let bootstrap = mean_bootstrap(bootstrap_values);
        ensure!(bootstrap.is_finite(), "bootstrap values must be finite");

        self.phase = Phase::Updating;
        let result = self.trainer.update(
            &mut self.policy,
            &mut self.buffer,
            bootstrap,
            self.config.subsample_ratio,
        );

        match result {
            Ok(stats) => {
                self.phase = Phase::Collecting;
                self.episodes_since_update = 0;
                if stats.num_minibatches > 0 {
                    self.history.update(&stats);
                }
                Ok(stats)
            }
            Err(e) => {
                self.phase = Phase::Failed;
                error!(error = %e, "PPO update failed; agent needs a reset");
                Err(e.context("PPO update failed"))
            }
        }
    }

    /// Counters, latest losses and exploration scale
    pub fn diagnostics(&self) -> Result<Diagnostics> {
        let has_history = self.history.total_updates > 0;
        Ok(Diagnostics {
            phase: self.phase,
            update_count: self.trainer.total_updates(),
            total_steps: self.total_steps,
            buffer_len: self.buffer.len(),
            episodes_since_update: self.episodes_since_update,
            buffer: self.buffer.stats(),
            last_update: has_history.then(|| self.history.current.clone()),
            running_avg: has_history.then(|| self.history.running_avg.clone()),
            log_std: self.policy.log_std()?,
        })
    }

    /// Per-layer weights, read-only
    pub fn snapshot(&self) -> Result<PolicySnapshot> {
        self.policy.snapshot()
    }

    /// Discard everything and rebuild from the same configuration
    pub fn reset(&mut self) -> Result<()> {
        info!(updates = self.trainer.total_updates(), "Resetting agent");
        *self = Self::new(self.config.clone())?;
        Ok(())
    }

    /// Release all networks and buffered data
    pub fn dispose(self) {
        drop(self);
    }

    /// Save network parameters and configuration into `dir`
    pub fn save_checkpoint<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.policy.save(dir)?;
        self.config.save_json(dir.join("agent.json"))
    }

    /// Load network parameters saved by [`Agent::save_checkpoint`]
    ///
    /// Buffered experience and optimizer state are discarded; the
    /// architecture must match.
    pub fn load_checkpoint<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        self.ensure_not_failed()?;
        self.policy.load(dir)?;
        self.trainer.reset_optimizers(&self.policy)?;
        self.buffer.clear();
        self.episodes_since_update = 0;
        Ok(())
    }

    fn ensure_not_failed(&self) -> Result<()> {
        if self.phase == Phase::Failed {
            bail!("agent is in the failed phase; call reset()");
        }
        Ok(())
    }
}

/// Arithmetic mean of per-agent bootstrap values, 0 when there are none
pub fn mean_bootstrap(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
