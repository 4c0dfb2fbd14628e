//! Rollout runner
//!
//! Drives an [`EnvPool`] with an [`Agent`]. Each simulated vehicle keeps its
//! in-flight episode in a private queue; the queue is handed to the agent
//! only once the episode ends, so the agent's buffer holds whole episodes
//! laid out contiguously per vehicle. Partial episodes never cross an update:
//! after every update they are dropped and all environments restart.

use anyhow::{ensure, Context, Result};
use tracing::{debug, info};

use crate::{
    agent::Agent,
    buffer::rollout::Transition,
    env::{pool::EnvPool, Environment},
    train::ppo::TrainingStats,
};

/// Collection loop around a pool of environments
pub struct Runner<E: Environment> {
    pool: EnvPool<E>,
    states: Vec<Vec<f32>>,
    pending: Vec<Vec<Transition>>,
    running_returns: Vec<f32>,
    finished_returns: Vec<f32>,
    total_episodes: usize,
}

impl<E: Environment + Send + Sync> Runner<E> {
    /// Reset every environment and start with empty queues
    pub fn new(mut pool: EnvPool<E>) -> Result<Self> {
        ensure!(pool.num_envs() > 0, "runner needs at least one environment");
        let states = pool.reset()?;
        let n = states.len();

        Ok(Self {
            pool,
            states,
            pending: vec![Vec::new(); n],
            running_returns: vec![0.0; n],
            finished_returns: Vec::new(),
            total_episodes: 0,
        })
    }

    /// Underlying pool
    pub fn pool(&self) -> &EnvPool<E> {
        &self.pool
    }

    /// Latest state of every environment
    pub fn states(&self) -> &[Vec<f32>] {
        &self.states
    }

    /// Transitions of the episode in flight for each environment
    pub fn pending_len(&self, env_id: usize) -> usize {
        self.pending.get(env_id).map_or(0, Vec::len)
    }

    /// Episodes completed since construction
    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    /// Advance every environment by one tick
    ///
    /// Returns how many episodes finished on this tick.
    pub fn step(&mut self, agent: &mut Agent) -> Result<usize> {
        let outputs = self
            .states
            .iter()
            .map(|state| agent.act(state))
            .collect::<Result<Vec<_>>>()?;
        let actions: Vec<Vec<f32>> = outputs.iter().map(|out| out.action.clone()).collect();

        let results = self.pool.step(&actions)?;

        let mut finished = 0;
        for (env_id, (out, result)) in outputs.into_iter().zip(results).enumerate() {
            let state = std::mem::replace(&mut self.states[env_id], result.state);
            self.running_returns[env_id] += result.reward;
            self.pending[env_id].push(Transition {
                state,
                action: out.action,
                reward: result.reward,
                value: out.value,
                log_prob: out.log_prob,
                done: result.done,
            });

            if result.done {
                self.flush(agent, env_id)?;
                self.states[env_id] = self.pool.reset_env(env_id)?;
                finished += 1;
            }
        }

        Ok(finished)
    }

    /// Critic estimates for environments with an episode in flight
    pub fn bootstrap_values(&self, agent: &Agent) -> Result<Vec<f32>> {
        self.pending
            .iter()
            .zip(&self.states)
            .filter(|(pending, _)| !pending.is_empty())
            .map(|(_, state)| agent.value(state))
            .collect()
    }

    /// Update the agent, then drop partial episodes and restart every
    /// environment
    pub fn run_update(&mut self, agent: &mut Agent) -> Result<TrainingStats> {
        let bootstrap = self.bootstrap_values(agent)?;
        let stats = agent.update(&bootstrap)?;

        let dropped: usize = self.pending.iter().map(Vec::len).sum();
        for pending in &mut self.pending {
            pending.clear();
        }
        self.running_returns.iter_mut().for_each(|r| *r = 0.0);
        self.states = self.pool.reset()?;

        debug!(dropped, "Discarded partial episodes after update");
        Ok(stats)
    }

    /// Collect and update `num_updates` times
    ///
    /// Returns the statistics of every update in order.
    pub fn train(&mut self, agent: &mut Agent, num_updates: usize) -> Result<Vec<TrainingStats>> {
        let mut history = Vec::with_capacity(num_updates);

        for update in 0..num_updates {
            while !agent.should_update() {
                self.step(agent)?;
            }

            let returns = self.take_episode_returns();
            let stats = self
                .run_update(agent)
                .with_context(|| format!("update {} of {num_updates}", update + 1))?;

            info!(
                update = update + 1,
                episodes = returns.len(),
                mean_return = mean(&returns),
                policy_loss = stats.policy_loss,
                value_loss = stats.value_loss,
                entropy = stats.entropy,
                "Training progress"
            );
            history.push(stats);
        }

        Ok(history)
    }

    /// Returns of episodes finished since the last call
    pub fn take_episode_returns(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.finished_returns)
    }

    fn flush(&mut self, agent: &mut Agent, env_id: usize) -> Result<()> {
        for t in self.pending[env_id].drain(..) {
            agent.store(&t.state, &t.action, t.reward, t.value, t.log_prob, t.done)?;
        }
        self.finished_returns.push(std::mem::take(&mut self.running_returns[env_id]));
        self.total_episodes += 1;
        Ok(())
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
