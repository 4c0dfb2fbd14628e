//! Gaussian actor-critic for continuous steering
//!
//! Two independent MLPs, each in its own `VarStore` so the trainer can give
//! them separate optimizers:
//!
//! ```text
//!          state                        state
//!            |                            |
//!   [Linear → GELU] x N          [Linear → GELU] x M
//!            |                            |
//!     [Linear → tanh]                 [Linear]
//!            |                            |
//!          mean          log_std        value
//!            \             /
//!         N(mean, exp(log_std)²)
//! ```
//!
//! `log_std` is a free parameter vector (not conditioned on the state) stored
//! in the actor's `VarStore`, so every actor optimizer step moves it too.

use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tch::{
    nn::{self, Init, OptimizerConfig},
    Device, Kind, Tensor,
};
use tracing::{debug, info};

use super::pretrain::heuristic_samples;
use crate::inference::{LayerWeights, PolicySnapshot};

/// `0.5 * ln(2π)`
const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Network architecture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// State vector length
    pub state_dim: usize,
    /// Action vector length
    pub action_dim: usize,
    /// Actor hidden layer widths
    pub actor_hidden: Vec<usize>,
    /// Critic hidden layer widths
    pub critic_hidden: Vec<usize>,
    /// Initial value of every log-std entry
    pub log_std_init: f64,
    /// Lower log-std clamp
    pub log_std_min: f64,
    /// Upper log-std clamp
    pub log_std_max: f64,
    /// Sampled actions are clipped to `[-action_bound, action_bound]`
    pub action_bound: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            state_dim: 10,
            action_dim: 1,
            actor_hidden: vec![64, 64],
            critic_hidden: vec![64, 64],
            log_std_init: -0.5,
            log_std_min: -3.0,
            log_std_max: 1.0,
            action_bound: 1.0,
        }
    }
}

impl NetworkConfig {
    /// Set state and action dimensionality
    pub fn dims(mut self, state_dim: usize, action_dim: usize) -> Self {
        self.state_dim = state_dim;
        self.action_dim = action_dim;
        self
    }

    /// Set actor hidden widths
    pub fn actor_hidden(mut self, widths: Vec<usize>) -> Self {
        self.actor_hidden = widths;
        self
    }

    /// Set critic hidden widths
    pub fn critic_hidden(mut self, widths: Vec<usize>) -> Self {
        self.critic_hidden = widths;
        self
    }

    /// Set initial log-std
    pub fn log_std_init(mut self, value: f64) -> Self {
        self.log_std_init = value;
        self
    }

    /// Set the log-std clamp range
    pub fn log_std_range(mut self, min: f64, max: f64) -> Self {
        self.log_std_min = min;
        self.log_std_max = max;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        ensure!(self.state_dim > 0, "state_dim must be positive");
        ensure!(self.action_dim > 0, "action_dim must be positive");
        ensure!(
            self.actor_hidden.iter().chain(&self.critic_hidden).all(|&w| w > 0),
            "hidden widths must be positive"
        );
        ensure!(self.log_std_min < self.log_std_max, "log_std_min must be below log_std_max");
        ensure!(
            (self.log_std_min..=self.log_std_max).contains(&self.log_std_init),
            "log_std_init must lie inside [log_std_min, log_std_max]"
        );
        ensure!(self.action_bound > 0.0, "action_bound must be positive");
        Ok(())
    }
}

/// Output of a single-state policy query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActOutput {
    /// Sampled action after clipping to the valid range
    pub action: Vec<f32>,
    /// Critic estimate for the state
    pub value: f32,
    /// Log-density of `action` under the current policy
    pub log_prob: f32,
    /// Deterministic policy mean
    pub mean: Vec<f32>,
}

/// Actor-critic with a state-independent Gaussian exploration scale
pub struct ActorCritic {
    config: NetworkConfig,

    actor_vs: nn::VarStore,
    actor_hidden: Vec<nn::Linear>,
    actor_head: nn::Linear,
    log_std: Tensor,

    critic_vs: nn::VarStore,
    critic_hidden: Vec<nn::Linear>,
    critic_head: nn::Linear,
}

impl std::fmt::Debug for ActorCritic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorCritic").field("config", &self.config).finish_non_exhaustive()
    }
}

fn build_mlp(
    root: &nn::Path,
    in_dim: usize,
    widths: &[usize],
    out_dim: usize,
    head_gain: f64,
) -> (Vec<nn::Linear>, nn::Linear) {
    let hidden_config = nn::LinearConfig {
        ws_init: Init::Orthogonal { gain: 2.0_f64.sqrt() },
        ..Default::default()
    };
    let head_config =
        nn::LinearConfig { ws_init: Init::Orthogonal { gain: head_gain }, ..Default::default() };

    let mut hidden = Vec::with_capacity(widths.len());
    let mut prev = in_dim as i64;
    for (i, &width) in widths.iter().enumerate() {
        hidden.push(nn::linear(root / format!("fc{}", i + 1), prev, width as i64, hidden_config));
        prev = width as i64;
    }
    let head = nn::linear(root / "head", prev, out_dim as i64, head_config);

    (hidden, head)
}

fn hidden_forward(layers: &[nn::Linear], x: &Tensor) -> Tensor {
    layers.iter().fold(x.shallow_clone(), |h, layer| h.apply(layer).gelu("tanh"))
}

fn layer_weights(layer: &nn::Linear) -> Result<LayerWeights> {
    let size = layer.ws.size();
    let (out_features, in_features) = (size[0] as usize, size[1] as usize);

    let flat = |t: &Tensor| {
        Vec::<f32>::try_from(t.detach().to_kind(Kind::Float).contiguous().view([-1]))
    };
    let weights = flat(&layer.ws)?;
    let biases = match &layer.bs {
        Some(bs) => flat(bs)?,
        None => vec![0.0; out_features],
    };

    LayerWeights::new(weights, biases, in_features, out_features)
}

impl ActorCritic {
    /// Build freshly initialized networks
    ///
    /// Hidden layers use orthogonal init with gain √2; the actor head uses
    /// gain 0.01 so the initial mean sits near zero, the critic head gain 1.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;

        let actor_vs = nn::VarStore::new(Device::Cpu);
        let critic_vs = nn::VarStore::new(Device::Cpu);

        let (actor_hidden, actor_head, log_std) = {
            let root = actor_vs.root();
            let (hidden, head) = build_mlp(
                &(&root / "actor"),
                config.state_dim,
                &config.actor_hidden,
                config.action_dim,
                0.01,
            );
            let log_std =
                root.var("log_std", &[config.action_dim as i64], Init::Const(config.log_std_init));
            (hidden, head, log_std)
        };

        let (critic_hidden, critic_head) = build_mlp(
            &(&critic_vs.root() / "critic"),
            config.state_dim,
            &config.critic_hidden,
            1,
            1.0,
        );

        debug!(
            state_dim = config.state_dim,
            action_dim = config.action_dim,
            actor = ?config.actor_hidden,
            critic = ?config.critic_hidden,
            "Built actor-critic"
        );

        Ok(Self {
            config,
            actor_vs,
            actor_hidden,
            actor_head,
            log_std,
            critic_vs,
            critic_hidden,
            critic_head,
        })
    }

    /// Architecture configuration
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Actor weights and log-std (for optimizer creation)
    pub fn actor_var_store(&self) -> &nn::VarStore {
        &self.actor_vs
    }

    /// Critic weights (for optimizer creation)
    pub fn critic_var_store(&self) -> &nn::VarStore {
        &self.critic_vs
    }

    /// Batched policy mean, `[B, state_dim] -> [B, action_dim]`
    pub fn actor_mean(&self, states: &Tensor) -> Tensor {
        hidden_forward(&self.actor_hidden, states).apply(&self.actor_head).tanh()
    }

    /// Batched critic estimate, `[B, state_dim] -> [B]`
    pub fn values(&self, states: &Tensor) -> Tensor {
        hidden_forward(&self.critic_hidden, states).apply(&self.critic_head).squeeze_dim(-1)
    }

    /// Diagonal Gaussian log-density of `actions` around `means`
    ///
    /// Uses the *current* log-std and sums over action dimensions:
    ///
    /// ```text
    /// log π(a) = Σ_i [ -(a_i - μ_i)² / (2 σ_i²) - log σ_i - ½ ln 2π ]
    /// ```
    ///
    /// Differentiable with respect to both `means` and the log-std.
    pub fn compute_log_prob(&self, means: &Tensor, actions: &Tensor) -> Tensor {
        let var = (&self.log_std * 2.0).exp();
        let per_dim = -((actions - means).square() / var) * 0.5 - &self.log_std - LOG_SQRT_2PI;
        per_dim.sum_dim_intlist(&[-1i64][..], false, Kind::Float)
    }

    /// Closed-form entropy, `Σ_i (½ + ½ ln 2π + log σ_i)`, as a scalar tensor
    pub fn entropy_tensor(&self) -> Tensor {
        (&self.log_std + (0.5 + LOG_SQRT_2PI)).sum(Kind::Float)
    }

    /// Policy entropy
    pub fn entropy(&self) -> Result<f64> {
        let entropy = tch::no_grad(|| self.entropy_tensor());
        Ok(f64::try_from(&entropy)?)
    }

    /// Current log-std vector
    pub fn log_std(&self) -> Result<Vec<f32>> {
        let detached = self.log_std.detach().to_kind(Kind::Float);
        Ok(Vec::<f32>::try_from(&detached)?)
    }

    /// Clamp log-std into the configured range, in place
    pub fn clamp_log_std(&mut self) {
        let (min, max) = (self.config.log_std_min, self.config.log_std_max);
        tch::no_grad(|| {
            let _ = self.log_std.clamp_(min, max);
        });
    }

    fn state_tensor(&self, state: &[f32]) -> Result<Tensor> {
        ensure!(
            state.len() == self.config.state_dim,
            "state has {} entries, expected {}",
            state.len(),
            self.config.state_dim
        );
        Ok(Tensor::from_slice(state).view([1, self.config.state_dim as i64]))
    }

    /// Sample an action for one state
    ///
    /// Runs without gradient tracking. The sample is drawn from
    /// `N(mean, exp(log_std)²)` and then clipped to the action bound.
    pub fn act(&self, state: &[f32]) -> Result<ActOutput> {
        let states = self.state_tensor(state)?;
        let bound = self.config.action_bound;

        let (action, mean, value, log_prob) = tch::no_grad(|| {
            let mean = self.actor_mean(&states);
            let noise = Tensor::randn_like(&mean);
            let action = (&mean + noise * self.log_std.exp()).clamp(-bound, bound);

            // The density is the unclipped Gaussian evaluated at the clipped
            // sample; the probability mass piled up at the bounds is ignored.
            // The update recomputes log-probs with the same formula, so the
            // importance ratio stays consistent.
            let log_prob = self.compute_log_prob(&mean, &action);
            let value = self.values(&states);
            (action, mean, value, log_prob)
        });

        Ok(ActOutput {
            action: Vec::<f32>::try_from(action.view([-1]))?,
            value: f64::try_from(value.sum(Kind::Double))? as f32,
            log_prob: f64::try_from(log_prob.sum(Kind::Double))? as f32,
            mean: Vec::<f32>::try_from(mean.view([-1]))?,
        })
    }

    /// Critic estimate for one state
    pub fn value(&self, state: &[f32]) -> Result<f32> {
        let states = self.state_tensor(state)?;
        let value = tch::no_grad(|| self.values(&states));
        Ok(f64::try_from(value.sum(Kind::Double))? as f32)
    }

    /// Fit the actor mean to a counter-steering heuristic
    ///
    /// Samples `num_samples` synthetic states with a random heading error and
    /// regresses the mean onto `clip(-gain * heading_error, -1, 1)` with a
    /// fresh Adam optimizer over the actor's `VarStore`. The log-std takes no
    /// part in the loss and the critic lives in another store, so neither
    /// moves.
    ///
    /// Returns the final-epoch mean squared error.
    pub fn pretrain<R: Rng + ?Sized>(
        &mut self,
        num_samples: usize,
        epochs: usize,
        gain: f32,
        learning_rate: f64,
        rng: &mut R,
    ) -> Result<f64> {
        if num_samples == 0 || epochs == 0 {
            return Ok(0.0);
        }

        let (states, targets) = heuristic_samples(num_samples, self.config.state_dim, gain, rng);
        let state_dim = self.config.state_dim as i64;
        let action_dim = self.config.action_dim as i64;

        let states = Tensor::from_slice(&states).view([-1, state_dim]);
        // Every action dimension gets the same steering target
        let targets = Tensor::from_slice(&targets).view([-1, 1]).expand([-1, action_dim], false);

        let mut optimizer = nn::Adam::default()
            .build(&self.actor_vs, learning_rate)
            .context("building pretrain optimizer")?;

        let mut last_loss = 0.0;
        for epoch in 0..epochs {
            let loss = (self.actor_mean(&states) - &targets).square().mean(Kind::Float);
            optimizer.backward_step(&loss);

            last_loss = f64::try_from(&loss)?;
            if epoch % 50 == 0 {
                debug!(epoch, loss = last_loss, "Pretrain");
            }
        }

        info!(samples = num_samples, epochs, loss = last_loss, "Pretrained actor mean");
        Ok(last_loss)
    }

    /// Frozen copy of every layer plus the log-std
    pub fn snapshot(&self) -> Result<PolicySnapshot> {
        let collect = |hidden: &[nn::Linear], head: &nn::Linear| -> Result<Vec<LayerWeights>> {
            hidden.iter().chain(std::iter::once(head)).map(layer_weights).collect()
        };

        PolicySnapshot::new(
            collect(&self.actor_hidden, &self.actor_head)?,
            collect(&self.critic_hidden, &self.critic_head)?,
            self.log_std()?,
        )
    }

    /// Save actor and critic parameters into `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        self.actor_vs.save(dir.join("actor.ot"))?;
        self.critic_vs.save(dir.join("critic.ot"))?;
        Ok(())
    }

    /// Load actor and critic parameters saved by [`ActorCritic::save`]
    pub fn load<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.actor_vs
            .load(dir.join("actor.ot"))
            .with_context(|| format!("loading actor from {}", dir.display()))?;
        self.critic_vs
            .load(dir.join("critic.ot"))
            .with_context(|| format!("loading critic from {}", dir.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn small_config() -> NetworkConfig {
        NetworkConfig::default().dims(4, 1).actor_hidden(vec![16, 16]).critic_hidden(vec![16])
    }

    fn params(vs: &nn::VarStore) -> Vec<(String, Tensor)> {
        let mut vars: Vec<_> =
            vs.variables().into_iter().map(|(k, v)| (k, v.detach().copy())).collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    fn max_diff(a: &Tensor, b: &Tensor) -> f64 {
        f64::try_from((a - b).abs().max()).unwrap()
    }

    #[test]
    fn test_forward_shapes() {
        let policy = ActorCritic::new(small_config()).unwrap();
        let states = Tensor::randn([8, 4], (Kind::Float, Device::Cpu));

        assert_eq!(policy.actor_mean(&states).size(), vec![8, 1]);
        assert_eq!(policy.values(&states).size(), vec![8]);
    }

    #[test]
    fn test_act_output() {
        let policy = ActorCritic::new(small_config()).unwrap();
        let out = policy.act(&[0.5, 0.5, 0.5, 0.1]).unwrap();

        assert_eq!(out.action.len(), 1);
        assert_eq!(out.mean.len(), 1);
        assert!(out.action[0].abs() <= 1.0);
        assert!(out.mean[0].abs() < 1.0);
        assert!(out.log_prob.is_finite());
        assert!(out.value.is_finite());
    }

    #[test]
    fn test_act_rejects_wrong_state_dim() {
        let policy = ActorCritic::new(small_config()).unwrap();
        assert!(policy.act(&[0.0; 3]).is_err());
        assert!(policy.value(&[0.0; 5]).is_err());
    }

    #[test]
    fn test_ratio_is_one_at_equal_policy() {
        let policy = ActorCritic::new(small_config()).unwrap();
        let states: Vec<[f32; 4]> =
            (0..16).map(|i| [i as f32 / 16.0, 0.3, 0.7, (i as f32 - 8.0) / 8.0]).collect();

        let outputs: Vec<ActOutput> = states.iter().map(|s| policy.act(s).unwrap()).collect();

        let flat: Vec<f32> = states.iter().flatten().copied().collect();
        let actions: Vec<f32> = outputs.iter().map(|o| o.action[0]).collect();
        let old: Vec<f32> = outputs.iter().map(|o| o.log_prob).collect();

        let state_t = Tensor::from_slice(&flat).view([16, 4]);
        let action_t = Tensor::from_slice(&actions).view([16, 1]);
        let new = tch::no_grad(|| policy.compute_log_prob(&policy.actor_mean(&state_t), &action_t));

        let ratio = (new - Tensor::from_slice(&old)).exp();
        assert!(max_diff(&ratio, &ratio.ones_like()) < 1e-5);
    }

    #[test]
    fn test_log_prob_at_mean() {
        let policy = ActorCritic::new(small_config()).unwrap();
        let means = Tensor::zeros([2, 1], (Kind::Float, Device::Cpu));

        let lp = policy.compute_log_prob(&means, &means);
        let expected = 0.5 - LOG_SQRT_2PI;
        let lp: Vec<f32> = Vec::try_from(&lp).unwrap();

        // log N(0; 0, σ) = -log σ - ½ ln 2π with log σ = -0.5
        for v in lp {
            assert!((v as f64 - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_entropy_formula() {
        let config = small_config().dims(4, 2);
        let policy = ActorCritic::new(config).unwrap();

        let expected = 2.0 * (0.5 + LOG_SQRT_2PI - 0.5);
        assert!((policy.entropy().unwrap() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_clamp_log_std() {
        let mut policy = ActorCritic::new(small_config()).unwrap();

        tch::no_grad(|| {
            let _ = policy.log_std.fill_(-7.0);
        });
        policy.clamp_log_std();
        assert_eq!(policy.log_std().unwrap(), vec![-3.0]);

        tch::no_grad(|| {
            let _ = policy.log_std.fill_(4.0);
        });
        policy.clamp_log_std();
        assert_eq!(policy.log_std().unwrap(), vec![1.0]);
    }

    #[test]
    fn test_pretrain_only_moves_actor_mean() {
        tch::manual_seed(3);
        let mut policy = ActorCritic::new(small_config()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let critic_before = params(policy.critic_var_store());
        let log_std_before = policy.log_std().unwrap();

        let (states, targets) = heuristic_samples(256, 4, 2.0, &mut rng);
        let states = Tensor::from_slice(&states).view([-1, 4]);
        let targets = Tensor::from_slice(&targets).view([-1, 1]);
        let mse = |p: &ActorCritic| {
            let err =
                tch::no_grad(|| (p.actor_mean(&states) - &targets).square().mean(Kind::Float));
            f64::try_from(err).unwrap()
        };

        let before = mse(&policy);
        policy.pretrain(512, 300, 2.0, 3e-3, &mut rng).unwrap();
        let after = mse(&policy);

        assert!(after < before * 0.5, "pretrain did not fit: {before} -> {after}");
        assert_eq!(policy.log_std().unwrap(), log_std_before);
        for ((name, a), (_, b)) in critic_before.iter().zip(params(policy.critic_var_store())) {
            assert_eq!(max_diff(a, &b), 0.0, "critic parameter {name} moved");
        }
    }

    #[test]
    fn test_pretrain_counter_steers() {
        tch::manual_seed(4);
        let mut policy = ActorCritic::new(small_config()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        policy.pretrain(1024, 300, 2.0, 3e-3, &mut rng).unwrap();

        let right = policy.act(&[0.5, 0.5, 0.5, 0.4]).unwrap().mean[0];
        let left = policy.act(&[0.5, 0.5, 0.5, -0.4]).unwrap().mean[0];
        assert!(right < 0.0 && left > 0.0, "means: {right}, {left}");
    }

    #[test]
    fn test_snapshot_matches_forward() {
        let policy = ActorCritic::new(small_config()).unwrap();
        let snapshot = policy.snapshot().unwrap();
        let state = [0.2, -0.4, 0.9, 0.3];

        let out = policy.act(&state).unwrap();
        let mean = snapshot.mean_action(&state).unwrap();
        let value = snapshot.value(&state).unwrap();

        assert!((mean[0] - out.mean[0]).abs() < 1e-5);
        assert!((value - out.value).abs() < 1e-5);
        assert_eq!(snapshot.log_std, vec![-0.5]);
        assert_eq!(snapshot.actor.len(), 3);
        assert_eq!(snapshot.critic.len(), 2);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let policy = ActorCritic::new(small_config()).unwrap();
        policy.save(dir.path()).unwrap();

        let mut restored = ActorCritic::new(small_config()).unwrap();
        restored.load(dir.path()).unwrap();

        let states = Tensor::randn([8, 4], (Kind::Float, Device::Cpu));
        let diff = tch::no_grad(|| {
            max_diff(&policy.actor_mean(&states), &restored.actor_mean(&states))
                + max_diff(&policy.values(&states), &restored.values(&states))
        });
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ActorCritic::new(small_config().dims(0, 1)).is_err());
        assert!(ActorCritic::new(small_config().log_std_range(1.0, -1.0)).is_err());
        assert!(ActorCritic::new(small_config().log_std_init(5.0)).is_err());
    }
}
