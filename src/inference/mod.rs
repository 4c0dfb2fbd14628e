//! Pure Rust policy inference
//!
//! A [`PolicySnapshot`] is a frozen, serializable copy of an actor-critic:
//! every layer's weights plus the log-std vector. It needs no libtorch, so a
//! trained steering policy can be deployed (or inspected) from a build with
//! the `training` feature disabled.
//!
//! The forward pass mirrors the trainable network exactly: hidden layers are
//! `Linear → GELU` (tanh approximation), the actor head is `Linear → tanh`,
//! and the critic head is a plain linear layer.

pub mod weights;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Weights and biases for a single layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    /// Weight matrix (flattened, row-major, `[out_features, in_features]`)
    pub weights: Vec<f32>,
    /// Bias vector
    pub biases: Vec<f32>,
    /// Input dimension
    pub in_features: usize,
    /// Output dimension
    pub out_features: usize,
}

impl LayerWeights {
    /// Create new layer weights
    pub fn new(
        weights: Vec<f32>,
        biases: Vec<f32>,
        in_features: usize,
        out_features: usize,
    ) -> Result<Self> {
        let layer = Self { weights, biases, in_features, out_features };
        layer.validate()?;
        Ok(layer)
    }

    /// Check that the stored buffers match the declared shape
    pub fn validate(&self) -> Result<()> {
        let (in_features, out_features) = (self.in_features, self.out_features);
        ensure!(in_features > 0 && out_features > 0, "layer dimensions must be positive");
        ensure!(
            self.weights.len() == in_features * out_features,
            "Weight matrix size mismatch: {} != {in_features} x {out_features}",
            self.weights.len()
        );
        ensure!(
            self.biases.len() == out_features,
            "Bias vector size mismatch: {} != {out_features}",
            self.biases.len()
        );
        Ok(())
    }

    /// Forward pass through a linear layer
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.in_features, "Input size mismatch");

        self.weights
            .chunks_exact(self.in_features)
            .zip(&self.biases)
            .map(|(row, &bias)| bias + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>())
            .collect()
    }

    /// Mean absolute weight, used for diagnostics
    pub fn mean_abs_weight(&self) -> f32 {
        if self.weights.is_empty() {
            return 0.0;
        }
        self.weights.iter().map(|w| w.abs()).sum::<f32>() / self.weights.len() as f32
    }
}

/// GELU, tanh approximation
pub fn gelu(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
}

/// Frozen actor-critic parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Actor layers, input to head
    pub actor: Vec<LayerWeights>,
    /// Critic layers, input to head
    pub critic: Vec<LayerWeights>,
    /// State-independent log standard deviation, one entry per action dim
    pub log_std: Vec<f32>,
}

impl PolicySnapshot {
    /// Build a snapshot, checking that consecutive layers line up
    pub fn new(
        actor: Vec<LayerWeights>,
        critic: Vec<LayerWeights>,
        log_std: Vec<f32>,
    ) -> Result<Self> {
        let snapshot = Self { actor, critic, log_std };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check every layer's shape, layer chaining and head sizes
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.actor.is_empty(), "actor has no layers");
        ensure!(!self.critic.is_empty(), "critic has no layers");

        for (name, layers) in [("actor", &self.actor), ("critic", &self.critic)] {
            for (i, layer) in layers.iter().enumerate() {
                layer.validate().with_context(|| format!("{name} layer {i}"))?;
            }
            for pair in layers.windows(2) {
                ensure!(
                    pair[0].out_features == pair[1].in_features,
                    "{name} layers do not chain: {} -> {}",
                    pair[0].out_features,
                    pair[1].in_features
                );
            }
        }

        ensure!(
            self.actor[0].in_features == self.critic[0].in_features,
            "actor and critic disagree on state_dim"
        );
        ensure!(
            self.critic.last().map(|l| l.out_features) == Some(1),
            "critic head must have one output"
        );
        ensure!(
            self.actor.last().map(|l| l.out_features) == Some(self.log_std.len()),
            "actor head width must equal log_std length"
        );
        Ok(())
    }

    /// State vector length
    pub fn state_dim(&self) -> usize {
        self.actor.first().map_or(0, |l| l.in_features)
    }

    /// Action vector length
    pub fn action_dim(&self) -> usize {
        self.log_std.len()
    }

    /// Deterministic action: the tanh-squashed policy mean
    pub fn mean_action(&self, state: &[f32]) -> Result<Vec<f32>> {
        self.check_state(state)?;
        Ok(forward(&self.actor, state, f32::tanh))
    }

    /// Critic estimate for one state
    pub fn value(&self, state: &[f32]) -> Result<f32> {
        self.check_state(state)?;
        Ok(forward(&self.critic, state, |v| v)[0])
    }

    /// Exploration standard deviation per action dim
    pub fn std(&self) -> Vec<f32> {
        self.log_std.iter().map(|l| l.exp()).collect()
    }

    fn check_state(&self, state: &[f32]) -> Result<()> {
        ensure!(
            state.len() == self.state_dim(),
            "state has {} entries, expected {}",
            state.len(),
            self.state_dim()
        );
        Ok(())
    }
}

/// Hidden layers get GELU, the last layer gets `head`
fn forward(layers: &[LayerWeights], input: &[f32], head: impl Fn(f32) -> f32) -> Vec<f32> {
    let last = layers.len() - 1;
    let mut x = input.to_vec();

    for (i, layer) in layers.iter().enumerate() {
        x = layer.forward(&x);
        if i == last {
            x.iter_mut().for_each(|v| *v = head(*v));
        } else {
            x.iter_mut().for_each(|v| *v = gelu(*v));
        }
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_snapshot() -> PolicySnapshot {
        // 2 -> 2 -> 1 actor, 2 -> 1 critic
        let actor = vec![
            LayerWeights::new(vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0], 2, 2).unwrap(),
            LayerWeights::new(vec![1.0, -1.0], vec![0.0], 2, 1).unwrap(),
        ];
        let critic = vec![LayerWeights::new(vec![2.0, 3.0], vec![0.5], 2, 1).unwrap()];
        PolicySnapshot::new(actor, critic, vec![-0.5]).unwrap()
    }

    #[test]
    fn test_layer_forward() {
        // 2D input -> 3D output
        let weights = vec![
            1.0, 2.0, // First output neuron
            3.0, 4.0, // Second output neuron
            5.0, 6.0, // Third output neuron
        ];
        let layer = LayerWeights::new(weights, vec![0.1, 0.2, 0.3], 2, 3).unwrap();

        let output = layer.forward(&[1.0, 2.0]);

        // [1*1 + 2*2 + 0.1, 1*3 + 2*4 + 0.2, 1*5 + 2*6 + 0.3]
        assert!((output[0] - 5.1).abs() < 1e-5);
        assert!((output[1] - 11.2).abs() < 1e-5);
        assert!((output[2] - 17.3).abs() < 1e-5);
    }

    #[test]
    fn test_layer_size_mismatch_rejected() {
        assert!(LayerWeights::new(vec![1.0; 5], vec![0.0; 3], 2, 3).is_err());
        assert!(LayerWeights::new(vec![1.0; 6], vec![0.0; 2], 2, 3).is_err());
        assert!(LayerWeights::new(vec![], vec![0.0], 0, 1).is_err());
    }

    #[test]
    fn test_gelu_reference_points() {
        assert_eq!(gelu(0.0), 0.0);
        assert!((gelu(1.0) - 0.841_192).abs() < 1e-4);
        assert!((gelu(-1.0) + 0.158_808).abs() < 1e-4);
        assert!((gelu(6.0) - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_mean_action_and_value() {
        let snapshot = tiny_snapshot();
        let state = [1.0, 0.5];

        let expected = (gelu(1.0) - gelu(0.5)).tanh();
        let action = snapshot.mean_action(&state).unwrap();
        assert_eq!(action.len(), 1);
        assert!((action[0] - expected).abs() < 1e-6);

        let value = snapshot.value(&state).unwrap();
        assert!((value - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_action_bounded() {
        let snapshot = tiny_snapshot();
        let action = snapshot.mean_action(&[100.0, -100.0]).unwrap();
        assert!(action[0] <= 1.0 && action[0] >= -1.0);
    }

    #[test]
    fn test_wrong_state_dim_rejected() {
        let snapshot = tiny_snapshot();
        assert!(snapshot.mean_action(&[1.0]).is_err());
        assert!(snapshot.value(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_validate_catches_broken_chain() {
        let actor = vec![
            LayerWeights::new(vec![0.0; 6], vec![0.0; 3], 2, 3).unwrap(),
            LayerWeights::new(vec![0.0; 2], vec![0.0], 2, 1).unwrap(),
        ];
        let critic = vec![LayerWeights::new(vec![0.0; 2], vec![0.0], 2, 1).unwrap()];
        assert!(PolicySnapshot::new(actor, critic, vec![0.0]).is_err());
    }

    #[test]
    fn test_std_from_log_std() {
        let snapshot = tiny_snapshot();
        assert!((snapshot.std()[0] - (-0.5f32).exp()).abs() < 1e-7);
        assert_eq!(snapshot.state_dim(), 2);
        assert_eq!(snapshot.action_dim(), 1);
    }
}
