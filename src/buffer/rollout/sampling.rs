//! Data sampling and batching for the experience buffer
//!
//! Minibatches are drawn from a subsampled, shuffled index set and always
//! form a disjoint partition of it.

use rand::{seq::SliceRandom, Rng};

use super::storage::ExperienceBuffer;

/// Indices of every `ratio`-th transition, starting at 0
///
/// Adjacent timesteps of one rollout are strongly correlated; keeping only
/// every N-th one thins that out. A ratio of 0 or 1 keeps everything.
pub fn subsample_indices(len: usize, ratio: usize) -> Vec<usize> {
    (0..len).step_by(ratio.max(1)).collect()
}

/// Shuffle `indices` and split them into minibatches
///
/// Every chunk holds `batch_size` indices except possibly the last; a
/// trailing chunk smaller than half of `batch_size` is dropped instead of
/// being trained on.
///
/// # Arguments
/// * `indices` - Indices to partition (consumed)
/// * `batch_size` - Desired size of each minibatch
/// * `rng` - Source of randomness for the shuffle
///
/// # Returns
/// Vector of vectors, where each inner vector contains indices for one
/// minibatch
pub fn partition_minibatches<R: Rng + ?Sized>(
    mut indices: Vec<usize>,
    batch_size: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    assert!(batch_size > 0, "batch_size must be positive");

    indices.shuffle(rng);

    indices
        .chunks(batch_size)
        .filter(|chunk| chunk.len() * 2 >= batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Minibatch data for training
///
/// Columns are flattened row-major so they can be handed to a tensor
/// constructor without further copying.
#[derive(Debug, Clone)]
pub struct Minibatch {
    /// States [batch_size * state_dim]
    pub states: Vec<f32>,

    /// Actions [batch_size * action_dim]
    pub actions: Vec<f32>,

    /// Monte-Carlo returns [batch_size]
    pub returns: Vec<f32>,

    /// Normalized advantages [batch_size]
    pub advantages: Vec<f32>,

    /// Behavior log probabilities [batch_size]
    pub old_log_probs: Vec<f32>,

    state_dim: usize,
    action_dim: usize,
}

impl Minibatch {
    /// Get batch size
    pub fn size(&self) -> usize {
        self.returns.len()
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// (batch_size, state_dim)
    pub fn state_shape(&self) -> (usize, usize) {
        (self.size(), self.state_dim)
    }

    /// (batch_size, action_dim)
    pub fn action_shape(&self) -> (usize, usize) {
        (self.size(), self.action_dim)
    }
}

impl ExperienceBuffer {
    /// Gather the rows at `indices` into a [`Minibatch`]
    ///
    /// # Panics
    ///
    /// Panics if returns and advantages are not current. Call
    /// `compute_returns_and_advantages` first.
    pub fn minibatch(&self, indices: &[usize]) -> Minibatch {
        let (Some(returns), Some(advantages)) = (&self.returns, &self.advantages) else {
            panic!("Must compute returns and advantages before sampling minibatches");
        };

        let n = indices.len();
        let mut batch = Minibatch {
            states: Vec::with_capacity(n * self.state_dim),
            actions: Vec::with_capacity(n * self.action_dim),
            returns: Vec::with_capacity(n),
            advantages: Vec::with_capacity(n),
            old_log_probs: Vec::with_capacity(n),
            state_dim: self.state_dim,
            action_dim: self.action_dim,
        };

        for &idx in indices {
            batch.states.extend_from_slice(&self.states[idx]);
            batch.actions.extend_from_slice(&self.actions[idx]);
            batch.returns.push(returns[idx]);
            batch.advantages.push(advantages[idx]);
            batch.old_log_probs.push(self.log_probs[idx]);
        }

        batch
    }

    /// Produce one epoch worth of shuffled minibatches
    ///
    /// An empty buffer yields no batches, whether or not returns were
    /// computed.
    ///
    /// # Arguments
    /// * `batch_size` - Desired size of each minibatch
    /// * `subsample_ratio` - Keep every N-th transition (1 keeps all)
    /// * `rng` - Source of randomness for the shuffle
    ///
    /// # Panics
    ///
    /// Panics on a non-empty buffer whose returns and advantages are not
    /// current.
    pub fn get_batches<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        subsample_ratio: usize,
        rng: &mut R,
    ) -> Vec<Minibatch> {
        if self.is_empty() {
            return Vec::new();
        }
        assert!(
            self.is_computed(),
            "Must compute returns and advantages before sampling minibatches"
        );

        let indices = subsample_indices(self.len(), subsample_ratio);
        partition_minibatches(indices, batch_size, rng)
            .iter()
            .map(|chunk| self.minibatch(chunk))
            .collect()
    }
}
