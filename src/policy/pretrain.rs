//! Synthetic data for actor warm-start
//!
//! States follow the layout documented in [`crate::env`]: range readings and
//! speed drawn from `[0, 1]`, heading error (last entry) from `[-1, 1]`.

use rand::Rng;

/// Counter-steering target for a normalized heading error
pub fn heuristic_action(heading_error: f32, gain: f32) -> f32 {
    (-gain * heading_error).clamp(-1.0, 1.0)
}

/// Generate `(states, targets)` for supervised pretraining
///
/// `states` is flattened `[num_samples, state_dim]`, `targets` is
/// `[num_samples]`.
pub fn heuristic_samples<R: Rng + ?Sized>(
    num_samples: usize,
    state_dim: usize,
    gain: f32,
    rng: &mut R,
) -> (Vec<f32>, Vec<f32>) {
    let mut states = Vec::with_capacity(num_samples * state_dim);
    let mut targets = Vec::with_capacity(num_samples);

    for _ in 0..num_samples {
        for _ in 1..state_dim {
            states.push(rng.gen_range(0.0..1.0));
        }
        let heading_error: f32 = rng.gen_range(-1.0..1.0);
        states.push(heading_error);
        targets.push(heuristic_action(heading_error, gain));
    }

    (states, targets)
}
