//! Loss computation functions for PPO
//!
//! Pure functions over batched tensors. Each returns a scalar loss tensor
//! still attached to the autograd graph plus detached monitoring values.

use tch::{Kind, Tensor};

/// Per-sample clipped surrogate `min(r·A, clip(r, 1-ε, 1+ε)·A)`
///
/// When the ratio has already moved in the direction the advantage favors,
/// the clipped term wins once it leaves the trust region. When it moved the
/// other way the unclipped term is kept, so corrections get the full
/// gradient.
pub fn clipped_surrogate(ratio: &Tensor, advantages: &Tensor, clip_range: f64) -> Tensor {
    let unclipped = ratio * advantages;
    let clipped = ratio.clamp(1.0 - clip_range, 1.0 + clip_range) * advantages;
    unclipped.minimum(&clipped)
}

/// Compute PPO policy loss with clipping
///
/// Returns (policy_loss, clip_fraction, approx_kl). The loss is the negated
/// mean surrogate; the entropy bonus is applied by the caller.
///
/// `approx_kl` is the non-negative estimator `mean((r - 1) - ln r)`.
///
/// # Arguments
/// * `log_probs` - Log probabilities of actions under current policy
/// * `old_log_probs` - Log probabilities of actions under old policy
/// * `advantages` - Normalized advantages
/// * `clip_range` - PPO clipping parameter (epsilon)
pub fn compute_policy_loss(
    log_probs: &Tensor,
    old_log_probs: &Tensor,
    advantages: &Tensor,
    clip_range: f64,
) -> (Tensor, f64, f64) {
    let log_ratio = log_probs - old_log_probs;
    let ratio = log_ratio.exp();

    let policy_loss = -clipped_surrogate(&ratio, advantages, clip_range).mean(Kind::Float);

    let (clip_fraction, approx_kl) = tch::no_grad(|| {
        let clipped = (&ratio - 1.0).abs().gt(clip_range).to_kind(Kind::Float).mean(Kind::Float);
        let kl = ((&ratio - 1.0) - &log_ratio).mean(Kind::Float);
        (f64::try_from(&clipped).unwrap_or(0.0), f64::try_from(&kl).unwrap_or(0.0))
    });

    (policy_loss, clip_fraction, approx_kl)
}

/// Compute critic regression loss
///
/// Returns (value_loss, explained_variance). Explained variance is
/// `1 - Var(R - V) / Var(R)`, reported as 0 when the returns are constant.
///
/// # Arguments
/// * `values` - Critic predictions under current parameters
/// * `returns` - Monte-Carlo return targets
pub fn compute_value_loss(values: &Tensor, returns: &Tensor) -> (Tensor, f64) {
    let value_loss = (values - returns).square().mean(Kind::Float);

    let explained_var = tch::no_grad(|| {
        let var_returns = f64::try_from(returns.var(false)).unwrap_or(0.0);
        if var_returns < 1e-12 {
            return 0.0;
        }
        let var_residual = f64::try_from((returns - values).var(false)).unwrap_or(0.0);
        1.0 - var_residual / var_returns
    });

    (value_loss, explained_var)
}
