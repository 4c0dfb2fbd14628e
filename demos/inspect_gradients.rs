//! Check that gradients reach every actor and critic parameter
//!
//! Builds a small actor-critic, evaluates one PPO-style actor loss and one
//! critic loss on random data, and prints the gradient norm of every
//! variable in both stores.

use anyhow::Result;
use steer_rl::{
    policy::{ActorCritic, NetworkConfig},
    train::ppo::{compute_policy_loss, compute_value_loss},
};
use tch::{nn, Kind, Tensor};

fn print_grads(label: &str, vs: &nn::VarStore) {
    println!("{label}:");
    let mut variables: Vec<_> = vs.variables().into_iter().collect();
    variables.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, tensor) in variables {
        let grad = tensor.grad();
        if !grad.defined() {
            println!("  {name}: no gradient");
            continue;
        }
        let norm = f64::try_from(grad.norm()).unwrap_or(0.0);
        println!("  {name}: grad_norm = {norm:.6}");
    }
}

fn main() -> Result<()> {
    tch::manual_seed(0);
    let policy = ActorCritic::new(NetworkConfig::default())?;
    let state_dim = policy.config().state_dim as i64;
    let action_dim = policy.config().action_dim as i64;

    let states = Tensor::rand([32, state_dim], (Kind::Float, tch::Device::Cpu));
    let actions = Tensor::rand([32, action_dim], (Kind::Float, tch::Device::Cpu)) * 2.0 - 1.0;
    let advantages = Tensor::randn([32], (Kind::Float, tch::Device::Cpu));
    let returns = Tensor::randn([32], (Kind::Float, tch::Device::Cpu));

    let old_log_probs = tch::no_grad(|| {
        let means = policy.actor_mean(&states);
        policy.compute_log_prob(&means, &actions)
    });

    let means = policy.actor_mean(&states);
    let log_probs = policy.compute_log_prob(&means, &actions);
    let (policy_loss, clip_fraction, approx_kl) =
        compute_policy_loss(&log_probs, &old_log_probs, &advantages, 0.1);
    let actor_loss = &policy_loss - policy.entropy_tensor() * 0.01;
    actor_loss.backward();

    let (value_loss, explained_var) = compute_value_loss(&policy.values(&states), &returns);
    value_loss.backward();

    println!("policy loss   {:.6}", f64::try_from(&policy_loss)?);
    println!("clip fraction {clip_fraction:.3}  approx kl {approx_kl:.2e}");
    println!("value loss    {:.6}", f64::try_from(&value_loss)?);
    println!("explained var {explained_var:.3}");
    println!();

    print_grads("actor", policy.actor_var_store());
    print_grads("critic", policy.critic_var_store());
    Ok(())
}
