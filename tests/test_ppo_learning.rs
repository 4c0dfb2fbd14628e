//! Verify PPO moves the policy mean in the direction rewarded
//!
//! Two states, each its own one-step episode:
//! - In state A the reward equals the action, so the mean should rise
//! - In state B the reward is the negated action, so the mean should fall
//!
//! Behaviour log-probs and values come from the policy itself, as they
//! would during real collection.

use rand::{rngs::StdRng, SeedableRng};
use steer_rl::{
    buffer::rollout::ExperienceBuffer,
    policy::{ActorCritic, NetworkConfig},
    train::ppo::{PPOConfig, PPOTrainer},
};

const STATE_A: [f32; 2] = [1.0, 0.0];
const STATE_B: [f32; 2] = [0.0, 1.0];

fn collect(policy: &ActorCritic, per_state: usize) -> ExperienceBuffer {
    let mut buffer = ExperienceBuffer::new(2, 1);
    for _ in 0..per_state {
        for (state, sign) in [(STATE_A, 1.0), (STATE_B, -1.0)] {
            let out = policy.act(&state).unwrap();
            buffer.add(&state, &out.action, sign * out.action[0], out.value, out.log_prob, true);
        }
    }
    buffer
}

#[test]
fn test_ppo_follows_advantage_sign() {
    tch::manual_seed(0);
    let network =
        NetworkConfig::default().dims(2, 1).actor_hidden(vec![32]).critic_hidden(vec![32]);
    let mut policy = ActorCritic::new(network).unwrap();
    let config = PPOConfig::new().batch_size(32).n_epochs(4).learning_rate(1e-2).clip_range(0.2);
    let mut trainer = PPOTrainer::new(config, &policy, StdRng::seed_from_u64(0)).unwrap();

    let mean_a_before = policy.act(&STATE_A).unwrap().mean[0];
    let mean_b_before = policy.act(&STATE_B).unwrap().mean[0];

    for _ in 0..10 {
        let mut buffer = collect(&policy, 32);
        let stats = trainer.update(&mut policy, &mut buffer, 0.0, 1).unwrap();
        assert!(stats.policy_loss.is_finite());
    }

    let mean_a_after = policy.act(&STATE_A).unwrap().mean[0];
    let mean_b_after = policy.act(&STATE_B).unwrap().mean[0];

    println!("state A mean: {mean_a_before:.3} -> {mean_a_after:.3}");
    println!("state B mean: {mean_b_before:.3} -> {mean_b_after:.3}");

    assert!(mean_a_after > mean_a_before + 0.1);
    assert!(mean_b_after < mean_b_before - 0.1);
}

#[test]
fn test_ppo_subsampling_uses_fewer_minibatches() {
    tch::manual_seed(1);
    let network = NetworkConfig::default().dims(2, 1).actor_hidden(vec![8]).critic_hidden(vec![8]);
    let config = PPOConfig::new().batch_size(16).n_epochs(1);

    let mut policy = ActorCritic::new(network).unwrap();
    let mut trainer = PPOTrainer::new(config, &policy, StdRng::seed_from_u64(1)).unwrap();

    let mut full = collect(&policy, 32);
    let all = trainer.update(&mut policy, &mut full, 0.0, 1).unwrap();

    let mut sparse = collect(&policy, 32);
    let quarter = trainer.update(&mut policy, &mut sparse, 0.0, 4).unwrap();

    assert_eq!(all.num_minibatches, 4);
    assert_eq!(quarter.num_minibatches, 1);
}
