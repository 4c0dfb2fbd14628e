//! Integration test for the complete train → export → inference pipeline
//!
//! This test validates that we can:
//! 1. Train an agent on the corridor through the rollout runner
//! 2. Export its weights to a JSON snapshot
//! 3. Load the snapshot back without libtorch in the loop
//! 4. Get the same means and values from the snapshot as from the networks

use anyhow::Result;
use steer_rl::{
    env::{
        corridor::{Corridor, CorridorConfig},
        pool::EnvPool,
        Environment,
    },
    prelude::*,
    train::runner::Runner,
};

fn corridor_config() -> CorridorConfig {
    CorridorConfig { max_steps: 40, ..CorridorConfig::default() }
}

fn corridor_pool(seeds: std::ops::Range<u64>) -> Result<EnvPool<Corridor>> {
    let envs = seeds
        .map(|seed| Corridor::with_seed(corridor_config(), seed))
        .collect::<Result<Vec<_>>>()?;
    Ok(EnvPool::from_envs(envs))
}

fn agent_config() -> AgentConfig {
    AgentConfig::new()
        .ppo(PPOConfig::new().batch_size(32).n_epochs(2))
        .min_episodes_per_update(4)
        .pretrain(256, 50)
        .seed(11)
}

#[test]
fn test_train_export_load_inference() -> Result<()> {
    let dir = tempfile::tempdir()?;

    // === Step 1: Train ===
    let pool = corridor_pool(101..105)?;
    let mut agent = Agent::new(agent_config())?;
    let mut runner = Runner::new(pool)?;

    let history = runner.train(&mut agent, 2)?;
    assert_eq!(history.len(), 2);
    for stats in &history {
        assert!(stats.policy_loss.is_finite());
        assert!(stats.value_loss.is_finite());
    }
    assert_eq!(agent.phase(), Phase::Collecting);
    assert!(agent.buffer().is_empty());

    // === Step 2: Export ===
    let snapshot = agent.snapshot()?;
    assert_eq!(snapshot.state_dim(), 10);
    assert_eq!(snapshot.action_dim(), 1);
    assert_eq!(snapshot.actor.len(), 3);
    assert_eq!(snapshot.critic.len(), 3);

    // === Step 3: Save and load JSON ===
    let json_path = dir.path().join("policy.json");
    snapshot.save_json(&json_path)?;
    let loaded = PolicySnapshot::load_json(&json_path)?;
    assert_eq!(loaded, snapshot);

    // === Step 4: Inference parity ===
    let mut env = Corridor::with_seed(corridor_config(), 7)?;
    let mut state = env.reset()?;
    for _ in 0..10 {
        let out = agent.act(&state)?;
        let mean = loaded.mean_action(&state)?;
        let value = loaded.value(&state)?;

        assert!((mean[0] - out.mean[0]).abs() < 1e-4, "{mean:?} vs {:?}", out.mean);
        assert!((value - out.value).abs() < 1e-3, "{value} vs {}", out.value);
        assert!(mean[0].abs() <= 1.0);

        let result = env.step(&mean)?;
        if result.done {
            break;
        }
        state = result.state;
    }

    Ok(())
}

#[test]
fn test_checkpoint_restores_policy() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let mut trained = Agent::new(agent_config())?;
    let mut runner = Runner::new(corridor_pool(0..4)?)?;
    runner.train(&mut trained, 1)?;
    trained.save_checkpoint(dir.path())?;

    let config = AgentConfig::from_json_file(dir.path().join("agent.json"))?;
    assert_eq!(&config, trained.config());

    let mut restored = Agent::new(config.pretrain(0, 0).seed(1))?;
    assert_ne!(restored.snapshot()?, trained.snapshot()?);
    restored.load_checkpoint(dir.path())?;
    assert_eq!(restored.snapshot()?, trained.snapshot()?);

    Ok(())
}

#[test]
fn test_reset_returns_to_fresh_agent() -> Result<()> {
    let mut agent = Agent::new(agent_config())?;
    let initial = agent.snapshot()?;

    let mut runner = Runner::new(corridor_pool(3..7)?)?;
    runner.train(&mut agent, 1)?;
    let trained = agent.snapshot()?;
    assert_ne!(trained, initial);

    agent.reset()?;
    let diag = agent.diagnostics()?;
    assert_eq!(diag.phase, Phase::Collecting);
    assert_eq!(diag.update_count, 0);
    assert_eq!(diag.total_steps, 0);
    assert!(diag.last_update.is_none());
    assert_ne!(agent.snapshot()?, trained);

    Ok(())
}
