//! Train a steering policy on the corridor environment
//!
//! Run with:
//!   RUST_LOG=info cargo run --example train_steering --release
//!
//! Optional arguments: number of updates, then an output directory for the
//! final checkpoint and JSON snapshot.

use anyhow::Result;
use steer_rl::{
    env::{
        corridor::{Corridor, CorridorConfig},
        pool::EnvPool,
    },
    prelude::*,
    train::runner::Runner,
};
use tracing_subscriber::EnvFilter;

const NUM_ENVS: usize = 16;
const DEFAULT_UPDATES: usize = 50;
const SEED: u64 = 42;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let num_updates = match args.next() {
        Some(arg) => arg.parse()?,
        None => DEFAULT_UPDATES,
    };
    let out_dir = args.next();

    let corridor = CorridorConfig::default();
    let envs = (1..=NUM_ENVS as u64)
        .map(|i| Corridor::with_seed(corridor.clone(), SEED + i))
        .collect::<Result<Vec<_>>>()?;
    let pool = EnvPool::from_envs(envs);

    let config = AgentConfig::new()
        .ppo(PPOConfig::new().batch_size(256).n_epochs(4).learning_rate(3e-4))
        .min_episodes_per_update(NUM_ENVS)
        .seed(SEED);

    tracing::info!("Corridor steering with PPO");
    tracing::info!("  Environments: {}", NUM_ENVS);
    tracing::info!("  Updates: {}", num_updates);

    let mut agent = Agent::new(config)?;
    let mut runner = Runner::new(pool)?;
    runner.train(&mut agent, num_updates)?;

    let diagnostics = agent.diagnostics()?;
    tracing::info!(
        updates = diagnostics.update_count,
        steps = diagnostics.total_steps,
        episodes = runner.total_episodes(),
        log_std = ?diagnostics.log_std,
        "Training finished"
    );

    if let Some(dir) = out_dir {
        agent.save_checkpoint(&dir)?;
        let snapshot_path = std::path::Path::new(&dir).join("policy.json");
        agent.snapshot()?.save_json(&snapshot_path)?;
        tracing::info!("Saved checkpoint and snapshot to {}", dir);
    }

    Ok(())
}
