//! Read-only view of agent state for dashboards and logs

use serde::{Deserialize, Serialize};

use crate::{buffer::rollout::BufferStats, train::ppo::TrainingStats};

/// Lifecycle phase of an [`super::Agent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Accepting `store` calls
    Collecting,
    /// Inside `update`
    Updating,
    /// An update failed; only `reset` recovers
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Collecting => "collecting",
            Phase::Updating => "updating",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of counters and the latest losses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Current phase
    pub phase: Phase,
    /// Completed PPO updates
    pub update_count: usize,
    /// Transitions stored since construction
    pub total_steps: usize,
    /// Transitions currently buffered
    pub buffer_len: usize,
    /// Episodes completed since the last update
    pub episodes_since_update: usize,
    /// Buffer contents summary
    pub buffer: BufferStats,
    /// Statistics of the last update, if any
    pub last_update: Option<TrainingStats>,
    /// Exponential moving average over past updates
    pub running_avg: Option<TrainingStats>,
    /// Current exploration log-std
    pub log_std: Vec<f32>,
}

impl Diagnostics {
    /// Last policy loss, if an update has run
    pub fn policy_loss(&self) -> Option<f64> {
        self.last_update.as_ref().map(|s| s.policy_loss)
    }

    /// Last value loss, if an update has run
    pub fn value_loss(&self) -> Option<f64> {
        self.last_update.as_ref().map(|s| s.value_loss)
    }

    /// Last entropy, if an update has run
    pub fn entropy(&self) -> Option<f64> {
        self.last_update.as_ref().map(|s| s.entropy)
    }
}
