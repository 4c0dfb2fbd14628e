//! Straight-corridor heading tracker
//!
//! A deliberately small stand-in for the real vehicle simulation, used by
//! tests and demos. A vehicle drives down a corridor whose direction drifts
//! (a random-walk curvature emulates bends); the policy steers to keep the
//! heading error small and stay between the walls.
//!
//! # Dynamics
//!
//! ```text
//! θ' = θ + (steer * turn_rate - v * κ) * dt      heading error
//! y' = y + v * sin(θ) * dt                       lateral offset
//! κ' = clamp(κ + N(0, σ_κ), -κ_max, κ_max)       corridor curvature
//! ```
//!
//! - Reward: forward progress `cos θ` per tick minus a small steering cost;
//!   `-1` on a crash
//! - Termination: `|y| >= half_width` (crash) or `max_steps` reached
//! - State: `sensor_count` ray distances to the walls fanned over
//!   `[-π/2, π/2]`, then normalized speed, then heading error over `π/2`

use std::f32::consts::FRAC_PI_2;

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::env::{Environment, StepInfo, StepResult};

/// Corridor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorConfig {
    /// Number of range sensors
    pub sensor_count: usize,
    /// Half of the corridor width (m)
    pub half_width: f32,
    /// Sensor range; readings are divided by it (m)
    pub max_range: f32,
    /// Minimum and maximum episode speed (m/s)
    pub speed_range: (f32, f32),
    /// Heading change per second at full steering (rad/s)
    pub turn_rate: f32,
    /// Largest absolute curvature (1/m)
    pub max_curvature: f32,
    /// Curvature random-walk step size
    pub curvature_noise: f32,
    /// Simulation timestep (s)
    pub dt: f32,
    /// Episode time limit in ticks
    pub max_steps: usize,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            sensor_count: 8,
            half_width: 2.0,
            max_range: 10.0,
            speed_range: (4.0, 8.0),
            turn_rate: 1.5,
            max_curvature: 0.08,
            curvature_noise: 0.01,
            dt: 0.1,
            max_steps: 400,
        }
    }
}

impl CorridorConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        ensure!(self.sensor_count > 0, "sensor_count must be positive");
        ensure!(self.half_width > 0.0, "half_width must be positive");
        ensure!(self.max_range > 0.0, "max_range must be positive");
        let (lo, hi) = self.speed_range;
        ensure!(lo >= 0.0 && lo <= hi, "speed_range must satisfy 0 <= min <= max");
        ensure!(self.turn_rate > 0.0, "turn_rate must be positive");
        ensure!(self.max_curvature >= 0.0, "max_curvature must be non-negative");
        ensure!(self.curvature_noise >= 0.0, "curvature_noise must be non-negative");
        ensure!(self.dt > 0.0, "dt must be positive");
        ensure!(self.max_steps > 0, "max_steps must be positive");
        Ok(())
    }
}

/// Corridor environment
#[derive(Debug)]
pub struct Corridor {
    config: CorridorConfig,

    // Vehicle state
    lateral: f32,
    heading: f32,
    speed: f32,
    curvature: f32,

    steps: usize,
    rng: StdRng,
}

impl Corridor {
    /// Create a corridor seeded from the OS
    pub fn new(config: CorridorConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a reproducible corridor
    pub fn with_seed(config: CorridorConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: CorridorConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let mut env = Self {
            config,
            lateral: 0.0,
            heading: 0.0,
            speed: 0.0,
            curvature: 0.0,
            steps: 0,
            rng,
        };
        env.reset_state();
        Ok(env)
    }

    /// Configuration in use
    pub fn config(&self) -> &CorridorConfig {
        &self.config
    }

    /// Lateral offset from the centerline (m)
    pub fn lateral(&self) -> f32 {
        self.lateral
    }

    /// Heading error relative to the corridor direction (rad)
    pub fn heading(&self) -> f32 {
        self.heading
    }

    fn reset_state(&mut self) {
        let (lo, hi) = self.config.speed_range;
        let half = self.config.half_width;

        self.lateral = self.rng.gen_range(-0.3 * half..0.3 * half);
        self.heading = self.rng.gen_range(-0.4..0.4);
        self.speed = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        self.curvature = 0.0;
        self.steps = 0;
    }

    /// Distance along a ray at `angle` (relative to the corridor axis) to the
    /// nearest wall, capped at `max_range`
    fn ray_distance(&self, angle: f32) -> f32 {
        let lateral_dir = angle.sin();
        let half = self.config.half_width;

        let distance = if lateral_dir > 1e-6 {
            (half - self.lateral) / lateral_dir
        } else if lateral_dir < -1e-6 {
            (-half - self.lateral) / lateral_dir
        } else {
            self.config.max_range
        };

        distance.clamp(0.0, self.config.max_range)
    }

    fn observe(&self) -> Vec<f32> {
        let n = self.config.sensor_count;
        let mut state = Vec::with_capacity(n + 2);

        for i in 0..n {
            let offset = if n == 1 {
                0.0
            } else {
                -FRAC_PI_2 + std::f32::consts::PI * i as f32 / (n - 1) as f32
            };
            state.push(self.ray_distance(self.heading + offset) / self.config.max_range);
        }

        let max_speed = self.config.speed_range.1.max(f32::EPSILON);
        state.push((self.speed / max_speed).clamp(0.0, 1.0));
        state.push((self.heading / FRAC_PI_2).clamp(-1.0, 1.0));
        state
    }
}

impl Environment for Corridor {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.reset_state();
        Ok(self.observe())
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult> {
        ensure!(action.len() == 1, "corridor expects 1 action, got {}", action.len());

        let cfg = &self.config;
        let steer = action[0].clamp(-1.0, 1.0);

        let noise = self.rng.gen_range(-1.0_f32..1.0) * cfg.curvature_noise;
        self.curvature = (self.curvature + noise).clamp(-cfg.max_curvature, cfg.max_curvature);

        self.heading += (steer * cfg.turn_rate - self.speed * self.curvature) * cfg.dt;
        self.lateral += self.speed * self.heading.sin() * cfg.dt;
        self.steps += 1;

        let crashed = self.lateral.abs() >= cfg.half_width;
        let timed_out = self.steps >= cfg.max_steps;

        let reward = if crashed {
            -1.0
        } else {
            self.heading.cos() - 0.01 * steer * steer
        };

        Ok(StepResult {
            state: self.observe(),
            reward,
            done: crashed || timed_out,
            info: StepInfo { crashed, episode_steps: self.steps },
        })
    }

    fn state(&self) -> Vec<f32> {
        self.observe()
    }

    fn state_dim(&self) -> usize {
        self.config.sensor_count + 2
    }

    fn action_dim(&self) -> usize {
        1
    }
}
