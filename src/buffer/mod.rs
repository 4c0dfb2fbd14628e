//! Experience buffers
//!
//! On-policy rollout storage for PPO. See [`rollout::ExperienceBuffer`].

pub mod rollout;
