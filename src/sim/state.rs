//! Per-round simulation state
//!
//! `Course` holds what is derived from lane geometry; `RoundState` holds what
//! changes every frame and is thrown away when the round ends.

use serde::{Deserialize, Serialize};

use super::drama::Beat;
use super::lane::{Lane, equalize_speeds, nominal_duration};
use crate::config::RoundConfig;
use crate::consts::PARTICIPANTS;

/// Geometry-derived values for a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Length of each lane
    pub lane_lengths: [f32; PARTICIPANTS],
    /// Equalized base speed per lane
    pub v_eq: [f32; PARTICIPANTS],
    /// Winner's finish time (seconds)
    pub duration: f32,
}

impl Course {
    pub fn new(
        lanes: &[Lane; PARTICIPANTS],
        base_speed: f32,
        player: usize,
        config: &RoundConfig,
    ) -> Self {
        let speeds = equalize_speeds(lanes, base_speed, config.equalize.resolve(player));
        let duration = config
            .round_duration
            .unwrap_or_else(|| nominal_duration(lanes, &speeds));

        let mut v_eq = [0.0; PARTICIPANTS];
        for (dst, v) in v_eq.iter_mut().zip(speeds) {
            *dst = v;
        }

        Self {
            lane_lengths: std::array::from_fn(|i| lanes[i].length()),
            v_eq,
            duration,
        }
    }

    /// Mean equalized speed
    pub fn mean_speed(&self) -> f32 {
        self.v_eq.iter().sum::<f32>() / PARTICIPANTS as f32
    }
}

/// Which controller produced the last frame's speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlPath {
    #[default]
    Dramatic,
    Lock,
}

/// Mutable per-frame state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundState {
    /// Seconds since start
    pub elapsed: f32,
    /// Last speeds pushed to the renderer
    pub v_now: [f32; PARTICIPANTS],
    /// Scripted beats for this round
    pub beats: Vec<Beat>,
    /// Duration of the most recent frame
    pub last_dt: f32,
    /// Frames processed
    pub frames: u64,
    pub path: ControlPath,
}

impl RoundState {
    pub fn new(beats: Vec<Beat>) -> Self {
        Self {
            beats,
            ..Self::default()
        }
    }
}
