//! Outcome planning
//!
//! The finishing order, finish-time gaps and DNF cutoff are fixed before the
//! race starts. Everything later in the round steers toward this plan.

use serde::{Deserialize, Serialize};

use super::rng::RaceRng;
use crate::config::RoundConfig;
use crate::consts::{DNF_CUT_SHRINK, MIN_GAP, PARTICIPANTS};

/// Requested finish for the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// 1-based finishing place
    Place(u8),
    /// Did not finish
    Dnf,
}

impl Placement {
    /// Place clamped into 1..=4
    pub fn at(place: i32) -> Self {
        Placement::Place(place.clamp(1, PARTICIPANTS as i32) as u8)
    }

    /// Zero-based finishing position (DNF finishes last)
    pub fn position(&self) -> usize {
        match *self {
            Placement::Place(p) => (p.max(1) as usize - 1).min(PARTICIPANTS - 1),
            Placement::Dnf => PARTICIPANTS - 1,
        }
    }

    pub fn is_dnf(&self) -> bool {
        matches!(self, Placement::Dnf)
    }
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Placement::Place(p) => write!(f, "P{}", p),
            Placement::Dnf => write!(f, "DNF"),
        }
    }
}

/// The planned result of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Finishing position -> participant index, winner first
    pub order: [usize; PARTICIPANTS],
    /// Seconds behind the winner for each finishing position
    pub finish_gaps: [f32; PARTICIPANTS],
    /// Absolute finish time per participant
    pub finish_times: [f32; PARTICIPANTS],
    /// Participant that never reaches the line
    pub dnf_index: Option<usize>,
    /// Lane fraction the DNF participant stops near
    pub dnf_cut_fraction: f32,
    /// Absolute cutoff distance for the DNF participant
    pub cut_distance: Option<f32>,
    /// Early-race gap multiplier
    pub early_spread: f32,
    /// Mid-race gap multiplier
    pub mid_spread: f32,
    /// What was requested for the player
    pub placement: Placement,
}

impl Outcome {
    /// Finishing position of a participant (zero-based)
    pub fn position_of(&self, participant: usize) -> Option<usize> {
        self.order.iter().position(|&c| c == participant)
    }

    /// Latest planned finish time
    pub fn latest_finish(&self) -> f32 {
        self.finish_times.iter().copied().fold(0.0, f32::max)
    }

    /// Recompute absolute finish times and cut distance for a new round
    /// duration or lane geometry, keeping order and gaps.
    pub fn retime(&mut self, round_duration: f32, lane_lengths: &[f32; PARTICIPANTS]) {
        for (pos, &car) in self.order.iter().enumerate() {
            self.finish_times[car] = round_duration + self.finish_gaps[pos];
        }
        self.cut_distance = self
            .dnf_index
            .map(|i| lane_lengths[i] * self.dnf_cut_fraction * DNF_CUT_SHRINK);
    }
}

/// Sample strictly increasing finish gaps for the given placement
pub fn make_finish_gaps(placement: Placement, rng: &mut RaceRng, gap_scale: f32) -> [f32; PARTICIPANTS] {
    let (r2, r3, r4) = match placement {
        Placement::Place(1) => ((0.30, 0.60), (0.55, 0.90), (0.80, 1.30)),
        Placement::Place(2) => ((0.25, 0.50), (0.60, 0.95), (0.80, 1.20)),
        Placement::Place(3) => ((0.35, 0.65), (0.45, 0.80), (0.80, 1.25)),
        Placement::Place(_) => ((0.40, 0.75), (0.60, 0.95), (0.90, 1.40)),
        Placement::Dnf => ((0.35, 0.70), (0.60, 0.95), (0.85, 1.30)),
    };

    let g2 = rng.range(r2.0, r2.1);
    let g3 = g2 + rng.range(r3.0, r3.1);
    let g4 = g3 + rng.range(r4.0, r4.1);

    let g2 = (g2 * gap_scale).max(MIN_GAP);
    let g3 = (g3 * gap_scale).max(g2 + MIN_GAP);
    let g4 = (g4 * gap_scale).max(g3 + MIN_GAP);
    [0.0, g2, g3, g4]
}

/// Plan a complete outcome for the player
pub fn plan_outcome(
    placement: Placement,
    player: usize,
    lane_lengths: &[f32; PARTICIPANTS],
    round_duration: f32,
    config: &RoundConfig,
    rng: &mut RaceRng,
) -> Outcome {
    let player = player.min(PARTICIPANTS - 1);
    let placement = match placement {
        Placement::Place(p) => Placement::at(p as i32),
        Placement::Dnf => Placement::Dnf,
    };

    let mut others = [0usize; PARTICIPANTS - 1];
    for (slot, idx) in others
        .iter_mut()
        .zip((0..PARTICIPANTS).filter(|&i| i != player))
    {
        *slot = idx;
    }
    rng.shuffle(&mut others);

    let (dnf_index, dnf_cut_fraction) = if placement.is_dnf() {
        let (lo, hi) = config.dnf_cut_range;
        (Some(player), rng.range(lo, hi))
    } else {
        (None, 0.0)
    };

    // Player at its position, shuffled others fill the rest in order
    let player_pos = placement.position();
    let mut order = [0usize; PARTICIPANTS];
    let mut rest = others.iter();
    for (pos, slot) in order.iter_mut().enumerate() {
        *slot = if pos == player_pos {
            player
        } else {
            rest.next().copied().unwrap_or(player)
        };
    }

    let finish_gaps = make_finish_gaps(placement, rng, config.drama.gap_scale);

    let (e0, e1) = config.drama.spread_early;
    let (m0, m1) = config.drama.spread_mid;
    let early_spread = rng.range(e0, e1);
    let mid_spread = rng.range(m0, m1);

    let mut outcome = Outcome {
        order,
        finish_gaps,
        finish_times: [round_duration; PARTICIPANTS],
        dnf_index,
        dnf_cut_fraction,
        cut_distance: None,
        early_spread,
        mid_spread,
        placement,
    };
    outcome.retime(round_duration, lane_lengths);

    log::info!(
        "Planned outcome {}: order={:?} gaps={:?} dnf={:?}",
        placement,
        outcome.order,
        outcome.finish_gaps,
        outcome.dnf_index
    );
    outcome
}
