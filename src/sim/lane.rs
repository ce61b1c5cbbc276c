//! Lane geometry and speed equalization
//!
//! A lane is a polyline. Outer lanes are longer, so each lane gets its own
//! base speed scaled by its length; with no drama applied every lane would
//! reach its end at the same moment.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::LENGTH_EPS;

/// A participant's path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec2>", into = "Vec<Vec2>")]
pub struct Lane {
    points: Vec<Vec2>,
    /// Cached polyline length
    length: f32,
}

impl From<Vec<Vec2>> for Lane {
    fn from(points: Vec<Vec2>) -> Self {
        Self::new(points)
    }
}

impl From<Lane> for Vec<Vec2> {
    fn from(lane: Lane) -> Self {
        lane.points
    }
}

impl Lane {
    pub fn new(points: Vec<Vec2>) -> Self {
        let length = lane_length(&points);
        Self { points, length }
    }

    /// Straight lane from `start` to `end`
    pub fn straight(start: Vec2, end: Vec2) -> Self {
        Self::new(vec![start, end])
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Position at `distance` along the lane, clamped to its ends
    pub fn point_at(&self, distance: f32) -> Vec2 {
        let Some(&first) = self.points.first() else {
            return Vec2::ZERO;
        };
        if distance <= 0.0 {
            return first;
        }

        let mut travelled = 0.0;
        for pair in self.points.windows(2) {
            let seg = pair[0].distance(pair[1]);
            if travelled + seg >= distance && seg > 0.0 {
                let t = (distance - travelled) / seg;
                return pair[0].lerp(pair[1], t);
            }
            travelled += seg;
        }

        // Past the end (or degenerate lane)
        self.points.last().copied().unwrap_or(first)
    }
}

/// Sum of segment lengths; zero for fewer than two points
pub fn lane_length(points: &[Vec2]) -> f32 {
    points.windows(2).map(|p| p[0].distance(p[1])).sum()
}

/// Which length the base speed refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualizeRef {
    /// Mean of all lane lengths
    Average,
    /// A specific lane (index clamped into range)
    Lane(usize),
    /// The player's lane, resolved by the director
    #[default]
    Player,
}

impl EqualizeRef {
    /// Replace `Player` with a concrete lane index
    pub fn resolve(self, player: usize) -> Self {
        match self {
            EqualizeRef::Player => EqualizeRef::Lane(player),
            other => other,
        }
    }
}

/// Per-lane speeds so every lane nominally finishes together.
///
/// `reference` should already be resolved with [`EqualizeRef::resolve`];
/// an unresolved `Player` falls back to lane 0.
pub fn equalize_speeds(lanes: &[Lane], base_speed: f32, reference: EqualizeRef) -> Vec<f32> {
    if lanes.is_empty() {
        return Vec::new();
    }

    let lengths: Vec<f32> = lanes.iter().map(Lane::length).collect();
    let ref_len = match reference {
        EqualizeRef::Lane(i) => lengths[i.min(lengths.len() - 1)],
        EqualizeRef::Player => lengths[0],
        EqualizeRef::Average => lengths.iter().sum::<f32>() / lengths.len() as f32,
    };
    let ref_len = ref_len.max(LENGTH_EPS);

    lengths.iter().map(|l| base_speed * (l / ref_len)).collect()
}

/// Nominal round duration: mean lane length over mean equalized speed
pub fn nominal_duration(lanes: &[Lane], speeds: &[f32]) -> f32 {
    use crate::consts::EPS;

    let len = lanes.iter().map(Lane::length).sum::<f32>() / lanes.len().max(1) as f32;
    let v = speeds.iter().sum::<f32>() / speeds.len().max(1) as f32;
    len.max(EPS) / v.max(EPS)
}
