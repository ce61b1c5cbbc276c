//! Per-frame tick
//!
//! Advances the round clock, picks the active controller and writes the
//! speeds for this frame into `RoundState::v_now`.

use super::drama::dramatic_speeds;
use super::lock::lock_speeds;
use super::outcome::Outcome;
use super::rng::RaceRng;
use super::state::{ControlPath, Course, RoundState};
use crate::clamp;
use crate::config::RoundConfig;
use crate::consts::*;

/// Read-only inputs shared by both controllers
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub course: &'a Course,
    pub outcome: &'a Outcome,
    pub config: &'a RoundConfig,
    pub player: usize,
    /// Progress correction gain
    pub gain: f32,
}

impl<'a> TickContext<'a> {
    pub fn new(course: &'a Course, outcome: &'a Outcome, config: &'a RoundConfig, player: usize) -> Self {
        Self {
            course,
            outcome,
            config,
            player,
            gain: config.gain_for(course.duration),
        }
    }
}

/// What the frame means for the round as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep going
    Racing,
    /// Every participant reached its goal
    Arrived,
    /// Well past the latest planned finish; give up waiting
    Overdue,
}

/// Advance the round by one frame of length `dt`
pub fn tick(
    state: &mut RoundState,
    ctx: &TickContext<'_>,
    rng: &mut RaceRng,
    progress: &[f32; PARTICIPANTS],
    dt: f32,
) -> TickOutcome {
    state.elapsed += dt;
    state.last_dt = dt;
    state.frames += 1;

    let t = state.elapsed;
    let u = clamp(t / ctx.course.duration.max(EPS), 0.0, 1.0);

    let path = if u >= ctx.config.thresholds.lock_start {
        ControlPath::Lock
    } else {
        ControlPath::Dramatic
    };
    if path != state.path {
        log::debug!("Control path {:?} -> {:?} at t={:.3}", state.path, path, t);
        state.path = path;
    }

    let (speeds, outcome) = match path {
        ControlPath::Dramatic => (
            dramatic_speeds(ctx, &state.beats, u, progress, rng),
            TickOutcome::Racing,
        ),
        ControlPath::Lock => {
            let frame = lock_speeds(ctx, u, t, progress, rng);
            let outcome = if frame.arrived >= PARTICIPANTS {
                TickOutcome::Arrived
            } else if t > ctx.outcome.latest_finish() + FINISH_GRACE {
                TickOutcome::Overdue
            } else {
                TickOutcome::Racing
            };
            (frame.speeds, outcome)
        }
    };

    state.v_now = speeds;
    cap_at_cut(state, ctx, progress, dt);
    outcome
}

/// Keep the DNF participant short of its cut. The speed is integrated over
/// the next frame, whose length is unknown, so the cap assumes a frame as
/// long as `DNF_STOP_HORIZON` (or the current one, if longer).
fn cap_at_cut(state: &mut RoundState, ctx: &TickContext<'_>, progress: &[f32; PARTICIPANTS], dt: f32) {
    let (Some(i), Some(cut)) = (ctx.outcome.dnf_index, ctx.outcome.cut_distance) else {
        return;
    };
    let remaining = (cut - progress[i]).max(0.0);
    state.v_now[i] = if remaining <= ARRIVAL_EPS {
        0.0
    } else {
        state.v_now[i].min(remaining / dt.max(DNF_STOP_HORIZON))
    };
}
