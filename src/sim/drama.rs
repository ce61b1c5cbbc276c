//! Pre-lock "drama": phase pacing, beats and rank shaping
//!
//! While the round is young the field runs close to its equalized pace with
//! scripted surges, shifting gaps and a few lead changes around the player.
//! As the lock phase approaches, the displayed order is walked toward the
//! planned final order one adjacent swap at a time.

use serde::{Deserialize, Serialize};

use super::outcome::Outcome;
use super::rng::RaceRng;
use super::tick::TickContext;
use crate::config::PhaseBoosts;
use crate::consts::*;
use crate::{clamp, ease_in_out_cubic, lerp, smoothstep};

/// A scripted surge (or dip) for one participant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    /// Window start (normalized round time)
    pub u0: f32,
    /// Window end
    pub u1: f32,
    /// Affected participant
    pub who: usize,
    /// Signed speed fraction at the peak
    pub amp: f32,
}

/// Place `count` beats with centers inside `span`
pub fn make_beats(count: u32, span: (f32, f32), rng: &mut RaceRng) -> Vec<Beat> {
    (0..count)
        .map(|_| {
            let width = rng.range(0.05, 0.12);
            let center = rng.range(span.0, span.1);
            let u0 = clamp(center - width / 2.0, 0.05, 0.94);
            let u1 = clamp(center + width / 2.0, 0.06, 0.96);
            let who = rng.index(PARTICIPANTS);
            let sign = if rng.coin() { 1.0 } else { -1.0 };
            let amp = rng.range(0.08, 0.16) * sign;
            Beat { u0, u1, who, amp }
        })
        .collect()
}

/// Speed multiplier for the round phase: opening sprint, plateau, final push
pub fn phase_multiplier(u: f32, boosts: &PhaseBoosts) -> f32 {
    if u < PHASE_OPENING_END {
        lerp(1.0, boosts.start, ease_in_out_cubic(u / PHASE_OPENING_END))
    } else if u < PHASE_CLOSING_START {
        let t = (u - PHASE_OPENING_END) / (PHASE_CLOSING_START - PHASE_OPENING_END);
        lerp(boosts.start, boosts.mid, ease_in_out_cubic(t))
    } else {
        let t = clamp((u - PHASE_CLOSING_START) / (1.0 - PHASE_CLOSING_START), 0.0, 1.0);
        lerp(boosts.mid, boosts.finish, ease_in_out_cubic(t))
    }
}

/// Per-participant signed speed offsets from active beats
pub fn beat_offsets(beats: &[Beat], u: f32, fade_start: f32, fade_end: f32) -> [f32; PARTICIPANTS] {
    let mut sigma = [0.0; PARTICIPANTS];
    for beat in beats {
        if u < beat.u0 || u > beat.u1 {
            continue;
        }
        let t = (u - beat.u0) / (beat.u1 - beat.u0).max(EPS);
        let w = (std::f32::consts::PI * t).sin();
        for (i, s) in sigma.iter_mut().enumerate() {
            if i == beat.who {
                *s += beat.amp * w;
            } else {
                *s -= 0.25 * beat.amp * w / 3.0;
            }
        }
    }

    if u > fade_start {
        let fade = clamp(1.0 - (u - fade_start) / (fade_end - fade_start).max(EPS), 0.0, 1.0);
        for s in &mut sigma {
            *s *= fade;
        }
    }
    sigma
}

/// Time gaps (seconds behind the leader) for each running position at `u`
pub fn phase_gaps(outcome: &Outcome, u: f32) -> [f32; PARTICIPANTS] {
    let fin = outcome.finish_gaps;
    let u = clamp(u, 0.0, 1.0);
    let gap = |pos: usize| {
        let early = fin[pos] * outcome.early_spread;
        let mid = fin[pos] * outcome.mid_spread;
        if u <= GAP_MID_AT {
            lerp(early, mid, u / GAP_MID_AT)
        } else {
            lerp(mid, fin[pos], (u - GAP_MID_AT) / (1.0 - GAP_MID_AT))
        }
    };

    let g2 = gap(1);
    let g3 = gap(2).max(g2 + 0.02);
    let g4 = gap(3).max(g2 + 0.03).max(g3 + 0.02);
    [0.0, g2, g3, g4]
}

/// Participants ordered by progress, leader first
pub fn order_from_progress(progress: &[f32; PARTICIPANTS]) -> [usize; PARTICIPANTS] {
    let mut order = [0, 1, 2, 3];
    order.sort_by(|&a, &b| {
        progress[b]
            .partial_cmp(&progress[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Rank (1-based) the player should be shown at around time `u`
pub fn desired_player_rank(final_rank: usize, u: f32, rng: &mut RaceRng) -> usize {
    let jitter: i32 = if rng.next_f32() < 0.25 {
        if rng.coin() { -1 } else { 1 }
    } else {
        0
    };

    // A winner spends the early race chasing
    let mut base = if final_rank == 1 && u < 0.35 { 2 } else { final_rank as i32 };
    if u > 0.35 && u < 0.70 {
        base += jitter;
    }
    base.clamp(1, PARTICIPANTS as i32) as usize
}

/// Move `who` one slot toward `target_rank` (1-based)
pub fn nudge_toward(
    order: [usize; PARTICIPANTS],
    who: usize,
    target_rank: usize,
) -> [usize; PARTICIPANTS] {
    let mut cur = order;
    let Some(i) = cur.iter().position(|&c| c == who) else {
        return cur;
    };
    let target = target_rank.clamp(1, PARTICIPANTS) - 1;
    if i < target {
        cur.swap(i, i + 1);
    } else if i > target {
        cur.swap(i, i - 1);
    }
    cur
}

/// Walk `order` toward `final_order` with adjacent swaps, more passes as
/// `blend` grows; at 1.0 the final order is returned outright.
pub fn blend_to_final(
    order: [usize; PARTICIPANTS],
    final_order: &[usize; PARTICIPANTS],
    blend: f32,
) -> [usize; PARTICIPANTS] {
    if blend <= 0.0 {
        return order;
    }
    if blend >= 1.0 {
        return *final_order;
    }

    let mut rank = [0usize; PARTICIPANTS];
    for (pos, &car) in final_order.iter().enumerate() {
        rank[car] = pos;
    }

    // Bubble passes keyed by final position; three passes sort four entries
    let mut cur = order;
    let passes = (3.0 * blend).ceil() as usize;
    for _ in 0..passes {
        for j in 0..PARTICIPANTS - 1 {
            if rank[cur[j]] > rank[cur[j + 1]] {
                cur.swap(j, j + 1);
            }
        }
    }
    cur
}

/// Target distance per participant for the dramatic phase
pub fn dramatic_targets(
    ctx: &TickContext<'_>,
    u: f32,
    progress: &[f32; PARTICIPANTS],
    rng: &mut RaceRng,
) -> [f32; PARTICIPANTS] {
    let th = &ctx.config.thresholds;
    let mean_v = ctx.course.mean_speed();
    let gaps = phase_gaps(ctx.outcome, u).map(|sec| sec * mean_v);

    let final_rank = ctx.outcome.position_of(ctx.player).map_or(PARTICIPANTS, |p| p + 1);
    let order = order_from_progress(progress);
    let order = nudge_toward(order, ctx.player, desired_player_rank(final_rank, u, rng));
    let blend = smoothstep(th.conv_start, th.lock_start, u);
    let order = blend_to_final(order, &ctx.outcome.order, blend);

    let mut targets = [0.0; PARTICIPANTS];
    for (rank, &car) in order.iter().enumerate() {
        let len = ctx.course.lane_lengths[car];
        targets[car] = clamp(len * u - gaps[rank], 0.0, len);
    }

    if let (Some(dnf), Some(cut)) = (ctx.outcome.dnf_index, ctx.outcome.cut_distance) {
        targets[dnf] = targets[dnf].min(cut);
    }

    if u > th.relax_after {
        for (target, &s) in targets.iter_mut().zip(progress) {
            *target = target.max(s - MAX_RETREAT);
        }
    }
    targets
}

/// Speeds for the dramatic phase
pub fn dramatic_speeds(
    ctx: &TickContext<'_>,
    beats: &[Beat],
    u: f32,
    progress: &[f32; PARTICIPANTS],
    rng: &mut RaceRng,
) -> [f32; PARTICIPANTS] {
    let th = &ctx.config.thresholds;
    let p = phase_multiplier(u, &ctx.config.phase_boosts);
    let sigma = beat_offsets(beats, u, th.beat_fade_start, th.lock_start);
    let targets = dramatic_targets(ctx, u, progress, rng);
    let t = ctx.course.duration;

    let mut speeds = [0.0; PARTICIPANTS];
    for i in 0..PARTICIPANTS {
        let v_eq = ctx.course.v_eq[i];
        let cap = v_eq * ctx.config.correction_max_frac;
        let correction = clamp(ctx.gain * (targets[i] - progress[i]) * t, -cap, cap);
        let noise = rng.signed() * ctx.config.noise_frac;

        let mut v = v_eq * p * (1.0 + sigma[i] + noise) + correction;

        // DNF participant coasts to a stop past its cut fraction
        if ctx.outcome.dnf_index == Some(i) && u >= ctx.outcome.dnf_cut_fraction {
            let window = 0.08 + rng.range(0.04, 0.08);
            v *= clamp(1.0 - (u - ctx.outcome.dnf_cut_fraction) / window, 0.0, 1.0);
        }
        speeds[i] = v.max(0.0);
    }
    speeds
}
