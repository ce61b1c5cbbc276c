//! Late-phase ballistic lock
//!
//! Once the lock phase starts, each participant is steered so that
//! remaining distance over remaining time lands it on its goal exactly at its
//! planned finish time. Equalized pacing and chaos noise fade out as the
//! blend ramps to one.

use super::drama::phase_multiplier;
use super::rng::RaceRng;
use super::tick::TickContext;
use crate::clamp;
use crate::consts::*;

/// Speeds for one lock-phase frame plus how many participants have arrived
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockFrame {
    pub speeds: [f32; PARTICIPANTS],
    pub arrived: usize,
}

/// 0 at `lock_start`, 1 at `kill_chaos`
pub fn lock_blend(u: f32, lock_start: f32, kill_chaos: f32) -> f32 {
    clamp((u - lock_start) / (kill_chaos - lock_start).max(EPS), 0.0, 1.0)
}

/// Compute lock-phase speeds at elapsed time `t`
pub fn lock_speeds(
    ctx: &TickContext<'_>,
    u: f32,
    t: f32,
    progress: &[f32; PARTICIPANTS],
    rng: &mut RaceRng,
) -> LockFrame {
    let th = &ctx.config.thresholds;
    let blend = lock_blend(u, th.lock_start, th.kill_chaos);
    let p = phase_multiplier(u, &ctx.config.phase_boosts);

    let mut frame = LockFrame {
        speeds: [0.0; PARTICIPANTS],
        arrived: 0,
    };

    for i in 0..PARTICIPANTS {
        let v_pace = ctx.course.v_eq[i] * p;

        // DNF: glide onto the cut distance by the winner's finish time
        if ctx.outcome.dnf_index == Some(i) {
            if let Some(cut) = ctx.outcome.cut_distance {
                let remaining = (cut - progress[i]).max(0.0);
                if remaining <= ARRIVAL_EPS {
                    frame.arrived += 1;
                    continue;
                }
                let t_rem = (ctx.course.duration - t).max(DNF_MIN_TIME_LEFT);
                let v_ballistic = remaining / t_rem;
                frame.speeds[i] = ((1.0 - blend) * v_pace + blend * v_ballistic).max(0.0);
                continue;
            }
        }

        let remaining = (ctx.course.lane_lengths[i] - progress[i]).max(0.0);
        if remaining <= ARRIVAL_EPS {
            frame.arrived += 1;
            continue;
        }

        let t_rem = (ctx.outcome.finish_times[i] - t).max(FINISH_MIN_TIME_LEFT);
        let v_ballistic = remaining / t_rem;
        let chaos = if u < th.kill_chaos {
            (1.0 - blend) * rng.signed() * ctx.config.noise_frac
        } else {
            0.0
        };
        let v_soft = (1.0 - blend) * v_pace + blend * v_ballistic;
        let v_max = (v_pace * 3.0).max(v_ballistic * 1.25);
        frame.speeds[i] = clamp(v_soft * (1.0 + chaos), 0.0, v_max);
    }
    frame
}
