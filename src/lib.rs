//! Race Director - deterministic outcome planning for a four-lane race
//!
//! Core modules:
//! - `sim`: Deterministic planning and per-frame speed control (no host dependencies)
//! - `config`: Round configuration, presets and JSON loading
//! - `host`: Frame/timer host abstraction plus a headless virtual host
//! - `finish`: Single-resolution race result signal
//! - `director`: Lifecycle state machine tying the above together

pub mod config;
pub mod director;
pub mod finish;
pub mod host;
pub mod sim;

pub use config::{ConfigError, DramaPreset, RoundConfig};
pub use director::{DirectorOptions, RaceDirector, RacePhase};
pub use finish::{FinishFuture, FinishSignal, RaceResult};
pub use host::{FrameHost, FrameToken, HeadlessTrack, HostEvent, TimerToken, VirtualHost};
pub use sim::{Lane, Outcome, Placement};

/// Race-wide constants
pub mod consts {
    /// The race always has exactly four lanes/participants
    pub const PARTICIPANTS: usize = 4;

    /// Floor for any denominator that could approach zero
    pub const EPS: f32 = 1e-6;
    /// Reference-length floor used by lane equalization
    pub const LENGTH_EPS: f32 = 1e-9;

    /// Minimum separation between consecutive finish gaps (seconds)
    pub const MIN_GAP: f32 = 0.05;
    /// DNF cut distance is pulled slightly short of the sampled fraction
    pub const DNF_CUT_SHRINK: f32 = 0.98;

    /// Remaining distance at which a participant counts as arrived
    pub const ARRIVAL_EPS: f32 = 0.01;
    /// Time past the latest planned finish before the lock phase gives up
    pub const FINISH_GRACE: f32 = 2.0;
    /// Extra slack added to the fallback timer on top of the grace period
    pub const WATCHDOG_SLACK: f32 = 0.25;
    /// Shortest fallback timer ever armed
    pub const WATCHDOG_MIN: f32 = 0.5;

    /// Late-phase targets never ask a participant to fall back more than this
    pub const MAX_RETREAT: f32 = 0.5;
    /// Minimum time-to-go used when steering the DNF participant to its cut
    pub const DNF_MIN_TIME_LEFT: f32 = 0.15;
    /// Longest upcoming frame (seconds) the DNF stop cap is sized for
    pub const DNF_STOP_HORIZON: f32 = 0.25;
    /// Minimum time-to-go used when steering finishers to the line
    pub const FINISH_MIN_TIME_LEFT: f32 = 1e-3;

    /// Phase multiplier segment boundaries (normalized round time)
    pub const PHASE_OPENING_END: f32 = 0.15;
    pub const PHASE_CLOSING_START: f32 = 0.85;
    /// Gap interpolation switches from early->mid to mid->final here
    pub const GAP_MID_AT: f32 = 0.6;
}

/// Clamp `x` into `[lo, hi]`. Never panics; if the bounds cross, `hi` wins.
#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    x.max(lo).min(hi)
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Cubic ease-in-out on [0, 1]
#[inline]
pub fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Hermite smoothstep between two edges
#[inline]
pub fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = clamp((x - e0) / (e1 - e0).max(consts::EPS), 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
