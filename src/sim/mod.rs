//! Deterministic race simulation
//!
//! Everything that decides speeds lives here. This module must be pure and
//! deterministic:
//! - Seeded RNG only
//! - Fixed participant order (by index)
//! - No host, timer or renderer dependencies

pub mod drama;
pub mod lane;
pub mod lock;
pub mod outcome;
pub mod rng;
pub mod state;
pub mod tick;

pub use drama::{Beat, make_beats, phase_multiplier};
pub use lane::{EqualizeRef, Lane, equalize_speeds, lane_length};
pub use lock::{LockFrame, lock_speeds};
pub use outcome::{Outcome, Placement, make_finish_gaps, plan_outcome};
pub use rng::RaceRng;
pub use state::{ControlPath, Course, RoundState};
pub use tick::{TickContext, TickOutcome, tick};
