//! Race lifecycle: Idle -> Running -> Completed
//!
//! The director owns the plan and the per-round state, talks to the renderer
//! only through the two attached closures, and to the host only through
//! `FrameHost`. Completion can be triggered three ways (all arrived, fallback
//! timer, explicit stop); whichever comes first resolves the result, the
//! rest are no-ops.

use serde::{Deserialize, Serialize};

use crate::config::RoundConfig;
use crate::consts::*;
use crate::finish::{FinishFuture, FinishSignal, RaceResult};
use crate::host::{FrameHost, FrameToken, HeadlessTrack, HostEvent, TimerToken, VirtualHost};
use crate::sim::{
    Course, Lane, Outcome, Placement, RaceRng, RoundState, TickContext, TickOutcome, make_beats,
    plan_outcome, tick,
};

type SpeedSink = Box<dyn FnMut(&[f32; PARTICIPANTS])>;
type ProgressSource = Box<dyn FnMut() -> [f32; PARTICIPANTS]>;

/// Lifecycle phase of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    /// Constructed or reset, not started
    Idle,
    /// Frames are being processed
    Running,
    /// Result delivered; start a new round to race again
    Completed,
}

/// Construction inputs besides the round config
#[derive(Debug, Clone)]
pub struct DirectorOptions {
    pub lanes: [Lane; PARTICIPANTS],
    /// Speed on the reference lane
    pub base_speed: f32,
    /// Player's participant index (clamped into 0..4)
    pub player_index: usize,
}

/// Plans a race outcome and steers four entities onto it frame by frame
pub struct RaceDirector<H: FrameHost> {
    lanes: [Lane; PARTICIPANTS],
    base_speed: f32,
    player: usize,
    config: RoundConfig,
    rng: RaceRng,
    course: Course,
    outcome: Outcome,
    state: RoundState,
    phase: RacePhase,
    host: H,
    speed_sink: Option<SpeedSink>,
    progress_source: Option<ProgressSource>,
    frame_token: Option<FrameToken>,
    timer_token: Option<TimerToken>,
    finish: FinishSignal,
}

impl<H: FrameHost> RaceDirector<H> {
    pub fn new(options: DirectorOptions, config: RoundConfig, host: H) -> Self {
        let config = config.sanitized();
        let player = options.player_index.min(PARTICIPANTS - 1);
        let mut rng = RaceRng::from_seed_str(&config.seed);
        let course = Course::new(&options.lanes, options.base_speed, player, &config);
        let beats = make_beats(config.beat_count, config.beat_span, &mut rng);

        // Provisional plan; callers normally set the real one before start
        let outcome = plan_outcome(
            Placement::Place(2),
            player,
            &course.lane_lengths,
            course.duration,
            &config,
            &mut rng,
        );

        log::info!(
            "Race director ready: seed={:?} player={} duration={:.2}s v_eq={:?}",
            config.seed,
            player,
            course.duration,
            course.v_eq
        );

        Self {
            lanes: options.lanes,
            base_speed: options.base_speed,
            player,
            config,
            rng,
            course,
            outcome,
            state: RoundState::new(beats),
            phase: RacePhase::Idle,
            host,
            speed_sink: None,
            progress_source: None,
            frame_token: None,
            timer_token: None,
            finish: FinishSignal::new(),
        }
    }

    /// Connect the renderer: a sink for speeds and a source for progress
    pub fn attach(
        &mut self,
        speed_sink: impl FnMut(&[f32; PARTICIPANTS]) + 'static,
        progress_source: impl FnMut() -> [f32; PARTICIPANTS] + 'static,
    ) {
        self.speed_sink = Some(Box::new(speed_sink));
        self.progress_source = Some(Box::new(progress_source));
    }

    // === Placement ===

    /// Plan a new outcome for the player
    pub fn set_outcome(&mut self, placement: Placement) {
        if self.phase == RacePhase::Running {
            log::warn!("Replanning outcome mid-round ({})", placement);
        }
        self.outcome = plan_outcome(
            placement,
            self.player,
            &self.course.lane_lengths,
            self.course.duration,
            &self.config,
            &mut self.rng,
        );
        if self.phase == RacePhase::Running {
            self.arm_fallback_timer();
        }
    }

    /// Re-derive equalized speeds and finish times from the current lanes
    pub fn recompute_equalization(&mut self) {
        self.course = Course::new(&self.lanes, self.base_speed, self.player, &self.config);
        self.outcome.retime(self.course.duration, &self.course.lane_lengths);
        log::debug!(
            "Equalization recomputed: duration={:.2}s v_eq={:?}",
            self.course.duration,
            self.course.v_eq
        );
        if self.phase == RacePhase::Running {
            let delay = self.arm_fallback_timer();
            log::debug!("Fallback timer re-armed for {:.2}s", delay);
        }
    }

    /// Replace lane geometry; keeps the planned order and gaps
    pub fn set_lanes(&mut self, lanes: [Lane; PARTICIPANTS]) {
        self.lanes = lanes;
        self.recompute_equalization();
    }

    // === Lifecycle ===

    /// Begin the round: register for frames and arm the fallback timer
    pub fn start(&mut self) {
        if self.phase != RacePhase::Idle {
            log::warn!("start() ignored in phase {:?}", self.phase);
            return;
        }

        self.state.elapsed = 0.0;
        self.frame_token = Some(self.host.request_frames());
        let delay = self.arm_fallback_timer();
        self.phase = RacePhase::Running;

        log::info!(
            "Race started: planned {} order={:?}, fallback in {:.2}s",
            self.outcome.placement,
            self.outcome.order,
            delay
        );
    }

    /// Cancel registrations and complete the round if it has not completed
    pub fn stop(&mut self) {
        self.cancel_registrations();
        self.complete();
    }

    /// Reset the elapsed-time accumulator
    pub fn reset(&mut self) {
        self.state.elapsed = 0.0;
    }

    /// Push equalized speeds before the animation starts
    pub fn prime(&mut self) {
        self.state.v_now = self.course.v_eq;
        if let Some(sink) = self.speed_sink.as_mut() {
            sink(&self.course.v_eq);
        }
    }

    /// Close out the current round and return to Idle with fresh per-round
    /// state and a fresh result signal. The planned outcome is kept.
    pub fn new_round(&mut self) {
        if self.phase != RacePhase::Completed {
            self.stop();
        }
        let beats = make_beats(self.config.beat_count, self.config.beat_span, &mut self.rng);
        self.state = RoundState::new(beats);
        self.finish = FinishSignal::new();
        self.phase = RacePhase::Idle;
    }

    /// (Re)schedule the fallback timer against the current plan; returns the delay
    fn arm_fallback_timer(&mut self) -> f32 {
        if let Some(token) = self.timer_token.take() {
            self.host.clear_timeout(token);
        }
        let latest = self.outcome.latest_finish() + FINISH_GRACE + WATCHDOG_SLACK;
        let delay = (latest - self.state.elapsed).max(WATCHDOG_MIN);
        self.timer_token = Some(self.host.set_timeout(delay));
        delay
    }

    fn cancel_registrations(&mut self) {
        if let Some(token) = self.frame_token.take() {
            self.host.cancel_frames(token);
        }
        if let Some(token) = self.timer_token.take() {
            self.host.clear_timeout(token);
        }
    }

    /// Single completion entry point; only the first call has any effect
    fn complete(&mut self) {
        if self.phase == RacePhase::Completed {
            return;
        }
        self.phase = RacePhase::Completed;
        let result = RaceResult::from_outcome(&self.outcome, self.player);
        log::info!(
            "Race complete after {:.2}s ({} frames): order={:?} player={}",
            self.state.elapsed,
            self.state.frames,
            result.order,
            result.player_place
        );
        self.finish.resolve(result);
    }

    // === Host events ===

    pub fn dispatch(&mut self, event: HostEvent) {
        match event {
            HostEvent::Frame { token, dt } => self.on_frame(token, dt),
            HostEvent::Timeout { token } => self.on_timeout(token),
        }
    }

    /// One frame: read progress, run the active controller, push speeds
    pub fn on_frame(&mut self, token: FrameToken, dt: f32) {
        if self.phase != RacePhase::Running || self.frame_token != Some(token) {
            return;
        }
        let (Some(source), Some(sink)) = (self.progress_source.as_mut(), self.speed_sink.as_mut())
        else {
            return;
        };

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let raw = source();
        let progress: [f32; PARTICIPANTS] = std::array::from_fn(|i| {
            let s = raw[i];
            if s.is_finite() {
                s.clamp(0.0, self.course.lane_lengths[i])
            } else {
                0.0
            }
        });

        let ctx = TickContext::new(&self.course, &self.outcome, &self.config, self.player);
        let result = tick(&mut self.state, &ctx, &mut self.rng, &progress, dt);
        sink(&self.state.v_now);

        match result {
            TickOutcome::Racing => {}
            TickOutcome::Arrived => {
                log::debug!("All participants arrived at t={:.3}", self.state.elapsed);
                self.stop();
            }
            TickOutcome::Overdue => {
                log::warn!(
                    "Lock phase overdue at t={:.3}; forcing completion",
                    self.state.elapsed
                );
                self.stop();
            }
        }
    }

    /// Fallback timer: resolve even if frames stopped arriving
    pub fn on_timeout(&mut self, token: TimerToken) {
        if self.timer_token != Some(token) {
            return;
        }
        self.timer_token = None;
        if self.phase != RacePhase::Completed {
            log::warn!("Fallback timer fired at t={:.3}", self.state.elapsed);
        }
        self.stop();
    }

    // === Completion ===

    /// Future resolving to the round's result (ready at once if completed)
    pub fn wait_for_finish(&self) -> FinishFuture {
        self.finish.future()
    }

    /// Call `callback` with the result once the round completes
    pub fn on_finish(&self, callback: impl FnOnce(&RaceResult) + 'static) {
        self.finish.on_finish(callback);
    }

    pub fn result(&self) -> Option<RaceResult> {
        self.finish.result()
    }

    // === Accessors ===

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn player_index(&self) -> usize {
        self.player
    }

    pub fn lanes(&self) -> &[Lane; PARTICIPANTS] {
        &self.lanes
    }

    pub fn elapsed(&self) -> f32 {
        self.state.elapsed
    }

    /// Speeds from the most recent frame (or prime)
    pub fn speeds(&self) -> [f32; PARTICIPANTS] {
        self.state.v_now
    }

    pub fn round_state(&self) -> &RoundState {
        &self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl RaceDirector<VirtualHost> {
    /// Drive the round on the virtual host with fixed steps of `dt`,
    /// stepping `track` before each delivered frame. Stops once the round
    /// completes or `max_secs` of virtual time pass.
    pub fn run_headless(
        &mut self,
        track: &HeadlessTrack,
        dt: f32,
        max_secs: f32,
    ) -> Option<RaceResult> {
        let dt = dt.max(EPS);
        let steps = (max_secs / dt).ceil() as u64;
        for _ in 0..steps {
            if self.phase == RacePhase::Completed {
                break;
            }
            let events = self.host.advance(dt);
            if events.iter().any(|e| matches!(e, HostEvent::Frame { .. })) {
                track.step(dt);
            }
            for event in events {
                self.dispatch(event);
            }
        }
        self.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::cell::Cell;
    use std::rc::Rc;

    const DT: f32 = 1.0 / 60.0;

    fn lanes() -> [Lane; PARTICIPANTS] {
        [0.0f32, 1.0, 2.0, 3.0].map(|y| Lane::straight(Vec2::new(0.0, y), Vec2::new(100.0, y)))
    }

    fn director(seed: &str) -> RaceDirector<VirtualHost> {
        let options = DirectorOptions {
            lanes: lanes(),
            base_speed: 10.0,
            player_index: 1,
        };
        RaceDirector::new(options, RoundConfig::with_seed(seed), VirtualHost::new())
    }

    fn attached(seed: &str) -> (RaceDirector<VirtualHost>, HeadlessTrack) {
        let mut d = director(seed);
        let track = HeadlessTrack::new(d.lanes());
        d.attach(track.speed_sink(), track.progress_source());
        (d, track)
    }

    #[test]
    fn test_start_registers_frames_and_timer() {
        let mut d = director("start");
        assert_eq!(d.phase(), RacePhase::Idle);
        d.start();
        assert_eq!(d.phase(), RacePhase::Running);
        assert!(d.host().has_frames());
        assert_eq!(d.host().pending_timers(), 1);
    }

    #[test]
    fn test_stop_cancels_and_resolves_once() {
        let mut d = director("stop");
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        d.on_finish(move |_| h.set(h.get() + 1));
        d.start();
        d.stop();
        d.stop();
        assert_eq!(d.phase(), RacePhase::Completed);
        assert_eq!(hits.get(), 1);
        assert!(!d.host().has_frames());
        assert_eq!(d.host().pending_timers(), 0);
    }

    #[test]
    fn test_start_after_complete_ignored() {
        let mut d = director("again");
        d.start();
        d.stop();
        d.start();
        assert_eq!(d.phase(), RacePhase::Completed);
        assert!(!d.host().has_frames());
    }

    #[test]
    fn test_prime_pushes_equalized_speeds() {
        let (mut d, track) = attached("prime");
        d.prime();
        assert_eq!(track.speeds(), [10.0; PARTICIPANTS]);
    }

    #[test]
    fn test_frames_without_renderer_do_not_advance() {
        let mut d = director("detached");
        d.start();
        for event in d.host_mut().advance(DT) {
            d.dispatch(event);
        }
        assert_eq!(d.elapsed(), 0.0);
    }

    #[test]
    fn test_stale_frame_token_ignored() {
        let (mut d, _track) = attached("stale");
        d.start();
        d.on_frame(FrameToken(9999), DT);
        assert_eq!(d.elapsed(), 0.0);
    }

    #[test]
    fn test_bad_dt_treated_as_zero() {
        let (mut d, _track) = attached("dt");
        d.start();
        let token = match d.host_mut().advance(DT)[0] {
            HostEvent::Frame { token, .. } => token,
            other => panic!("unexpected {:?}", other),
        };
        d.on_frame(token, f32::NAN);
        d.on_frame(token, -1.0);
        assert_eq!(d.elapsed(), 0.0);
        assert_eq!(d.round_state().frames, 2);
    }

    #[test]
    fn test_full_round_lands_plan() {
        let (mut d, track) = attached("full");
        d.set_outcome(Placement::Place(1));
        d.prime();
        d.start();
        let result = d.run_headless(&track, DT, 30.0).expect("round resolves");

        assert_eq!(result.player_place, Placement::Place(1));
        assert_eq!(result.order[0], 1);
        assert_eq!(track.finish_order(), result.order.to_vec());
        for (i, t) in track.arrivals().iter().enumerate() {
            let t = t.expect("everyone finishes");
            assert!((t - result.finish_times[i]).abs() < 0.1, "car {} at {} vs {}", i, t, result.finish_times[i]);
        }
    }

    #[test]
    fn test_reset_only_clears_clock() {
        let (mut d, track) = attached("reset");
        d.start();
        d.run_headless(&track, DT, 1.0);
        assert!(d.elapsed() > 0.9);
        d.reset();
        assert_eq!(d.elapsed(), 0.0);
        assert_eq!(d.phase(), RacePhase::Running);
    }

    #[test]
    fn test_new_round_gives_fresh_signal() {
        let (mut d, _track) = attached("rounds");
        d.start();
        d.stop();
        let first = d.result().expect("resolved");

        d.new_round();
        assert_eq!(d.phase(), RacePhase::Idle);
        assert!(d.result().is_none());
        d.set_outcome(Placement::Place(4));
        d.start();
        d.stop();
        let second = d.result().expect("resolved");
        assert_eq!(first.player_place, Placement::Place(2));
        assert_eq!(second.player_place, Placement::Place(4));
    }

    #[test]
    fn test_set_lanes_retimes() {
        let mut d = director("lanes");
        let order = d.outcome().order;
        let long = [0.0f32, 1.0, 2.0, 3.0].map(|y| Lane::straight(Vec2::new(0.0, y), Vec2::new(200.0, y)));
        d.set_lanes(long);
        assert!((d.course().duration - 20.0).abs() < 1e-3);
        assert_eq!(d.outcome().order, order);
        assert_eq!(d.outcome().finish_times[order[0]], d.course().duration);
    }

    #[test]
    fn test_set_lanes_mid_round_moves_timer() {
        let (mut d, track) = attached("rearm");
        d.start();
        let before = d.host().next_deadline().expect("timer armed");
        d.run_headless(&track, DT, 1.0);

        let long = [0.0f32, 1.0, 2.0, 3.0].map(|y| Lane::straight(Vec2::new(0.0, y), Vec2::new(200.0, y)));
        d.set_lanes(long);
        assert_eq!(d.host().pending_timers(), 1);
        let after = d.host().next_deadline().expect("timer re-armed");
        let expected = d.outcome().latest_finish() + FINISH_GRACE + WATCHDOG_SLACK;
        assert!(after > before + 9.0);
        assert!((after - expected as f64).abs() < 0.05, "deadline {} vs {}", after, expected);
    }

    #[test]
    fn test_replan_mid_round_moves_timer() {
        let (mut d, track) = attached("replan");
        d.start();
        d.run_headless(&track, DT, 0.5);
        d.set_outcome(Placement::Place(4));
        assert_eq!(d.host().pending_timers(), 1);
        let deadline = d.host().next_deadline().expect("timer re-armed");
        let expected = d.outcome().latest_finish() + FINISH_GRACE + WATCHDOG_SLACK;
        assert!((deadline - expected as f64).abs() < 0.05);
    }

    #[test]
    fn test_idle_changes_leave_host_alone() {
        let mut d = director("idle");
        d.set_outcome(Placement::Dnf);
        d.recompute_equalization();
        assert_eq!(d.host().pending_timers(), 0);
    }
}
