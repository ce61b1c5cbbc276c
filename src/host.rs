//! Host scheduling abstraction
//!
//! The director never owns a clock. A host hands out two kinds of
//! registrations, a recurring per-frame callback and a one-shot timeout, and
//! later delivers them back as `HostEvent`s through `RaceDirector::dispatch`.
//!
//! `VirtualHost` is a deterministic host driven by explicit time steps, and
//! `HeadlessTrack` is a minimal renderer stand-in that integrates pushed
//! speeds into lane progress. Together they run whole rounds without a
//! real render loop.

use std::cell::RefCell;
use std::rc::Rc;

use crate::consts::{ARRIVAL_EPS, PARTICIPANTS};
use crate::sim::Lane;

/// Handle for a per-frame registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Handle for a one-shot timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Something the host delivers to the director
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// A frame elapsed; `dt` is in seconds
    Frame { token: FrameToken, dt: f32 },
    /// A timeout expired
    Timeout { token: TimerToken },
}

/// Frame and timer registrations offered by the host
pub trait FrameHost {
    /// Start delivering frames until cancelled
    fn request_frames(&mut self) -> FrameToken;
    fn cancel_frames(&mut self, token: FrameToken);
    /// Deliver one `Timeout` after `delay_secs`
    fn set_timeout(&mut self, delay_secs: f32) -> TimerToken;
    fn clear_timeout(&mut self, token: TimerToken);
}

/// Deterministic host with a manually advanced clock
#[derive(Debug, Clone, Default)]
pub struct VirtualHost {
    now: f64,
    next_id: u64,
    frames: Option<FrameToken>,
    timers: Vec<(TimerToken, f64)>,
    /// Frames registered but never delivered (simulates a stalled render loop)
    stalled: bool,
}

impl VirtualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time (seconds)
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    pub fn has_frames(&self) -> bool {
        self.frames.is_some()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Virtual time at which the earliest pending timeout fires
    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.iter().map(|&(_, at)| at).min_by(|a, b| a.total_cmp(b))
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Move the clock forward and collect what became due
    pub fn advance(&mut self, dt: f32) -> Vec<HostEvent> {
        self.now += dt as f64;
        let mut events = Vec::new();

        if let Some(token) = self.frames {
            if !self.stalled {
                events.push(HostEvent::Frame { token, dt });
            }
        }

        let now = self.now;
        let mut due: Vec<(TimerToken, f64)> = self.timers.iter().copied().filter(|&(_, at)| at <= now).collect();
        due.sort_by(|a, b| a.1.total_cmp(&b.1));
        self.timers.retain(|&(_, at)| at > now);
        events.extend(due.into_iter().map(|(token, _)| HostEvent::Timeout { token }));
        events
    }
}

impl FrameHost for VirtualHost {
    fn request_frames(&mut self) -> FrameToken {
        let token = FrameToken(self.next_id());
        self.frames = Some(token);
        token
    }

    fn cancel_frames(&mut self, token: FrameToken) {
        if self.frames == Some(token) {
            self.frames = None;
        }
    }

    fn set_timeout(&mut self, delay_secs: f32) -> TimerToken {
        let token = TimerToken(self.next_id());
        self.timers.push((token, self.now + delay_secs.max(0.0) as f64));
        token
    }

    fn clear_timeout(&mut self, token: TimerToken) {
        self.timers.retain(|&(t, _)| t != token);
    }
}

#[derive(Debug)]
struct TrackInner {
    lengths: [f32; PARTICIPANTS],
    progress: [f32; PARTICIPANTS],
    speeds: [f32; PARTICIPANTS],
    peak: [f32; PARTICIPANTS],
    arrivals: [Option<f32>; PARTICIPANTS],
    clock: f32,
}

/// Kinematic stand-in for a renderer: integrates speeds along each lane
#[derive(Debug, Clone)]
pub struct HeadlessTrack {
    inner: Rc<RefCell<TrackInner>>,
}

impl HeadlessTrack {
    pub fn new(lanes: &[Lane; PARTICIPANTS]) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TrackInner {
                lengths: std::array::from_fn(|i| lanes[i].length()),
                progress: [0.0; PARTICIPANTS],
                speeds: [0.0; PARTICIPANTS],
                peak: [0.0; PARTICIPANTS],
                arrivals: [None; PARTICIPANTS],
                clock: 0.0,
            })),
        }
    }

    /// Move every entity by its current speed for `dt` seconds
    pub fn step(&self, dt: f32) {
        let mut inner = self.inner.borrow_mut();
        inner.clock += dt;
        let clock = inner.clock;
        for i in 0..PARTICIPANTS {
            let len = inner.lengths[i];
            let s = (inner.progress[i] + inner.speeds[i] * dt).min(len);
            inner.progress[i] = s;
            inner.peak[i] = inner.peak[i].max(s);
            if inner.arrivals[i].is_none() && s >= len - ARRIVAL_EPS {
                inner.arrivals[i] = Some(clock);
            }
        }
    }

    /// Closure suitable for `RaceDirector::attach` as the speed sink
    pub fn speed_sink(&self) -> impl FnMut(&[f32; PARTICIPANTS]) + 'static {
        let inner = self.inner.clone();
        move |speeds| inner.borrow_mut().speeds = *speeds
    }

    /// Closure suitable for `RaceDirector::attach` as the progress source
    pub fn progress_source(&self) -> impl FnMut() -> [f32; PARTICIPANTS] + 'static {
        let inner = self.inner.clone();
        move || inner.borrow().progress
    }

    pub fn progress(&self) -> [f32; PARTICIPANTS] {
        self.inner.borrow().progress
    }

    pub fn speeds(&self) -> [f32; PARTICIPANTS] {
        self.inner.borrow().speeds
    }

    /// Furthest progress ever reached per entity
    pub fn peak_progress(&self) -> [f32; PARTICIPANTS] {
        self.inner.borrow().peak
    }

    /// Track time at which each entity reached its lane end
    pub fn arrivals(&self) -> [Option<f32>; PARTICIPANTS] {
        self.inner.borrow().arrivals
    }

    /// Entities that reached the end, in arrival order
    pub fn finish_order(&self) -> Vec<usize> {
        let arrivals = self.arrivals();
        let mut arrived: Vec<(usize, f32)> = arrivals
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.map(|t| (i, t)))
            .collect();
        arrived.sort_by(|a, b| a.1.total_cmp(&b.1));
        arrived.into_iter().map(|(i, _)| i).collect()
    }
}
