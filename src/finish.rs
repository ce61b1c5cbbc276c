//! Single-resolution race result
//!
//! The first `resolve` wins; later calls are ignored. Waiting is possible
//! through callbacks or as a `Future`, before or after resolution.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use serde::{Deserialize, Serialize};

use crate::consts::PARTICIPANTS;
use crate::sim::{Outcome, Placement};

/// What a finished round reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    /// Participant indices, winner first
    pub order: [usize; PARTICIPANTS],
    /// Planned finish time per participant (seconds since start)
    pub finish_times: [f32; PARTICIPANTS],
    pub dnf_index: Option<usize>,
    /// Player's place or DNF
    pub player_place: Placement,
}

impl RaceResult {
    pub fn from_outcome(outcome: &Outcome, player: usize) -> Self {
        let player_place = if outcome.dnf_index == Some(player) {
            Placement::Dnf
        } else {
            let pos = outcome.position_of(player).unwrap_or(PARTICIPANTS - 1);
            Placement::Place(pos as u8 + 1)
        };
        Self {
            order: outcome.order,
            finish_times: outcome.finish_times,
            dnf_index: outcome.dnf_index,
            player_place,
        }
    }
}

type FinishCallback = Box<dyn FnOnce(&RaceResult)>;

#[derive(Default)]
struct SignalInner {
    result: Option<RaceResult>,
    wakers: Vec<Waker>,
    callbacks: Vec<FinishCallback>,
}

/// Shared handle to a round's result
#[derive(Clone, Default)]
pub struct FinishSignal {
    inner: Rc<RefCell<SignalInner>>,
}

impl std::fmt::Debug for FinishSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FinishSignal")
            .field("result", &inner.result)
            .field("pending_callbacks", &inner.callbacks.len())
            .finish()
    }
}

impl FinishSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result and notify waiters. Returns false if already resolved.
    pub fn resolve(&self, result: RaceResult) -> bool {
        let (callbacks, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.result.is_some() {
                return false;
            }
            inner.result = Some(result.clone());
            (
                std::mem::take(&mut inner.callbacks),
                std::mem::take(&mut inner.wakers),
            )
        };

        // Borrow released: callbacks may query the signal
        for callback in callbacks {
            callback(&result);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.borrow().result.is_some()
    }

    pub fn result(&self) -> Option<RaceResult> {
        self.inner.borrow().result.clone()
    }

    /// Run `callback` once with the result (immediately if already resolved)
    pub fn on_finish(&self, callback: impl FnOnce(&RaceResult) + 'static) {
        let resolved = self.result();
        match resolved {
            Some(result) => callback(&result),
            None => self.inner.borrow_mut().callbacks.push(Box::new(callback)),
        }
    }

    pub fn future(&self) -> FinishFuture {
        FinishFuture {
            signal: self.clone(),
        }
    }
}

/// Resolves to the round's result
#[derive(Debug, Clone)]
pub struct FinishFuture {
    signal: FinishSignal,
}

impl Future for FinishFuture {
    type Output = RaceResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<RaceResult> {
        let mut inner = self.signal.inner.borrow_mut();
        if let Some(result) = &inner.result {
            return Poll::Ready(result.clone());
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
