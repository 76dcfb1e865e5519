// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A frame timer fired by hand.

use std::cell::RefCell;
use std::rc::Rc;
use strata_core::platform::{FrameSignal, FrameTimer, TimerRequestId};

#[derive(Debug, Default)]
struct TimerState {
    next_id: u64,
    pending: Option<TimerRequestId>,
    requests: usize,
    cancellations: usize,
}

/// A [`FrameTimer`] that only fires through its [`ManualTimerHandle`].
///
/// Like a display refresh callback, at most one request is pending; a new
/// request replaces the previous one.
#[derive(Debug)]
pub struct ManualFrameTimer {
    state: Rc<RefCell<TimerState>>,
}

impl ManualFrameTimer {
    /// A disarmed timer and its handle.
    pub fn new() -> (Self, ManualTimerHandle) {
        let state = Rc::new(RefCell::new(TimerState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            ManualTimerHandle { state },
        )
    }
}

impl FrameTimer for ManualFrameTimer {
    fn request_frame(&mut self) -> TimerRequestId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.requests += 1;
        let id = TimerRequestId(state.next_id);
        state.pending = Some(id);
        id
    }

    fn cancel_frame(&mut self, id: TimerRequestId) {
        let mut state = self.state.borrow_mut();
        if state.pending == Some(id) {
            state.pending = None;
            state.cancellations += 1;
        }
    }
}

/// Fires a [`ManualFrameTimer`].
#[derive(Debug, Clone)]
pub struct ManualTimerHandle {
    state: Rc<RefCell<TimerState>>,
}

impl ManualTimerHandle {
    /// Fires the pending request at `time` milliseconds. `None` when disarmed.
    pub fn fire(&self, time: f64) -> Option<FrameSignal> {
        let request = self.state.borrow_mut().pending.take()?;
        Some(FrameSignal::Timer { request, time })
    }

    /// The pending request.
    pub fn pending(&self) -> Option<TimerRequestId> {
        self.state.borrow().pending
    }

    /// Number of requests made so far.
    pub fn requests(&self) -> usize {
        self.state.borrow().requests
    }

    /// Number of pending requests that were cancelled.
    pub fn cancellations(&self) -> usize {
        self.state.borrow().cancellations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_consumes_the_request() {
        let (mut timer, handle) = ManualFrameTimer::new();
        assert!(handle.fire(0.0).is_none());

        let id = timer.request_frame();
        assert_eq!(handle.fire(16.0), Some(FrameSignal::Timer { request: id, time: 16.0 }));
        assert!(handle.fire(32.0).is_none());
    }

    #[test]
    fn test_cancel_ignores_stale_ids() {
        let (mut timer, handle) = ManualFrameTimer::new();
        let old = timer.request_frame();
        let new = timer.request_frame();
        timer.cancel_frame(old);
        assert_eq!(handle.pending(), Some(new));
        timer.cancel_frame(new);
        assert_eq!(handle.pending(), None);
        assert_eq!(handle.cancellations(), 1);
    }
}
