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

//! Pending frame callbacks and the driver that fires them.

use std::collections::BTreeMap;
use std::fmt;
use strata_core::host::HostFrameRequest;
use strata_core::platform::{FrameSignal, TimerRequestId};

/// Id returned by [`FrameScheduler::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(pub u64);

/// The loop currently expected to deliver the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameDriver {
    /// Platform timer loop, used without an immersive session.
    Timer(TimerRequestId),
    /// Host session frame loop.
    Session(HostFrameRequest),
}

/// Keeps frame callbacks independent of the driver.
///
/// Callbacks are keyed by an incrementing id. Swapping the driver never
/// touches them, so registrations survive session start and end.
pub struct FrameScheduler<C> {
    pending: BTreeMap<FrameRequestId, C>,
    next_id: u64,
    armed: Option<FrameDriver>,
}

impl<C> fmt::Debug for FrameScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .field("next_id", &self.next_id)
            .field("armed", &self.armed)
            .finish()
    }
}

impl<C> Default for FrameScheduler<C> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_id: 0,
            armed: None,
        }
    }
}

impl<C> FrameScheduler<C> {
    /// An empty, unarmed scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for the next tick.
    pub fn request(&mut self, callback: C) -> FrameRequestId {
        let id = FrameRequestId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, callback);
        id
    }

    /// Drops a pending callback. Returns `false` if it already ran or never existed.
    pub fn cancel(&mut self, id: FrameRequestId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Removes every pending callback, in registration order.
    ///
    /// Callbacks registered after this call belong to the next tick.
    pub fn take_pending(&mut self) -> Vec<C> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    /// Number of pending callbacks.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// `true` when a callback waits for a tick.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Records the driver that will deliver the next tick.
    pub fn arm(&mut self, driver: FrameDriver) {
        log::trace!("Frame driver armed: {:?}", driver);
        self.armed = Some(driver);
    }

    /// Forgets the armed driver, handing it back for cancellation.
    pub fn disarm(&mut self) -> Option<FrameDriver> {
        self.armed.take()
    }

    /// The armed driver.
    pub fn armed(&self) -> Option<FrameDriver> {
        self.armed
    }

    /// `true` if `signal` comes from the armed driver.
    pub fn accepts(&self, signal: &FrameSignal) -> bool {
        match (self.armed, signal) {
            (Some(FrameDriver::Timer(armed)), FrameSignal::Timer { request, .. }) => armed == *request,
            (Some(FrameDriver::Session(armed)), FrameSignal::Session { request, .. }) => {
                armed == *request
            }
            _ => false,
        }
    }
}
