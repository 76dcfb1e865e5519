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

//! Platform frame-loop contract.

use crate::host::{HostFrame, HostFrameRequest};
use std::fmt::Debug;

/// Opaque id of a pending platform timer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerRequestId(pub u64);

/// The generic display-refresh loop used while no immersive session is active.
pub trait FrameTimer: Debug {
    /// Arms the timer for one frame.
    fn request_frame(&mut self) -> TimerRequestId;

    /// Disarms a pending request. Unknown ids are ignored.
    fn cancel_frame(&mut self, id: TimerRequestId);
}

/// A fired frame driver, reported by the embedding loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameSignal {
    /// The platform timer fired.
    Timer {
        /// The request that fired.
        request: TimerRequestId,
        /// Timestamp in milliseconds.
        time: f64,
    },
    /// The host session frame loop fired.
    Session {
        /// The request that fired.
        request: HostFrameRequest,
        /// The frame, valid for this tick only.
        frame: HostFrame,
    },
}

impl FrameSignal {
    /// Timestamp in milliseconds.
    pub fn time(&self) -> f64 {
        match self {
            FrameSignal::Timer { time, .. } => *time,
            FrameSignal::Session { frame, .. } => frame.time,
        }
    }
}
