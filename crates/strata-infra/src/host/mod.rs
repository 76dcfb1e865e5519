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

//! A simulated immersive host.
//!
//! [`SimulatedHost`] is handed to the compositor as its [`XrHost`]. The paired
//! [`SimulatedHostHandle`] stays with the caller to script the device
//! (grant or reject sessions, fire frames, queue events, move controllers)
//! and to observe what the compositor asked for (allocated layers, committed
//! render states).
//!
//! [`XrHost`]: strata_core::host::XrHost

mod handle;
mod session;
mod state;

pub use self::handle::SimulatedHostHandle;
pub use self::session::SimulatedHost;
pub use self::state::SimulatedLayer;
