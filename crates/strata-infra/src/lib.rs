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

//! # Strata Infra
//!
//! Concrete implementations of the `strata-core` contracts that run without a
//! GPU or a headset:
//!
//! - [`HeadlessGraphicsContext`] records every graphics call into a shared
//!   [`GraphicsLog`] and tracks the objects it hands out.
//! - [`SimulatedHost`] grants, rejects and drives immersive sessions as
//!   scripted through a [`SimulatedHostHandle`].
//! - [`ManualFrameTimer`] is a platform frame loop fired by hand.
//!
//! The compositor tests and the sandbox are built on these.

#![warn(missing_docs)]

pub mod graphics;
pub mod host;
pub mod platform;

pub use graphics::{GraphicsCall, GraphicsLog, HeadlessGraphicsContext};
pub use host::{SimulatedHost, SimulatedHostHandle, SimulatedLayer};
pub use platform::{ManualFrameTimer, ManualTimerHandle};
