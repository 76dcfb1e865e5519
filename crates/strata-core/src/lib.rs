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

//! # Strata Core
//!
//! Foundational crate containing the math kernel, the graphics-context and
//! immersive-host contracts, and the minimal scene interfaces that the
//! compositor is written against.
//!
//! Nothing in this crate talks to a real GPU or a real headset. Concrete
//! implementations live in `strata-infra`.

#![warn(missing_docs)]

pub mod graphics;
pub mod host;
pub mod math;
pub mod platform;
pub mod scene;

pub use graphics::{ContentTexture, GraphicsContext, ResourceError};
pub use host::{GraphicsBinding, HostError, HostSession, XrHost};
pub use platform::{FrameSignal, FrameTimer};
