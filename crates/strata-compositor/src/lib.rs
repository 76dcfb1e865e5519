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

//! # Strata Compositor
//!
//! Renders a scene into an immersive session and composites 2-D panels,
//! either through the host's native layers or as geometry in the scene.
//!
//! The pieces, leaves first: [`render_target`] wraps one framebuffer bound to
//! a host image, [`layer`] holds the composition layers, [`session`] owns the
//! immersive session and its host layers, and [`renderer`] drives the frame
//! loop on top of them.

#![warn(missing_docs)]

pub mod clip;
pub mod config;
pub mod error;
pub mod frame;
pub mod layer;
pub mod render_target;
pub mod renderer;
pub mod session;

pub use config::RendererSettings;
pub use error::{XrError, XrResult};
pub use layer::{CompositionLayer, LayerId, LayerKind, QuadLayer, QuadLayerOptions};
pub use render_target::{MsaaMode, RenderTarget};
pub use renderer::{OffscreenTarget, RenderOptions, XrRenderer};
pub use session::{SessionEvent, SessionPhase, SessionState};
