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

//! Composition layers.
//!
//! A composition layer is a positioned panel whose content comes from an
//! application texture. It is shown in one of two ways:
//!
//! - **native**: a host composition layer is bound, content is copied into
//!   the host's per-eye images and the host composites it at display
//!   resolution. The layer's clip primitive stays in the scene as an alpha or
//!   depth mask.
//! - **emulated**: no host layer exists, the clip primitive draws the content
//!   as ordinary scene geometry.
//!
//! [`CompositionLayer`] holds the shared binding and update logic as provided
//! methods over a [`LayerCore`]. Concrete kinds ([`QuadLayer`]) supply the
//! geometry, the validity rule and the content upload.

mod quad;
mod registry;
mod shared;

pub use self::quad::{QuadLayer, QuadLayerOptions};
pub use self::registry::LayerRegistry;
pub use self::shared::{ConstructHook, LayerCore};

use crate::clip::{ClipPrimitive, MaskMode, ProgramCache};
use crate::config::RendererSettings;
use crate::error::XrResult;
use std::any::Any;
use std::fmt::{self, Debug};
use strata_core::graphics::GraphicsContext;
use strata_core::host::{GraphicsBinding, HostFrame, HostLayerHandle, QuadLayerInit, ReferenceSpace};

/// Identifier assigned by a [`LayerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

/// Layer kinds known to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// The full-view presentation layer the scene renders into.
    Base,
    /// A flat rectangle.
    Quad,
    /// Reserved, cannot be created.
    Cube,
    /// Reserved, cannot be created.
    Sphere,
}

impl LayerKind {
    /// Lowercase name, used in default labels.
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Base => "base",
            LayerKind::Quad => "quad",
            LayerKind::Cube => "cube",
            LayerKind::Sphere => "sphere",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a natively bound layer is masked in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClipMode {
    /// Alpha-only mask, used when the renderer allows it.
    #[default]
    Alpha,
    /// Depth-only mask.
    Depth,
}

/// Host allocation parameters for a composition layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerInit {
    /// Quad layer parameters.
    Quad(QuadLayerInit),
}

/// Renderer-wide rules applied to every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerPolicy {
    /// Native binding allowed at all.
    pub allow_native: bool,
    /// Bound layers use an alpha mask when their clip mode asks for it.
    pub allow_alpha_clip: bool,
    /// Minimum pixel area for native allocation.
    pub min_pixel_area: u64,
}

impl Default for LayerPolicy {
    fn default() -> Self {
        Self::from(&RendererSettings::default())
    }
}

impl From<&RendererSettings> for LayerPolicy {
    fn from(settings: &RendererSettings) -> Self {
        Self {
            allow_native: settings.allow_native_layers,
            allow_alpha_clip: settings.allow_alpha_clip,
            min_pixel_area: settings.min_layer_pixel_area.max(1),
        }
    }
}

/// Host-side state a bound layer talks to during an update.
pub struct NativeContext<'a> {
    /// The session's graphics binding.
    pub binding: &'a mut dyn GraphicsBinding,
    /// Current host frame. `None` outside an immersive tick.
    pub frame: Option<&'a HostFrame>,
}

/// Everything [`CompositionLayer::update`] may touch.
pub struct LayerUpdateContext<'a> {
    /// Graphics context.
    pub gfx: &'a mut dyn GraphicsContext,
    /// Present while an immersive session with layer support is running.
    pub native: Option<NativeContext<'a>>,
}

/// A layer that can be composited natively or emulated in the scene.
pub trait CompositionLayer: Debug + Any {
    /// Shared state.
    fn core(&self) -> &LayerCore;

    /// Shared state, mutably.
    fn core_mut(&mut self) -> &mut LayerCore;

    /// Kind used for host allocation.
    fn kind(&self) -> LayerKind;

    /// Whether size and resolution allow a native layer.
    fn is_valid(&self, policy: &LayerPolicy) -> bool;

    /// Host allocation parameters.
    fn host_init(&self, space: ReferenceSpace) -> LayerInit;

    /// Clip primitive standing in for the layer in the scene.
    fn clip(&self) -> &dyn ClipPrimitive;

    /// Clip primitive, mutably.
    fn clip_mut(&mut self) -> &mut dyn ClipPrimitive;

    /// Applies the current dimensions to the clip primitive.
    fn sync_clip(&mut self);

    /// Pushes the current dimensions to the bound host layer.
    fn push_dimensions(&self, binding: &mut dyn GraphicsBinding, handle: HostLayerHandle);

    /// Copies content into the host images when needed.
    fn upload_content(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        native: &mut NativeContext<'_>,
        handle: HostLayerHandle,
    ) -> XrResult<()>;

    /// Adopts a new texture size as pixel resolution. Returns `true` if it changed.
    fn fit_content_size(&mut self, _width: u32, _height: u32) -> bool {
        false
    }

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// `true` when the next reconciliation should allocate a host layer.
    fn needs_update_native(&self, policy: &LayerPolicy) -> bool {
        let core = self.core();
        policy.allow_native
            && core.use_native
            && (core.native().is_none() || core.reconstruct_requested())
            && self.is_valid(policy)
    }

    /// Binds a host layer, or drops back to emulation with `None`.
    ///
    /// Returns the previously bound handle when it was released. The caller
    /// owns its destruction on the host side. The mask mode and the content
    /// resync are set in the same call so no frame shows a half-switched layer.
    fn bind_layer(
        &mut self,
        handle: Option<HostLayerHandle>,
        policy: &LayerPolicy,
        gfx: &mut dyn GraphicsContext,
    ) -> Option<HostLayerHandle> {
        let core = self.core();
        if handle == core.native() && (!core.reconstruct_requested() || handle.is_none()) {
            return None;
        }

        let released = self.core_mut().release_native(gfx);
        let mode = match handle {
            Some(_) if policy.allow_alpha_clip && self.core().clip_mode == ClipMode::Alpha => {
                MaskMode::Alpha
            }
            Some(_) => MaskMode::Depth,
            None => MaskMode::None,
        };

        self.core_mut().adopt_native(handle);
        self.clip_mut().set_mask_mode(mode);
        // must stay in the depth buffer and in hit tests in every mode
        self.clip_mut().set_visible(true);

        log::debug!(
            "Layer '{}' {} ({:?} mask)",
            self.core().label(),
            if handle.is_some() { "bound natively" } else { "emulated" },
            mode
        );
        released
    }

    /// Per-tick update: texture tracking, clip sync, native transform and content.
    fn update(&mut self, ctx: &mut LayerUpdateContext<'_>) -> XrResult<()> {
        if !self.core().is_rendered() {
            return Ok(());
        }

        if let Some((width, height)) = self.core_mut().poll_texture() {
            if self.fit_content_size(width, height) {
                self.core_mut().mark_dimensions_dirty();
            }
        }

        if self.core().dimensions_dirty() {
            self.sync_clip();
        }
        let texture = self.core().texture().cloned();
        self.clip_mut().set_texture(texture);

        let bound = self.core().native();
        if let (Some(handle), Some(native)) = (bound, ctx.native.as_mut()) {
            let dimensions_dirty = self.core().dimensions_dirty();
            let transform = self.core_mut().native_transform();
            if dimensions_dirty {
                self.push_dimensions(native.binding, handle);
                self.core_mut().request_construct_notify();
            }
            native.binding.set_layer_transform(handle, transform);
            self.upload_content(ctx.gfx, native, handle)?;
        }

        self.core_mut().finish_update();
        Ok(())
    }

    /// Releases every GPU object. Returns the native handle that was bound, if any.
    fn release(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        programs: &mut ProgramCache,
    ) -> Option<HostLayerHandle> {
        let released = self.core_mut().release_native(gfx);
        self.core_mut().set_texture(None);
        self.clip_mut().release(gfx, programs);
        released
    }
}
