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

//! Flat rectangular composition layer.

use super::{CompositionLayer, LayerCore, LayerInit, LayerKind, LayerPolicy, NativeContext};
use crate::clip::{ClipPrimitive, QuadClip};
use crate::error::XrResult;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::rc::Rc;
use strata_core::graphics::{ContentTexture, GraphicsContext};
use strata_core::host::{
    Eye, GraphicsBinding, HostLayerHandle, LayerLayout, QuadDimensions, QuadLayerInit,
    ReferenceSpace,
};

const MONO_EYES: [Eye; 1] = [Eye::None];
const STEREO_EYES: [Eye; 2] = [Eye::Left, Eye::Right];

/// Size and resolution of a quad layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadLayerOptions {
    /// Width in meters.
    pub width: f32,
    /// Height in meters.
    pub height: f32,
    /// Pixel width of one eye image.
    pub view_pixel_width: u32,
    /// Pixel height of one eye image.
    pub view_pixel_height: u32,
    /// Stereo layout of the content.
    pub layout: LayerLayout,
}

impl Default for QuadLayerOptions {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            view_pixel_width: 100,
            view_pixel_height: 100,
            layout: LayerLayout::Mono,
        }
    }
}

/// A rectangle of `width` x `height` meters showing a content texture.
#[derive(Debug)]
pub struct QuadLayer {
    core: LayerCore,
    options: QuadLayerOptions,
    clip: QuadClip,
}

impl QuadLayer {
    /// Creates an unregistered quad layer.
    pub fn new(options: QuadLayerOptions) -> Self {
        Self {
            core: LayerCore::default(),
            clip: QuadClip::new(options.width, options.height, options.layout),
            options,
        }
    }

    /// Current options.
    pub fn options(&self) -> &QuadLayerOptions {
        &self.options
    }

    /// Width in meters.
    pub fn width(&self) -> f32 {
        self.options.width
    }

    /// Sets the width in meters.
    pub fn set_width(&mut self, width: f32) {
        if width != self.options.width {
            self.options.width = width;
            self.core.mark_dimensions_dirty();
        }
    }

    /// Height in meters.
    pub fn height(&self) -> f32 {
        self.options.height
    }

    /// Sets the height in meters.
    pub fn set_height(&mut self, height: f32) {
        if height != self.options.height {
            self.options.height = height;
            self.core.mark_dimensions_dirty();
        }
    }

    /// Sets the per-eye pixel resolution. The host layer is rebuilt since its
    /// images cannot be resized.
    pub fn set_view_pixel_size(&mut self, width: u32, height: u32) {
        if (width, height) == (self.options.view_pixel_width, self.options.view_pixel_height) {
            return;
        }
        self.options.view_pixel_width = width;
        self.options.view_pixel_height = height;
        self.core.mark_dimensions_dirty();
        if self.core.is_native() {
            self.core.request_reconstruct();
        }
    }

    /// Sets the stereo layout, rebuilding the host layer when bound.
    pub fn set_layout(&mut self, layout: LayerLayout) {
        if layout == self.options.layout {
            return;
        }
        self.options.layout = layout;
        self.core.mark_dimensions_dirty();
        if self.core.is_native() {
            self.core.request_reconstruct();
        }
    }

    /// Content texture.
    pub fn texture(&self) -> Option<&Rc<ContentTexture>> {
        self.core.texture()
    }

    /// Replaces the content texture.
    pub fn set_texture(&mut self, texture: Option<Rc<ContentTexture>>) {
        self.core.set_texture(texture);
    }

    fn eyes(&self) -> &'static [Eye] {
        if self.options.layout.is_stereo() {
            &STEREO_EYES
        } else {
            &MONO_EYES
        }
    }
}

impl CompositionLayer for QuadLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Quad
    }

    fn is_valid(&self, policy: &LayerPolicy) -> bool {
        let area = self.options.width * self.options.height;
        let pixels =
            u64::from(self.options.view_pixel_width) * u64::from(self.options.view_pixel_height);
        area.is_finite() && area > 0.0 && pixels >= policy.min_pixel_area.max(1)
    }

    fn host_init(&self, space: ReferenceSpace) -> LayerInit {
        LayerInit::Quad(QuadLayerInit {
            space,
            view_pixel_width: self.options.view_pixel_width,
            view_pixel_height: self.options.view_pixel_height,
            layout: self.options.layout,
            width: self.options.width,
            height: self.options.height,
            transform: strata_core::math::RigidTransform::from_matrix(self.core.world_matrix()),
        })
    }

    fn clip(&self) -> &dyn ClipPrimitive {
        &self.clip
    }

    fn clip_mut(&mut self) -> &mut dyn ClipPrimitive {
        &mut self.clip
    }

    fn sync_clip(&mut self) {
        self.clip
            .apply(self.options.width, self.options.height, self.options.layout);
    }

    fn push_dimensions(&self, binding: &mut dyn GraphicsBinding, handle: HostLayerHandle) {
        binding.set_quad_dimensions(
            handle,
            QuadDimensions {
                width: self.options.width,
                height: self.options.height,
            },
        );
    }

    fn upload_content(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        native: &mut NativeContext<'_>,
        handle: HostLayerHandle,
    ) -> XrResult<()> {
        if !(native.binding.needs_redraw(handle) || self.core.content_dirty()) {
            return Ok(());
        }
        let (Some(frame), Some(texture)) = (native.frame, self.core.texture().cloned()) else {
            return Ok(());
        };

        let mut copied = true;
        for &eye in self.eyes() {
            let Some(sub_image) = native.binding.sub_image(handle, frame, eye) else {
                log::warn!("No {:?} sub-image for layer '{}'", eye, self.core.label());
                copied = false;
                continue;
            };
            let target = self.core.target_for(gfx, eye)?;
            target.attach(gfx, sub_image, false)?;
            copied &= target.copy_from(gfx, &texture)?;
        }

        if copied {
            self.core.clear_content_dirty();
        }
        Ok(())
    }

    fn fit_content_size(&mut self, width: u32, height: u32) -> bool {
        let changed =
            (width, height) != (self.options.view_pixel_width, self.options.view_pixel_height);
        if changed {
            self.set_view_pixel_size(width, height);
        }
        changed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_one_meter_hundred_pixels() {
        let layer = QuadLayer::new(QuadLayerOptions::default());
        assert_eq!(layer.width(), 1.0);
        assert_eq!(layer.options().view_pixel_width, 100);
        assert!(layer.is_valid(&LayerPolicy::default()));
    }

    #[test]
    fn test_zero_size_is_never_valid() {
        let policy = LayerPolicy::default();
        let mut layer = QuadLayer::new(QuadLayerOptions::default());
        layer.set_width(0.0);
        assert!(!layer.is_valid(&policy));
        assert!(!layer.needs_update_native(&policy));

        layer.set_width(1.0);
        layer.set_view_pixel_size(0, 100);
        assert!(!layer.is_valid(&policy));
    }

    #[test]
    fn test_min_pixel_area_gates_native_allocation() {
        let policy = LayerPolicy {
            min_pixel_area: 256 * 256,
            ..LayerPolicy::default()
        };
        let mut layer = QuadLayer::new(QuadLayerOptions::default());
        assert!(!layer.needs_update_native(&policy));
        layer.set_view_pixel_size(256, 256);
        assert!(layer.needs_update_native(&policy));
    }

    #[test]
    fn test_stereo_layout_copies_per_eye() {
        let mut layer = QuadLayer::new(QuadLayerOptions::default());
        assert_eq!(layer.eyes(), &[Eye::None]);
        layer.set_layout(LayerLayout::StereoLeftRight);
        assert_eq!(layer.eyes(), &[Eye::Left, Eye::Right]);
    }
}
