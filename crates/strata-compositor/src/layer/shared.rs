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

use super::{ClipMode, LayerId, LayerKind};
use crate::render_target::RenderTarget;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use strata_core::graphics::{ContentTexture, GraphicsContext, ResourceError};
use strata_core::host::{Eye, HostLayerHandle};
use strata_core::math::{Mat4, Quaternion, RigidTransform, Vec3};
use strata_core::scene::NodeId;

/// Callback fired after a layer was (re)constructed or resized.
pub struct ConstructHook(Box<dyn FnMut(LayerId)>);

impl ConstructHook {
    /// Wraps a closure.
    pub fn new(hook: impl FnMut(LayerId) + 'static) -> Self {
        Self(Box::new(hook))
    }
}

impl fmt::Debug for ConstructHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConstructHook")
    }
}

/// State shared by every composition layer kind.
#[derive(Debug)]
pub struct LayerCore {
    id: Option<LayerId>,
    label: String,

    /// Hidden layers are neither updated nor drawn.
    pub visible: bool,
    /// Cleared to freeze a layer without hiding it.
    pub will_render: bool,
    /// Opt-in for native composition.
    pub use_native: bool,
    /// Preferred mask while bound.
    pub clip_mode: ClipMode,
    /// Adopt the texture size as pixel resolution.
    pub use_content_size: bool,

    /// Local position, relative to `parent`.
    pub position: Vec3,
    /// Local orientation, relative to `parent`.
    pub rotation: Quaternion,
    /// Scene node the layer follows.
    pub parent: Option<NodeId>,
    world: Mat4,
    parent_rendered: bool,

    // --- Dirty Tracking ---
    content_dirty: bool,
    dimensions_dirty: bool,
    transform_dirty: bool,
    reconstruct: bool,
    construct_pending: bool,

    // --- Native Binding ---
    native: Option<HostLayerHandle>,
    native_transform: Option<RigidTransform>,
    targets: BTreeMap<Eye, RenderTarget>,

    texture: Option<Rc<ContentTexture>>,
    seen_revision: u64,
    on_construct: Option<ConstructHook>,
}

impl Default for LayerCore {
    fn default() -> Self {
        Self {
            id: None,
            label: String::new(),
            visible: true,
            will_render: true,
            use_native: true,
            clip_mode: ClipMode::default(),
            use_content_size: false,
            position: Vec3::ZERO,
            rotation: Quaternion::IDENTITY,
            parent: None,
            world: Mat4::IDENTITY,
            parent_rendered: true,
            content_dirty: false,
            dimensions_dirty: true,
            transform_dirty: true,
            reconstruct: false,
            construct_pending: false,
            native: None,
            native_transform: None,
            targets: BTreeMap::new(),
            texture: None,
            seen_revision: 0,
            on_construct: None,
        }
    }
}

impl LayerCore {
    /// Registry id, `None` until registered.
    pub fn id(&self) -> Option<LayerId> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: LayerId, kind: LayerKind) {
        self.id = Some(id);
        if self.label.is_empty() {
            self.label = format!("layer_{}_{}", id.0, kind);
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replaces the label.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Transform relative to the parent node.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::ONE, self.rotation, self.position)
    }

    /// Last world transform handed to [`LayerCore::set_world_matrix`].
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Visible, scheduled and not under an excluded scene subtree.
    pub fn is_rendered(&self) -> bool {
        self.visible && self.will_render && self.parent_rendered
    }

    pub(crate) fn set_parent_rendered(&mut self, rendered: bool) {
        self.parent_rendered = rendered;
    }

    /// Stores the world transform, flagging a native transform push on change.
    pub fn set_world_matrix(&mut self, world: Mat4) {
        if world != self.world {
            self.world = world;
            self.transform_dirty = true;
        }
    }

    /// Bound host layer.
    pub fn native(&self) -> Option<HostLayerHandle> {
        self.native
    }

    /// `true` while a host layer is bound.
    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }

    /// Asks for a new host layer at the next reconciliation.
    pub fn request_reconstruct(&mut self) {
        self.reconstruct = true;
    }

    /// Whether a reconstruction is pending.
    pub fn reconstruct_requested(&self) -> bool {
        self.reconstruct
    }

    /// Content texture.
    pub fn texture(&self) -> Option<&Rc<ContentTexture>> {
        self.texture.as_ref()
    }

    /// Replaces the content texture. A different texture forces a copy.
    pub fn set_texture(&mut self, texture: Option<Rc<ContentTexture>>) {
        let changed = match (&self.texture, &texture) {
            (Some(old), Some(new)) => !Rc::ptr_eq(old, new),
            (None, None) => false,
            _ => true,
        };
        if !changed {
            return;
        }
        self.seen_revision = texture.as_ref().map_or(0, |t| t.revision());
        self.texture = texture;
        self.content_dirty = true;
        self.construct_pending = true;
    }

    /// Content needs to reach the host images.
    pub fn content_dirty(&self) -> bool {
        self.content_dirty
    }

    /// Forces a content copy at the next update.
    pub fn mark_content_dirty(&mut self) {
        self.content_dirty = true;
    }

    pub(crate) fn clear_content_dirty(&mut self) {
        self.content_dirty = false;
    }

    /// Size or resolution changed since the last update.
    pub fn dimensions_dirty(&self) -> bool {
        self.dimensions_dirty
    }

    /// Flags a size or resolution change.
    pub fn mark_dimensions_dirty(&mut self) {
        self.dimensions_dirty = true;
    }

    /// Registers the construct callback.
    pub fn set_on_construct(&mut self, hook: impl FnMut(LayerId) + 'static) {
        self.on_construct = Some(ConstructHook::new(hook));
    }

    /// Number of per-eye render targets currently allocated.
    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Picks up new texture revisions. Returns the texture size when the
    /// layer follows it.
    pub(crate) fn poll_texture(&mut self) -> Option<(u32, u32)> {
        let texture = self.texture.as_ref()?;
        let revision = texture.revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.content_dirty = true;
        }
        (self.use_content_size && texture.is_ready()).then(|| (texture.width(), texture.height()))
    }

    /// Native transform, recomputed from the world matrix when dirty.
    pub(crate) fn native_transform(&mut self) -> RigidTransform {
        match self.native_transform {
            Some(transform) if !self.transform_dirty => transform,
            _ => {
                let transform = RigidTransform::from_matrix(&self.world);
                self.native_transform = Some(transform);
                self.transform_dirty = false;
                transform
            }
        }
    }

    /// Render target for one eye, created on first use.
    pub(crate) fn target_for(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        eye: Eye,
    ) -> Result<&mut RenderTarget, ResourceError> {
        if !self.targets.contains_key(&eye) {
            let target = RenderTarget::new(gfx)?;
            self.targets.insert(eye, target);
        }
        self.targets
            .get_mut(&eye)
            .ok_or(ResourceError::NotFound)
    }

    /// Drops the native binding and its render targets.
    pub(crate) fn release_native(&mut self, gfx: &mut dyn GraphicsContext) -> Option<HostLayerHandle> {
        for (_, mut target) in std::mem::take(&mut self.targets) {
            target.destroy(gfx);
        }
        self.native_transform = None;
        let released = self.native.take();
        if released.is_some() {
            // the clip takes over drawing again
            self.dimensions_dirty = true;
        }
        released
    }

    pub(crate) fn adopt_native(&mut self, handle: Option<HostLayerHandle>) {
        self.native = handle;
        self.reconstruct = false;
        self.content_dirty = true;
        self.construct_pending = true;
        self.transform_dirty = handle.is_some();
    }

    pub(crate) fn request_construct_notify(&mut self) {
        self.construct_pending = true;
    }

    pub(crate) fn finish_update(&mut self) {
        self.dimensions_dirty = false;
        if !self.construct_pending {
            return;
        }
        self.construct_pending = false;
        if let (Some(id), Some(hook)) = (self.id, self.on_construct.as_mut()) {
            (hook.0)(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::graphics::TextureId;

    #[test]
    fn test_default_label_uses_id_and_kind() {
        let mut core = LayerCore::default();
        core.assign_id(LayerId(4), LayerKind::Quad);
        assert_eq!(core.label(), "layer_4_quad");

        let mut named = LayerCore::default();
        named.set_label("hud");
        named.assign_id(LayerId(5), LayerKind::Quad);
        assert_eq!(named.label(), "hud");
    }

    #[test]
    fn test_texture_revisions_coalesce_into_one_dirty_flag() {
        let mut core = LayerCore::default();
        let texture = Rc::new(ContentTexture::new(TextureId(1), 8, 8));
        core.set_texture(Some(texture.clone()));
        assert!(core.content_dirty());

        core.content_dirty = false;
        texture.mark_updated();
        texture.mark_updated();
        core.poll_texture();
        assert!(core.content_dirty());

        core.content_dirty = false;
        core.poll_texture();
        assert!(!core.content_dirty(), "no new revision since the last poll");
    }

    #[test]
    fn test_same_texture_is_not_a_change() {
        let mut core = LayerCore::default();
        let texture = Rc::new(ContentTexture::new(TextureId(1), 8, 8));
        core.set_texture(Some(texture.clone()));
        core.content_dirty = false;
        core.set_texture(Some(texture));
        assert!(!core.content_dirty());
    }

    #[test]
    fn test_world_change_dirties_native_transform() {
        let mut core = LayerCore::default();
        let first = core.native_transform();
        assert_eq!(first, RigidTransform::default());

        core.set_world_matrix(Mat4::from_translation(Vec3::new(0.0, 1.0, -2.0)));
        assert_eq!(core.native_transform().position, Vec3::new(0.0, 1.0, -2.0));
    }
}
