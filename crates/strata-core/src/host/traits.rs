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

//! Contracts implemented by immersive-host backends.

use super::error::HostError;
use super::types::*;
use crate::graphics::Viewport;
use crate::math::RigidTransform;
use async_trait::async_trait;
use std::fmt::Debug;

/// Entry point of an immersive runtime.
#[async_trait(?Send)]
pub trait XrHost: Debug {
    /// Returns `true` if `mode` can be requested on this device.
    fn is_session_supported(&self, mode: SessionMode) -> bool;

    /// Negotiates a new session. Suspends until the host grants or rejects it.
    /// ## Errors
    /// * `HostError` - If the mode is unsupported or a required feature is refused.
    async fn request_session(
        &mut self,
        request: &SessionRequest,
    ) -> Result<Box<dyn HostSession>, HostError>;
}

/// A granted immersive session.
#[async_trait(?Send)]
pub trait HostSession: Debug {
    /// Whether the granted render state accepts composition layers.
    fn supports_layers(&self) -> bool;

    /// Native framebuffer scale factor for base/projection layers.
    fn native_framebuffer_scale_factor(&self) -> f32;

    /// Requests the session reference space.
    async fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceType,
    ) -> Result<ReferenceSpace, HostError>;

    /// Pops the next queued lifecycle or input event.
    fn poll_event(&mut self) -> Option<HostEvent>;

    /// Arms the host frame loop for one frame.
    fn request_animation_frame(&mut self) -> Result<HostFrameRequest, HostError>;

    /// Disarms a pending frame request. Unknown ids are ignored.
    fn cancel_animation_frame(&mut self, request: HostFrameRequest);

    /// Viewer pose for `frame`, or `None` when tracking is lost.
    fn viewer_pose(&self, frame: &HostFrame, space: &ReferenceSpace) -> Option<ViewerPose>;

    /// Grip pose of an input source for `frame`.
    fn grip_pose(
        &self,
        frame: &HostFrame,
        source: InputSourceId,
        space: &ReferenceSpace,
    ) -> Option<RigidTransform>;

    /// Currently connected input sources.
    fn input_sources(&self) -> Vec<InputSource>;

    /// Current visibility.
    fn visibility(&self) -> Visibility;

    /// Creates the single presentation layer used without composition-layer support.
    fn create_legacy_layer(&mut self, scale_factor: f32) -> Result<LegacyLayer, HostError>;

    /// Per-eye viewport of the legacy layer.
    fn legacy_viewport(&self, eye: Eye) -> Option<Viewport>;

    /// Creates the graphics binding used to allocate composition layers.
    fn create_graphics_binding(&mut self) -> Result<Box<dyn GraphicsBinding>, HostError>;

    /// Replaces the set of layers the host composites.
    fn update_render_state(&mut self, state: RenderState) -> Result<(), HostError>;

    /// Ends the session.
    fn end(&mut self) -> Result<(), HostError>;
}

/// Allocates and drives host composition layers for one graphics context.
pub trait GraphicsBinding: Debug {
    /// Allocates the full-view projection layer.
    fn create_projection_layer(
        &mut self,
        init: &ProjectionLayerInit,
    ) -> Result<HostLayerHandle, HostError>;

    /// Allocates a quad layer.
    fn create_quad_layer(&mut self, init: &QuadLayerInit) -> Result<HostLayerHandle, HostError>;

    /// Releases a layer. Unknown handles are ignored.
    fn destroy_layer(&mut self, layer: HostLayerHandle);

    /// Image to render into for `layer` during `frame`. Projection layers are
    /// queried per view eye, quad layers with `Eye::None` or per eye for stereo.
    fn sub_image(&self, layer: HostLayerHandle, frame: &HostFrame, eye: Eye) -> Option<SubImage>;

    /// Moves a layer.
    fn set_layer_transform(&mut self, layer: HostLayerHandle, transform: RigidTransform);

    /// Resizes a quad layer.
    fn set_quad_dimensions(&mut self, layer: HostLayerHandle, dimensions: QuadDimensions);

    /// `true` when the host lost the layer content and wants it redrawn.
    fn needs_redraw(&self, layer: HostLayerHandle) -> bool;

    /// `true` when the host ignores the layer depth values.
    fn ignores_depth_values(&self, layer: HostLayerHandle) -> bool;
}
