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

//! Data exchanged with the immersive host.

use crate::graphics::{FramebufferId, TextureId, Viewport};
use crate::math::{Mat4, RigidTransform};
use serde::{Deserialize, Serialize};

/// Kind of immersive session to negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Fully immersive, opaque display.
    #[default]
    ImmersiveVr,
    /// Immersive with passthrough of the real world.
    ImmersiveAr,
    /// Non-immersive, page-embedded presentation.
    Inline,
}

/// Type of the reference space requested once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSpaceType {
    /// Origin locked to the viewer.
    Viewer,
    /// Origin near the viewer at session start.
    #[default]
    Local,
    /// Like `Local`, with the origin on the floor.
    LocalFloor,
    /// Floor-level space with known boundaries.
    BoundedFloor,
    /// World-scale space without boundaries.
    Unbounded,
}

/// Parameters of a session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRequest {
    /// Session mode.
    pub mode: SessionMode,
    /// Reference space requested after the grant.
    pub reference_space: ReferenceSpaceType,
    /// Features the host must grant or reject the session.
    pub required_features: Vec<String>,
    /// Features the host may grant.
    pub optional_features: Vec<String>,
}

impl Default for SessionRequest {
    fn default() -> Self {
        Self {
            mode: SessionMode::ImmersiveVr,
            reference_space: ReferenceSpaceType::Local,
            required_features: vec!["local".to_owned()],
            optional_features: vec!["layers".to_owned()],
        }
    }
}

/// A reference space granted by the host. Immutable for the session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceSpace {
    /// Host-assigned identifier.
    pub id: u64,
    /// The requested type.
    pub kind: ReferenceSpaceType,
}

/// Opaque handle to a host-side composition layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostLayerHandle(pub u64);

/// Opaque id of a pending host animation-frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostFrameRequest(pub u64);

/// A host frame. Only valid while its animation-frame callback runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostFrame {
    /// Monotonic frame index.
    pub index: u64,
    /// Predicted display time in milliseconds.
    pub time: f64,
}

/// Which eye a view or sub-image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Eye {
    /// Mono content, shared by both eyes.
    #[default]
    None,
    /// Left eye.
    Left,
    /// Right eye.
    Right,
}

/// One rendered view of a viewer pose.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Eye of the view.
    pub eye: Eye,
    /// Projection matrix for this eye.
    pub projection: Mat4,
    /// Eye pose in the reference space.
    pub transform: RigidTransform,
}

/// Viewer pose for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerPose {
    /// Head pose.
    pub transform: RigidTransform,
    /// One entry per eye.
    pub views: Vec<View>,
}

/// A host-owned image to render into for one layer, frame and eye.
///
/// Two sub-images are the same attachment when they compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubImage {
    /// Color image. Writable, never sampleable.
    pub color_texture: TextureId,
    /// Optional depth/stencil image.
    pub depth_stencil_texture: Option<TextureId>,
    /// Region of the image for this eye.
    pub viewport: Viewport,
    /// Full image width.
    pub texture_width: u32,
    /// Full image height.
    pub texture_height: u32,
}

/// Single presentation layer used when the host has no composition-layer support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyLayer {
    /// Host framebuffer, `None` for the default surface.
    pub framebuffer: Option<FramebufferId>,
    /// Framebuffer width in pixels.
    pub framebuffer_width: u32,
    /// Framebuffer height in pixels.
    pub framebuffer_height: u32,
}

/// Stereo arrangement of a layer's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerLayout {
    /// Host decides, treated as mono.
    #[default]
    Default,
    /// Same image for both eyes.
    Mono,
    /// One image per eye.
    Stereo,
    /// Both eyes side by side.
    StereoLeftRight,
    /// Both eyes stacked.
    StereoTopBottom,
}

impl LayerLayout {
    /// `true` for every stereo arrangement.
    pub fn is_stereo(self) -> bool {
        matches!(
            self,
            LayerLayout::Stereo | LayerLayout::StereoLeftRight | LayerLayout::StereoTopBottom
        )
    }
}

/// Parameters for a projection (base) layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionLayerInit {
    /// Framebuffer scale relative to the native resolution.
    pub scale_factor: f32,
}

/// Parameters for a quad layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadLayerInit {
    /// Space the layer transform is expressed in.
    pub space: ReferenceSpace,
    /// Pixel width of one eye image.
    pub view_pixel_width: u32,
    /// Pixel height of one eye image.
    pub view_pixel_height: u32,
    /// Stereo layout.
    pub layout: LayerLayout,
    /// Width in meters.
    pub width: f32,
    /// Height in meters.
    pub height: f32,
    /// Initial placement.
    pub transform: RigidTransform,
}

/// Mutable geometric size of a quad layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadDimensions {
    /// Width in meters.
    pub width: f32,
    /// Height in meters.
    pub height: f32,
}

/// The set of layers the host composites, bottom first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    /// Composition layers in order.
    Layers(Vec<HostLayerHandle>),
    /// The single legacy base layer.
    LegacyBase,
}

/// Visibility of the immersive content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Fully visible.
    #[default]
    Visible,
    /// Visible behind a system overlay.
    VisibleBlurred,
    /// Not shown.
    Hidden,
}

/// Host-assigned input source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputSourceId(pub u32);

/// Hand an input source is held in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Handedness {
    /// Not associated with a hand.
    #[default]
    None,
    /// Left hand.
    Left,
    /// Right hand.
    Right,
}

/// An input device known to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputSource {
    /// Identifier.
    pub id: InputSourceId,
    /// Hand.
    pub handedness: Handedness,
    /// Whether the source exposes a grip pose.
    pub has_grip: bool,
}

/// Raw events queued by the host session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The host ended the session.
    End,
    /// Input sources were added or removed.
    InputSourcesChanged,
    /// Visibility changed.
    VisibilityChanged(Visibility),
}
