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

use std::collections::{BTreeMap, VecDeque};
use strata_core::graphics::{TextureId, Viewport};
use strata_core::host::{
    Eye, HostError, HostEvent, HostFrameRequest, HostLayerHandle, InputSource, InputSourceId,
    QuadDimensions, QuadLayerInit, RenderState, SessionMode, SessionRequest, SubImage, View,
    Visibility,
};
use strata_core::math::{Mat4, Quaternion, RigidTransform, Vec3};

/// Texture ids handed out by the host start here, away from application ids.
const FIRST_HOST_TEXTURE: u32 = 10_000;

/// Interpupillary distance of the default views, in meters.
const DEFAULT_IPD: f32 = 0.064;

/// A host layer as the simulated device sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedLayer {
    /// Handle given to the compositor.
    pub handle: HostLayerHandle,
    /// Allocation parameters, `None` for the projection layer.
    pub quad: Option<QuadLayerInit>,
    /// Framebuffer scale of the projection layer.
    pub scale_factor: f32,
    /// Last pushed placement.
    pub transform: RigidTransform,
    /// Last pushed quad size.
    pub dimensions: Option<QuadDimensions>,
    /// Number of `set_layer_transform` calls.
    pub transform_updates: usize,
    /// Raised at creation and by the script, cleared when an image is acquired.
    pub needs_redraw: bool,
    pub(super) color: BTreeMap<Eye, TextureId>,
    pub(super) depth: Option<TextureId>,
}

impl SimulatedLayer {
    /// `true` for the full-view projection layer.
    pub fn is_projection(&self) -> bool {
        self.quad.is_none()
    }

    /// Color image the host hands out for `eye`.
    pub fn color_texture(&self, eye: Eye) -> Option<TextureId> {
        self.color.get(&eye).copied()
    }
}

#[derive(Debug)]
pub(super) struct HostState {
    pub(super) supported_modes: Vec<SessionMode>,
    pub(super) grant_layers: bool,
    pub(super) reject_next: Option<HostError>,
    pub(super) reject_space: Option<HostError>,
    pub(super) scale_factor: f32,
    pub(super) ignores_depth: bool,
    pub(super) eye_size: (u32, u32),

    pub(super) active_session: Option<u64>,
    pub(super) sessions_granted: u64,
    pub(super) last_request: Option<SessionRequest>,

    pub(super) tracking: bool,
    pub(super) head: RigidTransform,
    pub(super) views: Vec<View>,
    pub(super) events: VecDeque<HostEvent>,
    pub(super) input_sources: Vec<InputSource>,
    pub(super) grips: BTreeMap<InputSourceId, RigidTransform>,
    pub(super) visibility: Visibility,

    pub(super) pending_frame: Option<HostFrameRequest>,
    pub(super) frame_index: u64,

    pub(super) layers: BTreeMap<HostLayerHandle, SimulatedLayer>,
    pub(super) render_states: Vec<RenderState>,
    pub(super) legacy_layers: usize,

    next_id: u64,
    next_texture: u32,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            supported_modes: vec![SessionMode::ImmersiveVr, SessionMode::ImmersiveAr],
            grant_layers: true,
            reject_next: None,
            reject_space: None,
            scale_factor: 1.0,
            ignores_depth: false,
            eye_size: (640, 480),
            active_session: None,
            sessions_granted: 0,
            last_request: None,
            tracking: true,
            head: RigidTransform::new(Vec3::new(0.0, 1.6, 0.0), Quaternion::IDENTITY),
            views: default_views(Vec3::new(0.0, 1.6, 0.0), (640, 480)),
            events: VecDeque::new(),
            input_sources: Vec::new(),
            grips: BTreeMap::new(),
            visibility: Visibility::Visible,
            pending_frame: None,
            frame_index: 0,
            layers: BTreeMap::new(),
            render_states: Vec::new(),
            legacy_layers: 0,
            next_id: 1,
            next_texture: FIRST_HOST_TEXTURE,
        }
    }
}

impl HostState {
    pub(super) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(super) fn next_texture(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }

    pub(super) fn is_current(&self, session: u64) -> bool {
        self.active_session == Some(session)
    }

    pub(super) fn check_current(&self, session: u64) -> Result<(), HostError> {
        if self.is_current(session) {
            Ok(())
        } else {
            Err(HostError::SessionEnded)
        }
    }

    /// Drops everything bound to the running session.
    pub(super) fn teardown(&mut self) {
        if let Some(session) = self.active_session.take() {
            log::debug!("Simulated session {} torn down", session);
        }
        self.layers.clear();
        self.pending_frame = None;
    }

    /// Per-eye viewport inside the side-by-side projection image.
    pub(super) fn eye_viewport(&self, eye: Eye, scale: f32) -> Viewport {
        let width = scaled(self.eye_size.0, scale);
        let height = scaled(self.eye_size.1, scale);
        match eye {
            Eye::None => Viewport::sized(width * 2, height),
            Eye::Left => Viewport::sized(width, height),
            Eye::Right => Viewport {
                x: width as i32,
                y: 0,
                width,
                height,
            },
        }
    }

    pub(super) fn sub_image(&self, layer: &SimulatedLayer, eye: Eye) -> Option<SubImage> {
        match layer.quad {
            None => {
                let full = self.eye_viewport(Eye::None, layer.scale_factor);
                Some(SubImage {
                    color_texture: layer.color_texture(Eye::None)?,
                    depth_stencil_texture: layer.depth,
                    viewport: self.eye_viewport(eye, layer.scale_factor),
                    texture_width: full.width,
                    texture_height: full.height,
                })
            }
            Some(init) => Some(SubImage {
                color_texture: layer.color_texture(eye)?,
                depth_stencil_texture: None,
                viewport: Viewport::sized(init.view_pixel_width, init.view_pixel_height),
                texture_width: init.view_pixel_width,
                texture_height: init.view_pixel_height,
            }),
        }
    }
}

pub(super) fn scaled(size: u32, scale: f32) -> u32 {
    ((size as f32 * scale).round() as u32).max(1)
}

/// Two eyes around `head`, looking down `-Z`.
pub(super) fn default_views(head: Vec3, eye_size: (u32, u32)) -> Vec<View> {
    let aspect = eye_size.0 as f32 / eye_size.1.max(1) as f32;
    let projection = Mat4::perspective_rh_gl(90f32.to_radians(), aspect, 0.1, 100.0);
    [(Eye::Left, -0.5), (Eye::Right, 0.5)]
        .into_iter()
        .map(|(eye, side)| View {
            eye,
            projection,
            transform: RigidTransform::new(
                Vec3::new(head.x + side * DEFAULT_IPD, head.y, head.z),
                Quaternion::IDENTITY,
            ),
        })
        .collect()
}
