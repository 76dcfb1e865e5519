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

//! [`XrHost`], [`HostSession`] and [`GraphicsBinding`] over the shared simulated state.

use super::handle::SimulatedHostHandle;
use super::state::{scaled, HostState, SimulatedLayer};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use strata_core::graphics::Viewport;
use strata_core::host::{
    Eye, GraphicsBinding, HostError, HostEvent, HostFrame, HostFrameRequest, HostLayerHandle,
    HostSession, InputSource, InputSourceId, LegacyLayer, ProjectionLayerInit, QuadDimensions,
    QuadLayerInit, ReferenceSpace, ReferenceSpaceType, RenderState, SessionMode, SessionRequest,
    SubImage, ViewerPose, Visibility, XrHost,
};
use strata_core::math::RigidTransform;

const LAYERS_FEATURE: &str = "layers";

/// The host given to the compositor.
#[derive(Debug)]
pub struct SimulatedHost {
    state: Rc<RefCell<HostState>>,
}

impl SimulatedHost {
    /// A device that supports VR and AR sessions with composition layers.
    pub fn new() -> (Self, SimulatedHostHandle) {
        let state = Rc::new(RefCell::new(HostState::default()));
        let handle = SimulatedHostHandle::new(Rc::clone(&state));
        (Self { state }, handle)
    }
}

#[async_trait(?Send)]
impl XrHost for SimulatedHost {
    fn is_session_supported(&self, mode: SessionMode) -> bool {
        self.state.borrow().supported_modes.contains(&mode)
    }

    async fn request_session(
        &mut self,
        request: &SessionRequest,
    ) -> Result<Box<dyn HostSession>, HostError> {
        let mut state = self.state.borrow_mut();
        state.last_request = Some(request.clone());

        if !state.supported_modes.contains(&request.mode) {
            return Err(HostError::NotSupported(format!("{:?}", request.mode)));
        }
        if let Some(err) = state.reject_next.take() {
            log::debug!("Simulated host rejects the session: {}", err);
            return Err(err);
        }
        if state.active_session.is_some() {
            return Err(HostError::Rejected("a session is already running".to_owned()));
        }

        let wants_layers = request
            .required_features
            .iter()
            .chain(&request.optional_features)
            .any(|feature| feature == LAYERS_FEATURE);
        let layers_required = request
            .required_features
            .iter()
            .any(|feature| feature == LAYERS_FEATURE);
        if layers_required && !state.grant_layers {
            return Err(HostError::Rejected(format!(
                "required feature '{LAYERS_FEATURE}' is unavailable"
            )));
        }

        let id = state.next_id();
        state.active_session = Some(id);
        state.sessions_granted += 1;
        state.events.clear();
        state.pending_frame = None;
        let supports_layers = wants_layers && state.grant_layers;
        log::info!(
            "Simulated {:?} session {} granted (layers: {})",
            request.mode,
            id,
            supports_layers
        );

        Ok(Box::new(SimulatedSession {
            id,
            supports_layers,
            state: Rc::clone(&self.state),
        }))
    }
}

/// A granted session. Stops answering once ended.
#[derive(Debug)]
struct SimulatedSession {
    id: u64,
    supports_layers: bool,
    state: Rc<RefCell<HostState>>,
}

#[async_trait(?Send)]
impl HostSession for SimulatedSession {
    fn supports_layers(&self) -> bool {
        self.supports_layers
    }

    fn native_framebuffer_scale_factor(&self) -> f32 {
        self.state.borrow().scale_factor
    }

    async fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceType,
    ) -> Result<ReferenceSpace, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_current(self.id)?;
        if let Some(err) = state.reject_space.take() {
            return Err(err);
        }
        Ok(ReferenceSpace {
            id: state.next_id(),
            kind,
        })
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        self.state.borrow_mut().events.pop_front()
    }

    fn request_animation_frame(&mut self) -> Result<HostFrameRequest, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_current(self.id)?;
        let request = HostFrameRequest(state.next_id());
        state.pending_frame = Some(request);
        Ok(request)
    }

    fn cancel_animation_frame(&mut self, request: HostFrameRequest) {
        let mut state = self.state.borrow_mut();
        if state.pending_frame == Some(request) {
            state.pending_frame = None;
        }
    }

    fn viewer_pose(&self, _frame: &HostFrame, _space: &ReferenceSpace) -> Option<ViewerPose> {
        let state = self.state.borrow();
        if !state.is_current(self.id) || !state.tracking {
            return None;
        }
        Some(ViewerPose {
            transform: state.head,
            views: state.views.clone(),
        })
    }

    fn grip_pose(
        &self,
        _frame: &HostFrame,
        source: InputSourceId,
        _space: &ReferenceSpace,
    ) -> Option<RigidTransform> {
        let state = self.state.borrow();
        let tracked = state
            .input_sources
            .iter()
            .any(|s| s.id == source && s.has_grip);
        if !state.is_current(self.id) || !tracked {
            return None;
        }
        state.grips.get(&source).copied()
    }

    fn input_sources(&self) -> Vec<InputSource> {
        self.state.borrow().input_sources.clone()
    }

    fn visibility(&self) -> Visibility {
        self.state.borrow().visibility
    }

    fn create_legacy_layer(&mut self, scale_factor: f32) -> Result<LegacyLayer, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_current(self.id)?;
        state.legacy_layers += 1;
        let (width, height) = state.eye_size;
        Ok(LegacyLayer {
            framebuffer: None,
            framebuffer_width: scaled(width, scale_factor) * 2,
            framebuffer_height: scaled(height, scale_factor),
        })
    }

    fn legacy_viewport(&self, eye: Eye) -> Option<Viewport> {
        let state = self.state.borrow();
        if !state.is_current(self.id) {
            return None;
        }
        Some(state.eye_viewport(eye, state.scale_factor))
    }

    fn create_graphics_binding(&mut self) -> Result<Box<dyn GraphicsBinding>, HostError> {
        self.state.borrow().check_current(self.id)?;
        if !self.supports_layers {
            return Err(HostError::NotSupported(LAYERS_FEATURE.to_owned()));
        }
        Ok(Box::new(SimulatedBinding {
            session: self.id,
            state: Rc::clone(&self.state),
        }))
    }

    fn update_render_state(&mut self, render_state: RenderState) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state.check_current(self.id)?;
        if let RenderState::Layers(layers) = &render_state {
            if let Some(unknown) = layers.iter().find(|h| !state.layers.contains_key(h)) {
                return Err(HostError::UnknownLayer(unknown.0));
            }
        }
        log::debug!("Simulated render state: {:?}", render_state);
        state.render_states.push(render_state);
        Ok(())
    }

    fn end(&mut self) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state.check_current(self.id)?;
        state.teardown();
        log::info!("Simulated session {} ended by the application", self.id);
        Ok(())
    }
}

/// Layer allocation for one session.
#[derive(Debug)]
struct SimulatedBinding {
    session: u64,
    state: Rc<RefCell<HostState>>,
}

impl SimulatedBinding {
    fn insert(
        &self,
        quad: Option<QuadLayerInit>,
        scale_factor: f32,
    ) -> Result<HostLayerHandle, HostError> {
        let mut state = self.state.borrow_mut();
        state.check_current(self.session)?;

        let handle = HostLayerHandle(state.next_id());
        let mut color = BTreeMap::new();
        let mut depth = None;
        match quad {
            None => {
                color.insert(Eye::None, state.next_texture());
                depth = Some(state.next_texture());
            }
            Some(init) if init.layout.is_stereo() => {
                color.insert(Eye::Left, state.next_texture());
                color.insert(Eye::Right, state.next_texture());
            }
            Some(_) => {
                color.insert(Eye::None, state.next_texture());
            }
        }

        let layer = SimulatedLayer {
            handle,
            quad,
            scale_factor,
            transform: quad.map(|init| init.transform).unwrap_or_default(),
            dimensions: quad.map(|init| QuadDimensions {
                width: init.width,
                height: init.height,
            }),
            transform_updates: 0,
            needs_redraw: true,
            color,
            depth,
        };
        state.layers.insert(handle, layer);
        Ok(handle)
    }
}

impl GraphicsBinding for SimulatedBinding {
    fn create_projection_layer(
        &mut self,
        init: &ProjectionLayerInit,
    ) -> Result<HostLayerHandle, HostError> {
        self.insert(None, init.scale_factor)
    }

    fn create_quad_layer(&mut self, init: &QuadLayerInit) -> Result<HostLayerHandle, HostError> {
        if init.view_pixel_width == 0 || init.view_pixel_height == 0 {
            return Err(HostError::Rejected("quad layers need a pixel size".to_owned()));
        }
        self.insert(Some(*init), 1.0)
    }

    fn destroy_layer(&mut self, layer: HostLayerHandle) {
        self.state.borrow_mut().layers.remove(&layer);
    }

    fn sub_image(&self, layer: HostLayerHandle, _frame: &HostFrame, eye: Eye) -> Option<SubImage> {
        let mut state = self.state.borrow_mut();
        if !state.is_current(self.session) {
            return None;
        }
        let image = state
            .layers
            .get(&layer)
            .and_then(|simulated| state.sub_image(simulated, eye))?;
        if let Some(simulated) = state.layers.get_mut(&layer) {
            simulated.needs_redraw = false;
        }
        Some(image)
    }

    fn set_layer_transform(&mut self, layer: HostLayerHandle, transform: RigidTransform) {
        if let Some(simulated) = self.state.borrow_mut().layers.get_mut(&layer) {
            simulated.transform = transform;
            simulated.transform_updates += 1;
        }
    }

    fn set_quad_dimensions(&mut self, layer: HostLayerHandle, dimensions: QuadDimensions) {
        if let Some(simulated) = self.state.borrow_mut().layers.get_mut(&layer) {
            if simulated.quad.is_some() {
                simulated.dimensions = Some(dimensions);
            }
        }
    }

    fn needs_redraw(&self, layer: HostLayerHandle) -> bool {
        self.state
            .borrow()
            .layers
            .get(&layer)
            .is_some_and(|simulated| simulated.needs_redraw)
    }

    fn ignores_depth_values(&self, layer: HostLayerHandle) -> bool {
        let state = self.state.borrow();
        state.ignores_depth && state.layers.contains_key(&layer)
    }
}
