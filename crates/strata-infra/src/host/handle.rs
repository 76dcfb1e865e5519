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

//! Script and observation side of the simulated host.

use super::state::{default_views, HostState, SimulatedLayer};
use std::cell::RefCell;
use std::rc::Rc;
use strata_core::host::{
    HostError, HostEvent, HostFrame, HostFrameRequest, HostLayerHandle, InputSource,
    InputSourceId, RenderState, SessionMode, SessionRequest, View, Visibility,
};
use strata_core::math::RigidTransform;
use strata_core::platform::FrameSignal;

/// Drives a [`SimulatedHost`](super::SimulatedHost) from the outside.
///
/// Every setter takes effect immediately, including for a running session,
/// except the layer grant which is decided when a session is granted.
#[derive(Debug, Clone)]
pub struct SimulatedHostHandle {
    state: Rc<RefCell<HostState>>,
}

impl SimulatedHostHandle {
    pub(super) fn new(state: Rc<RefCell<HostState>>) -> Self {
        Self { state }
    }

    // --- Negotiation ---

    /// Whether future sessions may grant the `layers` feature.
    pub fn grant_layers(&self, grant: bool) {
        self.state.borrow_mut().grant_layers = grant;
    }

    /// Session modes the device accepts.
    pub fn set_supported_modes(&self, modes: Vec<SessionMode>) {
        self.state.borrow_mut().supported_modes = modes;
    }

    /// Fails the next session request with `err`.
    pub fn reject_next_session(&self, err: HostError) {
        self.state.borrow_mut().reject_next = Some(err);
    }

    /// Fails the next reference space request with `err`.
    pub fn reject_next_reference_space(&self, err: HostError) {
        self.state.borrow_mut().reject_space = Some(err);
    }

    /// Native framebuffer scale factor reported to new sessions.
    pub fn set_scale_factor(&self, scale: f32) {
        self.state.borrow_mut().scale_factor = scale;
    }

    /// Whether layers report that their depth values are ignored.
    pub fn set_ignores_depth(&self, ignores: bool) {
        self.state.borrow_mut().ignores_depth = ignores;
    }

    /// The request of the last negotiation attempt.
    pub fn last_request(&self) -> Option<SessionRequest> {
        self.state.borrow().last_request.clone()
    }

    /// Number of sessions granted so far.
    pub fn sessions_granted(&self) -> u64 {
        self.state.borrow().sessions_granted
    }

    /// `true` while a granted session has not ended.
    pub fn is_session_active(&self) -> bool {
        self.state.borrow().active_session.is_some()
    }

    // --- Lifecycle events ---

    /// Ends the session from the device side, as if the user took the headset off.
    ///
    /// Host layers and the pending frame are dropped at once; the compositor
    /// learns about it from the queued [`HostEvent::End`].
    pub fn end_session(&self) {
        let mut state = self.state.borrow_mut();
        if state.active_session.is_none() {
            return;
        }
        state.teardown();
        state.events.push_back(HostEvent::End);
        log::info!("Simulated session ended by the device");
    }

    /// Replaces the connected input sources and queues a change event.
    pub fn set_input_sources(&self, sources: Vec<InputSource>) {
        let mut state = self.state.borrow_mut();
        state.input_sources = sources;
        if state.active_session.is_some() {
            state.events.push_back(HostEvent::InputSourcesChanged);
        }
    }

    /// Sets or clears the grip pose of an input source.
    pub fn set_grip_pose(&self, source: InputSourceId, pose: Option<RigidTransform>) {
        let mut state = self.state.borrow_mut();
        match pose {
            Some(pose) => state.grips.insert(source, pose),
            None => state.grips.remove(&source),
        };
    }

    /// Changes visibility and queues a change event.
    pub fn set_visibility(&self, visibility: Visibility) {
        let mut state = self.state.borrow_mut();
        state.visibility = visibility;
        if state.active_session.is_some() {
            state.events.push_back(HostEvent::VisibilityChanged(visibility));
        }
    }

    /// Queues a raw event.
    pub fn push_event(&self, event: HostEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    // --- Tracking ---

    /// Loses or regains head tracking. Viewer poses are `None` while lost.
    pub fn set_tracking(&self, tracking: bool) {
        self.state.borrow_mut().tracking = tracking;
    }

    /// Moves the head; the default eye views follow.
    pub fn set_head(&self, head: RigidTransform) {
        let mut state = self.state.borrow_mut();
        state.head = head;
        state.views = default_views(head.position, state.eye_size);
    }

    /// Replaces the rendered views.
    pub fn set_views(&self, views: Vec<View>) {
        self.state.borrow_mut().views = views;
    }

    /// Per-eye image size of projection layers, before scaling.
    pub fn set_eye_size(&self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        state.eye_size = (width, height);
        let head = state.head.position;
        state.views = default_views(head, (width, height));
    }

    // --- Frames ---

    /// The armed frame request, if any.
    pub fn pending_frame(&self) -> Option<HostFrameRequest> {
        self.state.borrow().pending_frame
    }

    /// Delivers the armed host frame. `None` when nothing is armed.
    pub fn fire_frame(&self, time: f64) -> Option<FrameSignal> {
        let mut state = self.state.borrow_mut();
        let request = state.pending_frame.take()?;
        state.frame_index += 1;
        Some(FrameSignal::Session {
            request,
            frame: HostFrame {
                index: state.frame_index,
                time,
            },
        })
    }

    // --- Layers ---

    /// Asks the compositor to redraw a layer, as after a content loss.
    pub fn request_redraw(&self, layer: HostLayerHandle) {
        if let Some(simulated) = self.state.borrow_mut().layers.get_mut(&layer) {
            simulated.needs_redraw = true;
        }
    }

    /// Handles of every live host layer, projection included.
    pub fn live_layers(&self) -> Vec<HostLayerHandle> {
        self.state.borrow().layers.keys().copied().collect()
    }

    /// Live quad layers.
    pub fn quad_layers(&self) -> Vec<SimulatedLayer> {
        self.state
            .borrow()
            .layers
            .values()
            .filter(|layer| !layer.is_projection())
            .cloned()
            .collect()
    }

    /// Live projection layers.
    pub fn projection_layers(&self) -> Vec<SimulatedLayer> {
        self.state
            .borrow()
            .layers
            .values()
            .filter(|layer| layer.is_projection())
            .cloned()
            .collect()
    }

    /// A live layer.
    pub fn layer(&self, handle: HostLayerHandle) -> Option<SimulatedLayer> {
        self.state.borrow().layers.get(&handle).cloned()
    }

    /// Number of legacy presentation layers created.
    pub fn legacy_layers_created(&self) -> usize {
        self.state.borrow().legacy_layers
    }

    // --- Render state ---

    /// Every committed render state, oldest first.
    pub fn render_states(&self) -> Vec<RenderState> {
        self.state.borrow().render_states.clone()
    }

    /// Number of render-state commits.
    pub fn render_state_updates(&self) -> usize {
        self.state.borrow().render_states.len()
    }

    /// The last committed render state.
    pub fn last_render_state(&self) -> Option<RenderState> {
        self.state.borrow().render_states.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use crate::host::SimulatedHost;
    use strata_core::host::{
        Eye, HostError, HostEvent, HostFrame, HostLayerHandle, LayerLayout, QuadLayerInit,
        ReferenceSpace, ReferenceSpaceType, RenderState, SessionRequest, XrHost,
    };
    use strata_core::math::RigidTransform;
    use strata_core::platform::FrameSignal;

    fn request_layers() -> SessionRequest {
        SessionRequest::default()
    }

    fn quad_init(space: ReferenceSpace) -> QuadLayerInit {
        QuadLayerInit {
            space,
            view_pixel_width: 32,
            view_pixel_height: 16,
            layout: LayerLayout::Mono,
            width: 1.0,
            height: 0.5,
            transform: RigidTransform::default(),
        }
    }

    #[test]
    fn test_layers_follow_the_grant() {
        let (mut host, handle) = SimulatedHost::new();
        let session = pollster::block_on(host.request_session(&request_layers())).unwrap();
        assert!(session.supports_layers());
        drop(session);

        handle.end_session();
        handle.grant_layers(false);
        let session = pollster::block_on(host.request_session(&request_layers())).unwrap();
        assert!(!session.supports_layers());
        assert_eq!(handle.sessions_granted(), 2);
    }

    #[test]
    fn test_required_layers_are_rejected_without_grant() {
        let (mut host, handle) = SimulatedHost::new();
        handle.grant_layers(false);
        let request = SessionRequest {
            required_features: vec!["layers".to_owned()],
            ..SessionRequest::default()
        };
        assert!(matches!(
            pollster::block_on(host.request_session(&request)),
            Err(HostError::Rejected(_))
        ));
        assert!(!handle.is_session_active());
    }

    #[test]
    fn test_frames_fire_once_per_request() {
        let (mut host, handle) = SimulatedHost::new();
        let mut session = pollster::block_on(host.request_session(&request_layers())).unwrap();
        assert!(handle.fire_frame(0.0).is_none());

        let request = session.request_animation_frame().unwrap();
        match handle.fire_frame(11.0) {
            Some(FrameSignal::Session { request: fired, frame }) => {
                assert_eq!(fired, request);
                assert_eq!(frame.time, 11.0);
            }
            other => panic!("unexpected signal {other:?}"),
        }
        assert!(handle.fire_frame(22.0).is_none());

        let request = session.request_animation_frame().unwrap();
        session.cancel_animation_frame(request);
        assert!(handle.fire_frame(33.0).is_none());
    }

    #[test]
    fn test_quad_images_are_acquired_per_eye_and_clear_redraw() {
        let (mut host, handle) = SimulatedHost::new();
        let mut session = pollster::block_on(host.request_session(&request_layers())).unwrap();
        let space = pollster::block_on(session.request_reference_space(ReferenceSpaceType::Local))
            .unwrap();
        let mut binding = session.create_graphics_binding().unwrap();
        let frame = HostFrame { index: 1, time: 0.0 };

        let mono = binding.create_quad_layer(&quad_init(space)).unwrap();
        assert!(binding.needs_redraw(mono));
        let image = binding.sub_image(mono, &frame, Eye::None).unwrap();
        assert_eq!((image.texture_width, image.texture_height), (32, 16));
        assert!(binding.sub_image(mono, &frame, Eye::Left).is_none());
        assert!(!binding.needs_redraw(mono));

        handle.request_redraw(mono);
        assert!(binding.needs_redraw(mono));

        let stereo = binding
            .create_quad_layer(&QuadLayerInit {
                layout: LayerLayout::Stereo,
                ..quad_init(space)
            })
            .unwrap();
        let left = binding.sub_image(stereo, &frame, Eye::Left).unwrap();
        let right = binding.sub_image(stereo, &frame, Eye::Right).unwrap();
        assert_ne!(left.color_texture, right.color_texture);
    }

    #[test]
    fn test_render_state_rejects_unknown_layers() {
        let (mut host, handle) = SimulatedHost::new();
        let mut session = pollster::block_on(host.request_session(&request_layers())).unwrap();
        assert_eq!(
            session.update_render_state(RenderState::Layers(vec![HostLayerHandle(999)])),
            Err(HostError::UnknownLayer(999))
        );
        session.update_render_state(RenderState::LegacyBase).unwrap();
        assert_eq!(handle.last_render_state(), Some(RenderState::LegacyBase));
    }

    #[test]
    fn test_device_end_invalidates_the_session() {
        let (mut host, handle) = SimulatedHost::new();
        let mut session = pollster::block_on(host.request_session(&request_layers())).unwrap();
        handle.end_session();

        assert_eq!(session.poll_event(), Some(HostEvent::End));
        assert_eq!(session.end(), Err(HostError::SessionEnded));
        assert!(session.request_animation_frame().is_err());
    }
}
