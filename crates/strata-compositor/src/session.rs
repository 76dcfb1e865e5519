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

//! Immersive session lifecycle and host layer bookkeeping.
//!
//! [`SessionState`] negotiates the session with an [`XrHost`], records once
//! whether the host composites native layers, allocates host layers and keeps
//! the committed render state (active composition layers, then the base layer)
//! in sync with the host. Lifecycle changes reach observers synchronously.

use crate::error::{XrError, XrResult};
use crate::layer::{LayerInit, LayerKind};
use crate::render_target::RenderTarget;
use std::cell::OnceCell;
use std::fmt;
use strata_core::graphics::{GraphicsContext, Viewport};
use strata_core::host::{
    Eye, GraphicsBinding, HostEvent, HostFrame, HostFrameRequest, HostLayerHandle, HostSession,
    InputSource, InputSourceId, LegacyLayer, ProjectionLayerInit, ReferenceSpace, RenderState,
    SessionRequest, SubImage, ViewerPose, Visibility, XrHost,
};
use strata_core::math::RigidTransform;

/// Lifecycle phase of a [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionPhase {
    /// No session.
    #[default]
    Inactive,
    /// Negotiation in flight.
    Requesting,
    /// A session is running.
    Active,
    /// Teardown in progress.
    Ending,
}

/// What the host granted at the first session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// The host composites native composition layers.
    pub native_layers: bool,
}

/// Notification delivered to session observers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A session was granted.
    Started,
    /// The session ended, by the host or explicitly.
    Ended,
    /// The set of input sources changed. Empty after an end.
    InputSourcesChanged(Vec<InputSource>),
    /// The host changed the content visibility.
    VisibilityChanged(Visibility),
}

/// Handle returned by [`SessionState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// The presentation layer the scene renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseLayer {
    /// Host-owned framebuffer with per-view viewports.
    Legacy(LegacyLayer),
    /// Projection composition layer.
    Projection(HostLayerHandle),
}

/// Result of [`SessionState::get_layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerAllocation {
    /// The (existing or new) base layer.
    Base,
    /// A new composition layer.
    Composition(HostLayerHandle),
}

type Observer = Box<dyn FnMut(&SessionEvent)>;

/// Owns one immersive session and every host layer allocated for it.
pub struct SessionState {
    phase: SessionPhase,
    capabilities: OnceCell<Capabilities>,

    session: Option<Box<dyn HostSession>>,
    space: Option<ReferenceSpace>,
    binding: Option<Box<dyn GraphicsBinding>>,

    base_layer: Option<BaseLayer>,
    base_target: Option<RenderTarget>,
    allocated: Vec<HostLayerHandle>,
    active: Vec<HostLayerHandle>,

    scale_factor: f32,
    current_frame: Option<HostFrame>,
    input_sources: Vec<InputSource>,
    visibility: Visibility,

    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("phase", &self.phase)
            .field("capabilities", &self.capabilities.get())
            .field("space", &self.space)
            .field("base_layer", &self.base_layer)
            .field("active", &self.active)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// An inactive state with no recorded capability.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Inactive,
            capabilities: OnceCell::new(),
            session: None,
            space: None,
            binding: None,
            base_layer: None,
            base_target: None,
            allocated: Vec::new(),
            active: Vec::new(),
            scale_factor: 1.0,
            current_frame: None,
            input_sources: Vec::new(),
            visibility: Visibility::default(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    // --- Lifecycle ---

    /// Negotiates a session with `host`.
    ///
    /// # Errors
    ///
    /// [`XrError::SessionAlreadyActive`] if a session exists, and
    /// [`XrError::SessionNegotiationFailed`] if the host rejects the session
    /// or its reference space.
    pub async fn request_session(
        &mut self,
        host: &mut dyn XrHost,
        request: &SessionRequest,
    ) -> XrResult<()> {
        if self.phase != SessionPhase::Inactive {
            return Err(XrError::SessionAlreadyActive);
        }

        self.phase = SessionPhase::Requesting;
        log::info!("Requesting {:?} session", request.mode);

        let mut session = match host.request_session(request).await {
            Ok(session) => session,
            Err(err) => {
                self.phase = SessionPhase::Inactive;
                log::warn!("Immersive session rejected: {}", err);
                return Err(XrError::SessionNegotiationFailed(err));
            }
        };

        let space = match session.request_reference_space(request.reference_space).await {
            Ok(space) => space,
            Err(err) => {
                if let Err(end_err) = session.end() {
                    log::warn!("Failed to end rejected session: {}", end_err);
                }
                self.phase = SessionPhase::Inactive;
                log::warn!("Reference space {:?} rejected: {}", request.reference_space, err);
                return Err(XrError::SessionNegotiationFailed(err));
            }
        };

        let granted = session.supports_layers();
        let capabilities = *self.capabilities.get_or_init(|| Capabilities {
            native_layers: granted,
        });
        if capabilities.native_layers != granted {
            log::debug!(
                "Session reports native layers = {}, keeping the recorded capability",
                granted
            );
        }

        self.scale_factor = session.native_framebuffer_scale_factor();
        self.input_sources = session.input_sources();
        self.visibility = session.visibility();
        self.session = Some(session);
        self.space = Some(space);
        self.phase = SessionPhase::Active;

        log::info!(
            "Immersive session granted (native layers: {}, scale factor: {})",
            capabilities.native_layers,
            self.scale_factor
        );
        self.emit(&SessionEvent::Started);
        Ok(())
    }

    /// Ends the session explicitly. A no-op when inactive.
    ///
    /// Observers receive an empty [`SessionEvent::InputSourcesChanged`]
    /// followed by [`SessionEvent::Ended`].
    pub fn end(&mut self, gfx: &mut dyn GraphicsContext) -> XrResult<()> {
        self.phase = SessionPhase::Ending;
        let Some(mut session) = self.clear(gfx) else {
            return Ok(());
        };

        self.emit(&SessionEvent::InputSourcesChanged(Vec::new()));
        let result = session.end();
        log::info!("Immersive session ended");
        self.emit(&SessionEvent::Ended);
        result.map_err(XrError::from)
    }

    /// Releases every host layer, the base target and the session.
    ///
    /// Returns the released host session. Idempotent.
    pub fn clear(&mut self, gfx: &mut dyn GraphicsContext) -> Option<Box<dyn HostSession>> {
        self.phase = SessionPhase::Inactive;
        let session = self.session.take()?;

        if let Some(binding) = self.binding.as_mut() {
            for handle in self.allocated.drain(..) {
                binding.destroy_layer(handle);
            }
            if let Some(BaseLayer::Projection(handle)) = self.base_layer {
                binding.destroy_layer(handle);
            }
        }
        self.allocated.clear();
        self.active.clear();

        if let Some(mut target) = self.base_target.take() {
            target.destroy(gfx);
        }
        self.base_layer = None;
        self.binding = None;
        self.space = None;
        self.current_frame = None;
        self.input_sources.clear();

        Some(session)
    }

    /// Pulls host events and dispatches them to observers.
    ///
    /// Returns the dispatched notifications in order. A host end tears the
    /// session down before its notifications go out.
    pub fn pump_events(&mut self, gfx: &mut dyn GraphicsContext) -> Vec<SessionEvent> {
        let mut dispatched = Vec::new();

        while let Some(event) = self.session.as_mut().and_then(|s| s.poll_event()) {
            let notifications = match event {
                HostEvent::End => {
                    log::info!("Host ended the immersive session");
                    self.phase = SessionPhase::Ending;
                    self.clear(gfx);
                    vec![
                        SessionEvent::InputSourcesChanged(Vec::new()),
                        SessionEvent::Ended,
                    ]
                }
                HostEvent::InputSourcesChanged => {
                    let sources = self
                        .session
                        .as_ref()
                        .map(|s| s.input_sources())
                        .unwrap_or_default();
                    self.input_sources = sources.clone();
                    vec![SessionEvent::InputSourcesChanged(sources)]
                }
                HostEvent::VisibilityChanged(visibility) => {
                    self.visibility = visibility;
                    vec![SessionEvent::VisibilityChanged(visibility)]
                }
            };

            for notification in notifications {
                self.emit(&notification);
                dispatched.push(notification);
            }
        }

        dispatched
    }

    // --- Observers ---

    /// Registers an observer. Events are delivered synchronously, in order.
    pub fn subscribe(&mut self, observer: impl FnMut(&SessionEvent) + 'static) -> ObserverId {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Removes an observer. Returns `false` if it was unknown.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: &SessionEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }

    // --- Layers ---

    /// Allocates a host layer.
    ///
    /// Without native layer support only the base layer exists: asking for
    /// anything else logs a warning and yields [`LayerAllocation::Base`].
    ///
    /// # Errors
    ///
    /// [`XrError::NoActiveSession`] without a session, [`XrError::UnsupportedLayer`]
    /// for reserved kinds, and host or resource errors from the allocation.
    pub fn get_layer(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        kind: LayerKind,
        init: Option<&LayerInit>,
    ) -> XrResult<LayerAllocation> {
        let native = self.has_native_layers();
        let Some(session) = self.session.as_mut() else {
            return Err(XrError::NoActiveSession);
        };

        if !native {
            if kind != LayerKind::Base || self.base_layer.is_some() {
                log::warn!("Only a single base layer is supported without native layers");
            }
            if self.base_layer.is_none() {
                let legacy = session.create_legacy_layer(self.scale_factor)?;
                self.base_layer = Some(BaseLayer::Legacy(legacy));
                log::info!(
                    "Allocated legacy presentation layer ({}x{})",
                    legacy.framebuffer_width,
                    legacy.framebuffer_height
                );
                self.commit()?;
            }
            return Ok(LayerAllocation::Base);
        }

        if self.binding.is_none() {
            self.binding = Some(session.create_graphics_binding()?);
        }
        let Some(binding) = self.binding.as_mut() else {
            return Err(XrError::NoActiveSession);
        };

        let allocation = match (kind, init) {
            (LayerKind::Base, _) => {
                if self.base_layer.is_some() {
                    return Ok(LayerAllocation::Base);
                }
                let handle = binding.create_projection_layer(&ProjectionLayerInit {
                    scale_factor: self.scale_factor,
                })?;
                let mut target = match RenderTarget::new(gfx) {
                    Ok(target) => target,
                    Err(err) => {
                        binding.destroy_layer(handle);
                        return Err(err.into());
                    }
                };
                target.ignore_depth = binding.ignores_depth_values(handle);
                self.base_layer = Some(BaseLayer::Projection(handle));
                self.base_target = Some(target);
                log::info!("Allocated presentation layer {:?}", handle);
                LayerAllocation::Base
            }
            (LayerKind::Quad, Some(LayerInit::Quad(init))) => {
                let handle = binding.create_quad_layer(init)?;
                self.allocated.insert(0, handle);
                self.active.insert(0, handle);
                log::debug!("Allocated quad layer {:?}", handle);
                LayerAllocation::Composition(handle)
            }
            (LayerKind::Quad, None) => {
                return Err(XrError::InvalidLayerState {
                    layer: None,
                    reason: "quad layers need allocation parameters",
                });
            }
            (LayerKind::Cube | LayerKind::Sphere, _) => {
                return Err(XrError::UnsupportedLayer(kind));
            }
        };

        self.commit()?;
        Ok(allocation)
    }

    /// Commits a new order of active composition layers.
    ///
    /// Returns `false` without touching the host when the order is unchanged.
    pub fn set_layers_order(&mut self, order: &[HostLayerHandle]) -> XrResult<bool> {
        if order == self.active.as_slice() {
            return Ok(false);
        }
        self.active = order.to_vec();
        self.commit()?;
        Ok(true)
    }

    /// Destroys a host layer and drops it from the committed state.
    pub fn on_layer_destroy(&mut self, handle: HostLayerHandle) -> XrResult<()> {
        if !self.has_native_layers() || self.session.is_none() {
            return Ok(());
        }
        if let Some(binding) = self.binding.as_mut() {
            binding.destroy_layer(handle);
        }
        self.allocated.retain(|h| *h != handle);
        self.active.retain(|h| *h != handle);
        self.commit()
    }

    fn commit(&mut self) -> XrResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(XrError::NoActiveSession);
        };
        let state = if self.capabilities.get().is_some_and(|c| c.native_layers) {
            let mut layers = self.active.clone();
            if let Some(BaseLayer::Projection(handle)) = self.base_layer {
                layers.push(handle);
            }
            RenderState::Layers(layers)
        } else {
            RenderState::LegacyBase
        };
        session.update_render_state(state)?;
        log::debug!("Regenerated render state");
        Ok(())
    }

    // --- Frames ---

    /// Schedules the next host frame.
    pub fn request_animation_frame(&mut self) -> XrResult<HostFrameRequest> {
        let session = self.session.as_mut().ok_or(XrError::NoActiveSession)?;
        Ok(session.request_animation_frame()?)
    }

    /// Cancels a scheduled host frame.
    pub fn cancel_animation_frame(&mut self, request: HostFrameRequest) {
        if let Some(session) = self.session.as_mut() {
            session.cancel_animation_frame(request);
        }
    }

    /// Marks `frame` as the frame being processed.
    pub fn begin_frame(&mut self, frame: HostFrame) {
        self.current_frame = Some(frame);
    }

    /// Clears the current frame.
    pub fn end_frame(&mut self) {
        self.current_frame = None;
    }

    /// Host frame being processed, if any.
    pub fn current_frame(&self) -> Option<HostFrame> {
        self.current_frame
    }

    /// Viewer pose for `frame` in the session reference space.
    pub fn viewer_pose(&self, frame: &HostFrame) -> Option<ViewerPose> {
        let (session, space) = (self.session.as_ref()?, self.space.as_ref()?);
        session.viewer_pose(frame, space)
    }

    /// Grip pose of an input source in the session reference space.
    pub fn grip_pose(&self, frame: &HostFrame, source: InputSourceId) -> Option<RigidTransform> {
        let (session, space) = (self.session.as_ref()?, self.space.as_ref()?);
        session.grip_pose(frame, source, space)
    }

    /// Per-view viewport of the legacy base layer.
    pub fn legacy_viewport(&self, eye: Eye) -> Option<Viewport> {
        self.session.as_ref()?.legacy_viewport(eye)
    }

    /// Sub-image of the projection base layer for one view.
    pub fn base_sub_image(&self, frame: &HostFrame, eye: Eye) -> Option<SubImage> {
        match self.base_layer? {
            BaseLayer::Projection(handle) => self.binding.as_ref()?.sub_image(handle, frame, eye),
            BaseLayer::Legacy(_) => None,
        }
    }

    // --- Accessors ---

    /// `true` while a session exists.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Capability recorded at the first grant.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities.get().copied()
    }

    /// `true` when the recorded capability includes native layers.
    pub fn has_native_layers(&self) -> bool {
        self.capabilities.get().is_some_and(|c| c.native_layers)
    }

    /// Session reference space.
    pub fn reference_space(&self) -> Option<ReferenceSpace> {
        self.space
    }

    /// Input sources known after the last update.
    pub fn input_sources(&self) -> &[InputSource] {
        &self.input_sources
    }

    /// Current content visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Committed order of composition layers.
    pub fn active_layers(&self) -> &[HostLayerHandle] {
        &self.active
    }

    /// Every composition layer still allocated.
    pub fn allocated_layers(&self) -> &[HostLayerHandle] {
        &self.allocated
    }

    /// Native framebuffer scale factor of the session.
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// The presentation layer.
    pub fn base_layer(&self) -> Option<BaseLayer> {
        self.base_layer
    }

    /// Render target of the projection base layer.
    pub fn base_target_mut(&mut self) -> Option<&mut RenderTarget> {
        self.base_target.as_mut()
    }

    /// Graphics binding, present once native layers were allocated.
    pub fn binding_mut(&mut self) -> Option<&mut dyn GraphicsBinding> {
        match self.binding.as_mut() {
            Some(binding) => Some(binding.as_mut()),
            None => None,
        }
    }
}
