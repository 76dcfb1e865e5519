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

//! The frame renderer.
//!
//! [`XrRenderer`] ties the pieces together: it owns the graphics context, the
//! session state, the layer registry and the frame scheduler. Each tick it
//! either draws the scene once (flat) or once per view into the session's base
//! layer (stereo), then reconciles composition layers with the host.

use crate::clip::ProgramCache;
use crate::config::RendererSettings;
use crate::error::{XrError, XrResult};
use crate::frame::{
    build_render_list, rendered_nodes, FrameDriver, FrameInfo, FrameRequestId, FrameScheduler,
    RenderItem, RenderListOptions, RenderSource,
};
use crate::layer::{
    CompositionLayer, LayerId, LayerKind, LayerPolicy, LayerRegistry, LayerUpdateContext,
    NativeContext, QuadLayer, QuadLayerOptions,
};
use crate::session::{BaseLayer, LayerAllocation, SessionEvent, SessionState};
use std::collections::BTreeMap;
use strata_core::graphics::{
    BufferMask, FramebufferId, FramebufferTarget, GraphicsContext, Viewport,
};
use strata_core::host::{Eye, HostFrame, HostLayerHandle, InputSourceId, SessionRequest, XrHost};
use strata_core::math::Mat4;
use strata_core::platform::{FrameSignal, FrameTimer};
use strata_core::scene::{Camera, DrawContext, NodeId, Scene};

/// A frame callback. Runs once, on the tick after it was requested.
pub type FrameCallback = Box<dyn FnOnce(&mut XrRenderer, &FrameInfo)>;

/// An explicit framebuffer to render into instead of the default surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenTarget {
    /// Framebuffer to bind.
    pub framebuffer: FramebufferId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Parameters of one [`XrRenderer::render`] call.
#[derive(Debug)]
pub struct RenderOptions<'a> {
    /// Scene to draw.
    pub scene: &'a mut Scene,
    /// Camera. Overwritten per view in the stereo path.
    pub camera: &'a mut Camera,
    /// Offscreen target. Forces the flat path.
    pub target: Option<OffscreenTarget>,
    /// Clear override, `None` follows `auto_clear`.
    pub clear: Option<bool>,
    /// Sort the render list.
    pub sort: bool,
    /// Recompute scene world matrices first.
    pub update: bool,
}

impl<'a> RenderOptions<'a> {
    /// Default options for `scene` seen through `camera`.
    pub fn new(scene: &'a mut Scene, camera: &'a mut Camera) -> Self {
        Self {
            scene,
            camera,
            target: None,
            clear: None,
            sort: true,
            update: true,
        }
    }
}

/// Renders a scene flat or into an immersive session and composites layers.
#[derive(Debug)]
pub struct XrRenderer {
    gfx: Box<dyn GraphicsContext>,
    host: Box<dyn XrHost>,
    timer: Box<dyn FrameTimer>,
    settings: RendererSettings,
    policy: LayerPolicy,

    session: SessionState,
    layers: LayerRegistry,
    programs: ProgramCache,
    scheduler: FrameScheduler<FrameCallback>,
    sorted_layers: Vec<LayerId>,
    tracked_inputs: BTreeMap<NodeId, Option<InputSourceId>>,
    surface: Viewport,
}

impl XrRenderer {
    /// Creates a renderer. No frame is scheduled until one is requested.
    pub fn new(
        gfx: Box<dyn GraphicsContext>,
        host: Box<dyn XrHost>,
        timer: Box<dyn FrameTimer>,
        settings: RendererSettings,
    ) -> Self {
        log::info!(
            "Creating renderer (native layers allowed: {}, antialias: {})",
            settings.allow_native_layers,
            settings.antialias
        );
        Self {
            gfx,
            host,
            timer,
            policy: LayerPolicy::from(&settings),
            settings,
            session: SessionState::new(),
            layers: LayerRegistry::new(),
            programs: ProgramCache::new(),
            scheduler: FrameScheduler::new(),
            sorted_layers: Vec::new(),
            tracked_inputs: BTreeMap::new(),
            surface: Viewport::sized(1, 1),
        }
    }

    // --- Accessors ---

    /// Settings the renderer was created with.
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Sets the clear color, clamping every channel to `[0, 1]`.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.settings.clear_color = color.map(|c| c.clamp(0.0, 1.0));
    }

    /// Resizes the default surface.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.surface = Viewport::sized(width, height);
    }

    /// Session state.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Session state, mutably (observers, explicit queries).
    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Graphics context.
    pub fn gfx_mut(&mut self) -> &mut dyn GraphicsContext {
        self.gfx.as_mut()
    }

    /// Registered layers.
    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    /// Layer ids currently composited natively, back to front.
    pub fn sorted_layers(&self) -> &[LayerId] {
        &self.sorted_layers
    }

    /// Driver the next tick is expected from.
    pub fn frame_driver(&self) -> Option<FrameDriver> {
        self.scheduler.armed()
    }

    // --- Layers ---

    /// Registers a layer. It binds natively at the next reconciliation.
    pub fn register_layer(&mut self, layer: Box<dyn CompositionLayer>) -> LayerId {
        self.layers.register(layer)
    }

    /// Builds and registers a layer.
    ///
    /// # Errors
    ///
    /// [`XrError::UnsupportedLayer`] for every kind but [`LayerKind::Quad`].
    pub fn create_layer(&mut self, kind: LayerKind, options: QuadLayerOptions) -> XrResult<LayerId> {
        match kind {
            LayerKind::Quad => Ok(self.register_layer(Box::new(QuadLayer::new(options)))),
            other => Err(XrError::UnsupportedLayer(other)),
        }
    }

    /// Unregisters a layer and releases its GPU and host resources.
    pub fn destroy_layer(&mut self, id: LayerId) -> XrResult<()> {
        let mut layer = self.layers.unregister(id).ok_or(XrError::InvalidLayerState {
            layer: Some(id),
            reason: "layer is not registered",
        })?;
        self.sorted_layers.retain(|sorted| *sorted != id);
        if let Some(handle) = layer.release(self.gfx.as_mut(), &mut self.programs) {
            self.session.on_layer_destroy(handle)?;
        }
        log::debug!("Destroyed layer '{}'", layer.core().label());
        Ok(())
    }

    /// Looks up a registered layer.
    pub fn layer(&self, id: LayerId) -> XrResult<&dyn CompositionLayer> {
        self.layers.get(id).ok_or(XrError::InvalidLayerState {
            layer: Some(id),
            reason: "layer is not registered",
        })
    }

    /// Looks up a registered layer, mutably.
    pub fn layer_mut(&mut self, id: LayerId) -> XrResult<&mut dyn CompositionLayer> {
        self.layers.get_mut(id).ok_or(XrError::InvalidLayerState {
            layer: Some(id),
            reason: "layer is not registered",
        })
    }

    /// Looks up a registered quad layer.
    pub fn quad_layer_mut(&mut self, id: LayerId) -> XrResult<&mut QuadLayer> {
        self.layer_mut(id)?
            .as_any_mut()
            .downcast_mut::<QuadLayer>()
            .ok_or(XrError::InvalidLayerState {
                layer: Some(id),
                reason: "not a quad layer",
            })
    }

    /// Makes `node` follow the grip pose of `source` during immersive frames.
    /// `None` hides the node until a source is assigned again.
    pub fn track_input_source(&mut self, node: NodeId, source: Option<InputSourceId>) {
        self.tracked_inputs.insert(node, source);
    }

    /// Stops tracking `node`.
    pub fn untrack_input_source(&mut self, node: NodeId) {
        self.tracked_inputs.remove(&node);
    }

    // --- Session ---

    /// Starts an immersive session.
    ///
    /// The frame loop is swapped to the session loop on success and rearmed
    /// on the timer on failure. Pending frame callbacks survive both.
    ///
    /// # Errors
    ///
    /// [`XrError::SessionAlreadyActive`] while a session runs, and
    /// [`XrError::SessionNegotiationFailed`] when the host refuses.
    pub async fn request_xr(&mut self, request: Option<SessionRequest>) -> XrResult<()> {
        if self.session.is_active() {
            return Err(XrError::SessionAlreadyActive);
        }
        let request = request.unwrap_or_else(|| self.settings.session.clone());

        self.clear_loop();
        let result = self.session.request_session(self.host.as_mut(), &request).await;
        self.attach_loop();
        result?;

        self.on_session_start()
    }

    /// Ends the immersive session, if any, and returns to flat rendering.
    pub fn end_xr(&mut self) -> XrResult<()> {
        if !self.session.is_active() {
            return Ok(());
        }
        let result = self.session.end(self.gfx.as_mut());
        self.on_session_lost();
        result
    }

    /// Pulls host events. Session loss is handled before this returns.
    pub fn pump_session_events(&mut self) -> Vec<SessionEvent> {
        let events = self.session.pump_events(self.gfx.as_mut());
        if events.contains(&SessionEvent::Ended) {
            self.on_session_lost();
        }
        events
    }

    fn on_session_start(&mut self) -> XrResult<()> {
        self.session
            .get_layer(self.gfx.as_mut(), LayerKind::Base, None)?;
        for id in self.layers.ids() {
            self.bind_native_layer(id);
        }
        Ok(())
    }

    fn on_session_lost(&mut self) {
        self.clear_loop();
        for layer in self.layers.iter_mut() {
            // host layers are gone with the session
            layer.bind_layer(None, &self.policy, self.gfx.as_mut());
        }
        self.sorted_layers.clear();
        self.attach_loop();
        log::warn!("XR session ended");
    }

    /// Attempts native (re)binding of one layer. Returns `true` when bound.
    fn bind_native_layer(&mut self, id: LayerId) -> bool {
        let policy = self.policy;
        let gfx = self.gfx.as_mut();
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };

        let bound = layer.core().native();
        if bound.is_some() && !(layer.core().use_native && layer.is_valid(&policy)) {
            if let Some(released) = layer.bind_layer(None, &policy, gfx) {
                release_host_layer(&mut self.session, released);
            }
            return false;
        }
        if !layer.needs_update_native(&policy) || !self.session.has_native_layers() {
            return bound.is_some();
        }
        let Some(space) = self.session.reference_space() else {
            return false;
        };

        let init = layer.host_init(space);
        let handle = match self.session.get_layer(gfx, layer.kind(), Some(&init)) {
            Ok(LayerAllocation::Composition(handle)) => Some(handle),
            Ok(LayerAllocation::Base) => None,
            Err(err) => {
                log::error!(
                    "Failed to allocate a host layer for '{}': {}",
                    layer.core().label(),
                    err
                );
                None
            }
        };

        if let Some(released) = layer.bind_layer(handle, &policy, gfx) {
            release_host_layer(&mut self.session, released);
        }
        handle.is_some()
    }

    // --- Frame Loop ---

    /// Registers a callback for the next tick.
    pub fn request_frame(
        &mut self,
        callback: impl FnOnce(&mut XrRenderer, &FrameInfo) + 'static,
    ) -> FrameRequestId {
        let id = self.scheduler.request(Box::new(callback));
        if self.scheduler.armed().is_none() {
            self.attach_loop();
        }
        id
    }

    /// Cancels a pending callback. Returns `false` if it already ran.
    pub fn cancel_frame(&mut self, id: FrameRequestId) -> bool {
        self.scheduler.cancel(id)
    }

    /// Runs one tick for a fired driver.
    ///
    /// Returns `false` when the signal does not come from the armed driver.
    pub fn dispatch_frame(&mut self, signal: FrameSignal) -> bool {
        if !self.scheduler.accepts(&signal) {
            log::trace!("Ignoring stale frame signal {:?}", signal);
            return false;
        }
        self.scheduler.disarm();
        // may end the session and rearm the timer
        self.pump_session_events();

        let info = FrameInfo {
            time: signal.time(),
            frame: match signal {
                FrameSignal::Session { frame, .. } if self.session.is_active() => Some(frame),
                _ => None,
            },
        };
        if let Some(frame) = info.frame {
            self.session.begin_frame(frame);
        }

        let callbacks = self.scheduler.take_pending();
        log::trace!("Tick at {:.3} ms, {} callbacks", info.time, callbacks.len());
        for callback in callbacks {
            callback(self, &info);
        }

        self.session.end_frame();
        self.attach_loop();
        true
    }

    fn clear_loop(&mut self) {
        match self.scheduler.disarm() {
            Some(FrameDriver::Timer(id)) => self.timer.cancel_frame(id),
            Some(FrameDriver::Session(request)) => self.session.cancel_animation_frame(request),
            None => {}
        }
    }

    fn attach_loop(&mut self) {
        self.clear_loop();
        if self.session.is_active() {
            match self.session.request_animation_frame() {
                Ok(request) => {
                    self.scheduler.arm(FrameDriver::Session(request));
                    return;
                }
                Err(err) => log::error!("Failed to request a host frame, using the timer: {}", err),
            }
        }
        let id = self.timer.request_frame();
        self.scheduler.arm(FrameDriver::Timer(id));
    }

    // --- Rendering ---

    /// Draws `options.scene`.
    ///
    /// Without a session, or with an offscreen target, the scene is drawn once.
    /// Inside an immersive tick it is drawn once per view into the base
    /// layer, then layers are reconciled with the host.
    pub fn render(&mut self, options: RenderOptions<'_>) -> XrResult<()> {
        let RenderOptions {
            scene,
            camera,
            target,
            clear,
            sort,
            update,
        } = options;
        let render_xr = target.is_none() && self.session.is_active();

        self.gfx.set_clear_color(self.settings.clear_color);

        if render_xr {
            self.apply_tracked_inputs(scene);
        }
        if update {
            scene.update_world_matrices();
        }
        camera.update_matrices();
        self.sync_layer_transforms(scene);

        if !render_xr {
            self.update_layers(None)?;
        }

        match target {
            None => {
                self.gfx.bind_framebuffer(FramebufferTarget::Framebuffer, None);
                self.gfx.viewport(self.surface);
            }
            Some(target) => {
                self.gfx
                    .bind_framebuffer(FramebufferTarget::Framebuffer, Some(target.framebuffer));
                self.gfx.viewport(Viewport::sized(target.width, target.height));
            }
        }

        let should_clear = clear.unwrap_or(self.settings.auto_clear);
        if render_xr || should_clear {
            self.gfx.clear(BufferMask::COLOR | BufferMask::DEPTH);
        }

        let list = build_render_list(
            scene,
            &self.layers,
            camera,
            RenderListOptions {
                pass: self.settings.active_pass,
                frustum_cull: self.settings.frustum_cull,
                sort,
            },
        );

        if render_xr {
            self.render_stereo(scene, camera, &list, should_clear)?;
        } else {
            self.draw_list(scene, camera, &list, Eye::None)?;
        }

        self.gfx.use_program(None);
        Ok(())
    }

    fn render_stereo(
        &mut self,
        scene: &mut Scene,
        camera: &mut Camera,
        list: &[RenderItem],
        should_clear: bool,
    ) -> XrResult<()> {
        let Some(frame) = self.session.current_frame() else {
            log::trace!("No host frame in flight, skipping the stereo draw");
            return Ok(());
        };
        let Some(pose) = self.session.viewer_pose(&frame) else {
            return Ok(());
        };
        let Some(base) = self.session.base_layer() else {
            log::debug!("No base layer allocated, skipping the stereo draw");
            return Ok(());
        };

        for (i, view) in pose.views.iter().enumerate() {
            let viewport = match base {
                BaseLayer::Legacy(legacy) => {
                    let Some(viewport) = self.session.legacy_viewport(view.eye) else {
                        continue;
                    };
                    self.gfx
                        .bind_framebuffer(FramebufferTarget::Framebuffer, legacy.framebuffer);
                    viewport
                }
                BaseLayer::Projection(_) => {
                    let Some(sub_image) = self.session.base_sub_image(&frame, view.eye) else {
                        continue;
                    };
                    let antialias = self.settings.antialias;
                    let Some(target) = self.session.base_target_mut() else {
                        continue;
                    };
                    if i == 0 {
                        target.attach(self.gfx.as_mut(), sub_image, antialias)?;
                    }
                    self.gfx
                        .bind_framebuffer(FramebufferTarget::Framebuffer, target.framebuffer());
                    sub_image.viewport
                }
            };

            camera.set_from_view(view);
            self.gfx.viewport(viewport);
            if i == 0 && should_clear {
                self.gfx.clear(BufferMask::COLOR | BufferMask::DEPTH);
            }
            self.draw_list(scene, camera, list, view.eye)?;
        }

        if let Some(target) = self.session.base_target_mut() {
            target.blit(self.gfx.as_mut());
        }
        self.gfx.reset_binding_state();

        self.rebuild_layers_state(camera, frame)
    }

    fn draw_list(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        list: &[RenderItem],
        eye: Eye,
    ) -> XrResult<()> {
        for item in list {
            match item.source {
                RenderSource::Node(id) => {
                    let Some(drawable) = scene.node_mut(id).and_then(|n| n.drawable.as_mut()) else {
                        continue;
                    };
                    let ctx = DrawContext {
                        world: &item.world,
                        camera,
                        eye,
                    };
                    drawable.draw(self.gfx.as_mut(), &ctx)?;
                }
                RenderSource::LayerClip(id) => {
                    let Some(layer) = self.layers.get_mut(id) else {
                        continue;
                    };
                    let world = *layer.core().world_matrix();
                    let ctx = DrawContext {
                        world: &world,
                        camera,
                        eye,
                    };
                    layer
                        .clip_mut()
                        .draw(self.gfx.as_mut(), &mut self.programs, &ctx)?;
                }
            }
        }
        Ok(())
    }

    /// Binds visible layers, commits the native order and updates every layer.
    fn rebuild_layers_state(&mut self, camera: &Camera, frame: HostFrame) -> XrResult<()> {
        if !self.session.is_active() {
            return Ok(());
        }

        let mut native: Vec<(LayerId, f32)> = Vec::new();
        for id in self.layers.ids() {
            let eligible = self
                .layers
                .get(id)
                .is_some_and(|layer| layer.core().is_rendered());
            if !eligible || !self.bind_native_layer(id) {
                continue;
            }
            if let Some(layer) = self.layers.get(id) {
                native.push((id, camera.depth_of(layer.core().world_matrix().translation())));
            }
        }

        native.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let sorted: Vec<LayerId> = native.into_iter().map(|(id, _)| id).collect();

        // handles, not ids: a rebuilt layer keeps its id but not its handle
        let handles: Vec<HostLayerHandle> = sorted
            .iter()
            .filter_map(|id| self.layers.get(*id).and_then(|layer| layer.core().native()))
            .collect();
        if self.session.set_layers_order(&handles)? {
            log::trace!("Committed native layer order {:?}", sorted);
        }
        self.sorted_layers = sorted;

        self.update_layers(Some(frame))
    }

    fn update_layers(&mut self, frame: Option<HostFrame>) -> XrResult<()> {
        let gfx = self.gfx.as_mut();
        let mut binding = self.session.binding_mut();
        for layer in self.layers.iter_mut() {
            let native = match binding.as_mut() {
                Some(binding) => Some(NativeContext {
                    binding: &mut **binding,
                    frame: frame.as_ref(),
                }),
                None => None,
            };
            let mut ctx = LayerUpdateContext {
                gfx: &mut *gfx,
                native,
            };
            layer.update(&mut ctx)?;
        }
        Ok(())
    }

    /// Follows parent nodes: world transform, and whether the parent's
    /// subtree is part of this frame's traversal.
    fn sync_layer_transforms(&mut self, scene: &Scene) {
        let reached = rendered_nodes(scene, self.settings.active_pass);
        for layer in self.layers.iter_mut() {
            let parent = layer.core().parent;
            let world = parent
                .and_then(|id| scene.node(id))
                .map_or(Mat4::IDENTITY, |node| *node.world_matrix());
            let world = world * layer.core().local_matrix();
            let core = layer.core_mut();
            core.set_world_matrix(world);
            core.set_parent_rendered(parent.map_or(true, |id| reached.contains(&id)));
        }
    }

    fn apply_tracked_inputs(&mut self, scene: &mut Scene) {
        let Some(frame) = self.session.current_frame() else {
            return;
        };
        for (&node, &source) in &self.tracked_inputs {
            let Some(node) = scene.node_mut(node) else {
                continue;
            };
            node.visible = source.is_some();
            if let Some(pose) = source.and_then(|source| self.session.grip_pose(&frame, source)) {
                node.virtual_parent_transform = Some(pose.to_matrix());
            }
        }
    }
}

fn release_host_layer(session: &mut SessionState, handle: HostLayerHandle) {
    if let Err(err) = session.on_layer_destroy(handle) {
        log::error!("Failed to release host layer {:?}: {}", handle, err);
    }
}
