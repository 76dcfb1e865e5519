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

//! Shared setup: a renderer wired to the headless infra.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use strata_compositor::{
    LayerId, LayerKind, QuadLayerOptions, RenderOptions, RendererSettings, XrRenderer, XrResult,
};
use strata_core::graphics::{ContentTexture, TextureId};
use strata_core::platform::FrameSignal;
use strata_core::scene::{Camera, Scene};
use strata_infra::{
    GraphicsLog, HeadlessGraphicsContext, ManualFrameTimer, ManualTimerHandle, SimulatedHost,
    SimulatedHostHandle,
};

/// Scene and camera rendered by every tick.
pub struct World {
    pub scene: Scene,
    pub camera: Camera,
}

pub struct Harness {
    pub renderer: XrRenderer,
    pub gfx: GraphicsLog,
    pub host: SimulatedHostHandle,
    pub timer: ManualTimerHandle,
    pub world: Rc<RefCell<World>>,
    time: f64,
    next_texture: u32,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(RendererSettings::default())
    }

    pub fn with_settings(settings: RendererSettings) -> Self {
        let (gfx, log) = HeadlessGraphicsContext::new();
        let (host, host_handle) = SimulatedHost::new();
        let (timer, timer_handle) = ManualFrameTimer::new();
        let renderer = XrRenderer::new(Box::new(gfx), Box::new(host), Box::new(timer), settings);
        Self {
            renderer,
            gfx: log,
            host: host_handle,
            timer: timer_handle,
            world: Rc::new(RefCell::new(World {
                scene: Scene::new(),
                camera: Camera::default(),
            })),
            time: 0.0,
            next_texture: 5_000,
        }
    }

    pub fn start_session(&mut self) -> XrResult<()> {
        pollster::block_on(self.renderer.request_xr(None))
    }

    pub fn quad(&mut self, options: QuadLayerOptions) -> LayerId {
        self.renderer
            .create_layer(LayerKind::Quad, options)
            .expect("quad layers are supported")
    }

    /// An uploaded application texture.
    pub fn texture(&mut self, width: u32, height: u32) -> Rc<ContentTexture> {
        self.next_texture += 1;
        Rc::new(ContentTexture::new(TextureId(self.next_texture), width, height))
    }

    /// Fires whichever driver is armed.
    pub fn fire(&mut self) -> Option<FrameSignal> {
        self.time += 16.0;
        self.host
            .fire_frame(self.time)
            .or_else(|| self.timer.fire(self.time))
    }

    /// Registers a render callback and runs one tick.
    pub fn render_frame(&mut self) -> bool {
        let world = Rc::clone(&self.world);
        self.renderer.request_frame(move |renderer, _info| {
            let mut world = world.borrow_mut();
            let World { scene, camera } = &mut *world;
            renderer
                .render(RenderOptions::new(scene, camera))
                .expect("render succeeds");
        });
        self.tick()
    }

    /// Runs one tick without registering anything.
    pub fn tick(&mut self) -> bool {
        match self.fire() {
            Some(signal) => self.renderer.dispatch_frame(signal),
            None => false,
        }
    }
}
