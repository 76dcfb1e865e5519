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

//! Runs a few frames flat, inside a simulated immersive session, and after
//! the host ends it, logging what the compositor did.
//!
//! An optional first argument names a RON settings file.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::rc::Rc;
use strata_compositor::{
    LayerKind, QuadLayerOptions, RenderOptions, RendererSettings, SessionEvent, XrRenderer,
};
use strata_core::graphics::{ContentTexture, TextureId};
use strata_core::math::Vec3;
use strata_core::scene::{Camera, Node, Scene};
use strata_infra::{
    GraphicsLog, HeadlessGraphicsContext, ManualFrameTimer, ManualTimerHandle, SimulatedHost,
    SimulatedHostHandle,
};

const FRAME_MS: f64 = 1000.0 / 72.0;

struct World {
    scene: Scene,
    camera: Camera,
}

struct Sandbox {
    renderer: XrRenderer,
    gfx: GraphicsLog,
    host: SimulatedHostHandle,
    timer: ManualTimerHandle,
    world: Rc<RefCell<World>>,
    time: f64,
}

impl Sandbox {
    fn new(settings: RendererSettings) -> Self {
        let (gfx, log) = HeadlessGraphicsContext::new();
        let (host, host_handle) = SimulatedHost::new();
        let (timer, timer_handle) = ManualFrameTimer::new();

        let mut scene = Scene::new();
        scene.spawn(
            Node::new("anchor").with_position(Vec3::new(0.0, 1.4, -1.5)),
            None,
        );

        Self {
            renderer: XrRenderer::new(Box::new(gfx), Box::new(host), Box::new(timer), settings),
            gfx: log,
            host: host_handle,
            timer: timer_handle,
            world: Rc::new(RefCell::new(World {
                scene,
                camera: Camera::default(),
            })),
            time: 0.0,
        }
    }

    /// Registers a render callback and fires whichever driver is armed.
    fn frame(&mut self) {
        let world = Rc::clone(&self.world);
        self.renderer.request_frame(move |renderer, info| {
            let mut world = world.borrow_mut();
            let World { scene, camera } = &mut *world;
            if let Err(err) = renderer.render(RenderOptions::new(scene, camera)) {
                log::error!("Frame at {:.1} ms failed: {}", info.time, err);
            }
        });

        self.time += FRAME_MS;
        let signal = self
            .host
            .fire_frame(self.time)
            .or_else(|| self.timer.fire(self.time));
        match signal {
            Some(signal) => {
                self.renderer.dispatch_frame(signal);
            }
            None => log::warn!("No frame driver armed at {:.1} ms", self.time),
        }
    }

    fn run_frames(&mut self, count: usize) {
        for _ in 0..count {
            self.frame();
        }
    }

    fn report(&self, stage: &str) {
        log::info!(
            "[{}] session: {}, native layers: {:?}, copies: {}, draws: {}, blits: {}",
            stage,
            self.renderer.session().is_active(),
            self.renderer.sorted_layers(),
            self.gfx.copy_count(),
            self.gfx.draws(),
            self.gfx.blits().len()
        );
    }
}

fn load_settings() -> Result<RendererSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings from {path}"))?;
            RendererSettings::from_ron(&text).with_context(|| format!("parsing {path}"))
        }
        None => Ok(RendererSettings::default()),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut sandbox = Sandbox::new(load_settings()?);
    sandbox.renderer.session_mut().subscribe(|event: &SessionEvent| {
        log::info!("Session event: {:?}", event);
    });

    let panel = sandbox
        .renderer
        .create_layer(LayerKind::Quad, QuadLayerOptions::default())?;
    let content = Rc::new(ContentTexture::new(TextureId(500), 100, 100));
    {
        let layer = sandbox.renderer.quad_layer_mut(panel)?;
        layer.set_texture(Some(Rc::clone(&content)));
    }
    sandbox
        .renderer
        .layer_mut(panel)?
        .core_mut()
        .position = Vec3::new(0.0, 1.5, -1.0);

    sandbox.run_frames(3);
    sandbox.report("flat");

    pollster::block_on(sandbox.renderer.request_xr(None)).context("starting the session")?;
    sandbox.run_frames(3);
    content.mark_updated();
    sandbox.run_frames(2);
    sandbox.report("immersive");

    sandbox.host.end_session();
    sandbox.run_frames(3);
    sandbox.report("after host end");

    Ok(())
}
