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

//! Integration tests for the frame renderer: layer binding, content upload,
//! reconciliation and session loss.

mod common;

use common::Harness;
use std::cell::RefCell;
use std::rc::Rc;
use strata_compositor::clip::MaskMode;
use strata_compositor::frame::FrameDriver;
use strata_compositor::session::BaseLayer;
use strata_compositor::{
    CompositionLayer, LayerId, LayerKind, OffscreenTarget, QuadLayerOptions, RenderOptions,
    RendererSettings, SessionEvent, XrError,
};
use strata_core::graphics::{BufferMask, FramebufferId};
use strata_core::host::{
    Eye, Handedness, HostError, InputSource, InputSourceId, LayerLayout, RenderState,
};
use strata_core::math::{Quaternion, RigidTransform, Vec3};
use strata_core::platform::{FrameSignal, TimerRequestId};
use strata_core::scene::{Node, NodeId};
use strata_infra::GraphicsCall;

fn options(width: f32, height: f32) -> QuadLayerOptions {
    QuadLayerOptions {
        width,
        height,
        ..QuadLayerOptions::default()
    }
}

fn place(h: &mut Harness, id: LayerId, position: Vec3) {
    h.renderer.layer_mut(id).unwrap().core_mut().position = position;
}

/// A quad attached to a fresh scene node.
fn parented_quad(h: &mut Harness) -> (NodeId, LayerId) {
    let root = h.world.borrow_mut().scene.spawn(Node::new("panel_root"), None);
    let id = h.quad(QuadLayerOptions::default());
    h.renderer.layer_mut(id).unwrap().core_mut().parent = Some(root);
    (root, id)
}

fn set_node_visible(h: &Harness, node: NodeId, visible: bool) {
    h.world.borrow_mut().scene.node_mut(node).unwrap().visible = visible;
}

fn is_native(h: &Harness, id: LayerId) -> bool {
    h.renderer.layer(id).unwrap().core().is_native()
}

// --- Session start ---

#[test]
fn test_session_start_binds_registered_layers() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    assert!(!is_native(&h, id));

    h.start_session().unwrap();

    assert!(h.renderer.session().has_native_layers());
    assert!(matches!(
        h.renderer.session().base_layer(),
        Some(BaseLayer::Projection(_))
    ));
    assert!(is_native(&h, id));
    assert_eq!(h.host.quad_layers().len(), 1);
    assert_eq!(
        h.renderer.layer(id).unwrap().clip().mask_mode(),
        MaskMode::Alpha
    );
}

#[test]
fn test_depth_mask_without_alpha_clip() {
    let mut h = Harness::with_settings(RendererSettings {
        allow_alpha_clip: false,
        ..RendererSettings::default()
    });
    let id = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    assert_eq!(
        h.renderer.layer(id).unwrap().clip().mask_mode(),
        MaskMode::Depth
    );
}

#[test]
fn test_layers_stay_emulated_without_capability() {
    let mut h = Harness::new();
    h.host.grant_layers(false);
    let id = h.quad(QuadLayerOptions::default());

    h.start_session().unwrap();
    assert!(h.render_frame());
    assert!(h.render_frame());

    assert!(!is_native(&h, id));
    assert!(h.host.live_layers().is_empty());
    assert_eq!(h.host.legacy_layers_created(), 1);
    assert_eq!(
        h.renderer.layer(id).unwrap().clip().mask_mode(),
        MaskMode::None
    );
}

#[test]
fn test_layers_stay_emulated_when_native_is_disallowed() {
    let mut h = Harness::with_settings(RendererSettings {
        allow_native_layers: false,
        ..RendererSettings::default()
    });
    let id = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    assert!(h.render_frame());
    assert!(!is_native(&h, id));
    assert!(h.host.quad_layers().is_empty());
}

#[test]
fn test_failed_negotiation_rearms_the_timer() {
    let mut h = Harness::new();
    h.host
        .reject_next_session(HostError::Rejected("no headset".to_owned()));

    assert!(matches!(
        h.start_session(),
        Err(XrError::SessionNegotiationFailed(_))
    ));
    assert!(matches!(
        h.renderer.frame_driver(),
        Some(FrameDriver::Timer(_))
    ));
    assert!(h.render_frame());
}

#[test]
fn test_request_while_active_is_refused() {
    let mut h = Harness::new();
    h.start_session().unwrap();
    assert!(matches!(
        h.start_session(),
        Err(XrError::SessionAlreadyActive)
    ));
}

// --- Validity ---

#[test]
fn test_zero_width_layer_is_never_bound() {
    let mut h = Harness::new();
    let id = h.quad(options(0.0, 1.0));
    h.start_session().unwrap();

    for _ in 0..3 {
        assert!(h.render_frame());
        assert!(!is_native(&h, id));
    }
    assert!(h.host.quad_layers().is_empty());
}

#[test]
fn test_layer_below_pixel_threshold_is_never_bound() {
    let mut h = Harness::with_settings(RendererSettings {
        min_layer_pixel_area: 200 * 200,
        ..RendererSettings::default()
    });
    let id = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    assert!(h.render_frame());
    assert!(!is_native(&h, id));
}

#[test]
fn test_layer_that_becomes_degenerate_is_unbound() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    assert!(h.render_frame());
    assert!(is_native(&h, id));

    h.renderer.quad_layer_mut(id).unwrap().set_width(0.0);
    assert!(h.render_frame());

    assert!(!is_native(&h, id));
    assert!(h.host.quad_layers().is_empty());
    assert_eq!(
        h.renderer.layer(id).unwrap().clip().mask_mode(),
        MaskMode::None
    );
}

// --- Content upload ---

#[test]
fn test_content_copies_once_per_dirty_update() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    let texture = h.texture(100, 100);
    h.renderer
        .quad_layer_mut(id)
        .unwrap()
        .set_texture(Some(texture.clone()));
    h.start_session().unwrap();

    assert!(h.render_frame());
    assert_eq!(h.gfx.copy_count(), 1, "binding forces an initial copy");

    texture.mark_updated();
    texture.mark_updated();
    assert!(h.render_frame());
    assert_eq!(h.gfx.copy_count(), 2, "two updates, one copy");
    assert!(!h.renderer.layer(id).unwrap().core().content_dirty());

    assert!(h.render_frame());
    assert!(h.render_frame());
    assert_eq!(h.gfx.copy_count(), 2, "clean layers never copy");

    let handle = h.renderer.layer(id).unwrap().core().native().unwrap();
    h.host.request_redraw(handle);
    assert!(h.render_frame());
    assert_eq!(h.gfx.copy_count(), 3, "host redraw requests force a copy");
}

#[test]
fn test_copies_land_in_the_host_image() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    let texture = h.texture(100, 100);
    h.renderer
        .quad_layer_mut(id)
        .unwrap()
        .set_texture(Some(texture.clone()));
    h.start_session().unwrap();
    assert!(h.render_frame());

    let handle = h.renderer.layer(id).unwrap().core().native().unwrap();
    let image = h
        .host
        .layer(handle)
        .and_then(|layer| layer.color_texture(Eye::None));
    assert_eq!(h.gfx.copies(), vec![(texture.id(), image)]);
}

#[test]
fn test_stereo_layers_copy_per_eye() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions {
        layout: LayerLayout::Stereo,
        ..QuadLayerOptions::default()
    });
    let texture = h.texture(100, 100);
    h.renderer
        .quad_layer_mut(id)
        .unwrap()
        .set_texture(Some(texture));
    h.start_session().unwrap();
    assert!(h.render_frame());

    assert_eq!(h.gfx.copy_count(), 2);
    assert_eq!(h.renderer.layer(id).unwrap().core().render_target_count(), 2);
}

#[test]
fn test_content_size_reconstructs_the_host_layer() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    let texture = h.texture(256, 128);
    {
        let layer = h.renderer.quad_layer_mut(id).unwrap();
        layer.core_mut().use_content_size = true;
        layer.set_texture(Some(texture));
    }
    h.start_session().unwrap();
    let first = h.renderer.layer(id).unwrap().core().native();

    assert!(h.render_frame());
    assert!(h.render_frame());

    let layer = h.renderer.quad_layer_mut(id).unwrap();
    assert_eq!(layer.options().view_pixel_width, 256);
    assert_eq!(layer.options().view_pixel_height, 128);
    assert_ne!(layer.core().native(), first);
    assert_eq!(h.host.quad_layers().len(), 1, "the old host layer was released");
}

#[test]
fn test_native_transform_follows_the_layer() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    place(&mut h, id, Vec3::new(0.0, 1.5, -2.0));
    assert!(h.render_frame());

    let handle = h.renderer.layer(id).unwrap().core().native().unwrap();
    let layer = h.host.layer(handle).unwrap();
    assert_eq!(layer.transform.position, Vec3::new(0.0, 1.5, -2.0));
}

#[test]
fn test_construct_hook_fires_after_binding() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    let fired = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&fired);
    h.renderer
        .layer_mut(id)
        .unwrap()
        .core_mut()
        .set_on_construct(move |layer| sink.borrow_mut().push(layer));

    h.start_session().unwrap();
    assert!(h.render_frame());
    assert!(h.render_frame());

    assert_eq!(*fired.borrow(), vec![id]);
}

// --- Reconciliation ---

#[test]
fn test_native_order_commits_only_when_it_changes() {
    let mut h = Harness::new();
    let near = h.quad(QuadLayerOptions::default());
    let far = h.quad(QuadLayerOptions::default());
    place(&mut h, near, Vec3::new(0.0, 1.6, -1.0));
    place(&mut h, far, Vec3::new(0.0, 1.6, -4.0));
    h.start_session().unwrap();

    assert!(h.render_frame());
    assert_eq!(h.renderer.sorted_layers(), &[far, near]);
    let commits = h.host.render_state_updates();

    assert!(h.render_frame());
    assert!(h.render_frame());
    assert_eq!(h.host.render_state_updates(), commits);

    place(&mut h, near, Vec3::new(0.0, 1.6, -8.0));
    assert!(h.render_frame());
    assert_eq!(h.renderer.sorted_layers(), &[near, far]);
    assert_eq!(h.host.render_state_updates(), commits + 1);

    let handle = |id| h.renderer.layer(id).unwrap().core().native().unwrap();
    let base = match h.renderer.session().base_layer() {
        Some(BaseLayer::Projection(base)) => base,
        other => panic!("unexpected base layer {other:?}"),
    };
    assert_eq!(
        h.host.last_render_state(),
        Some(RenderState::Layers(vec![handle(near), handle(far), base]))
    );
}

#[test]
fn test_hidden_layers_leave_the_native_order() {
    let mut h = Harness::new();
    let a = h.quad(QuadLayerOptions::default());
    let b = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    assert!(h.render_frame());
    assert_eq!(h.renderer.sorted_layers().len(), 2);

    h.renderer.layer_mut(a).unwrap().core_mut().visible = false;
    assert!(h.render_frame());
    assert_eq!(h.renderer.sorted_layers(), &[b]);
}

#[test]
fn test_hidden_parent_removes_layer_from_composition() {
    let mut h = Harness::new();
    let (root, id) = parented_quad(&mut h);
    h.start_session().unwrap();
    assert!(h.render_frame());
    assert_eq!(h.renderer.sorted_layers(), &[id]);

    set_node_visible(&h, root, false);
    h.gfx.clear();
    assert!(h.render_frame());

    assert!(h.renderer.sorted_layers().is_empty());
    let base = match h.renderer.session().base_layer() {
        Some(BaseLayer::Projection(base)) => base,
        other => panic!("unexpected base layer {other:?}"),
    };
    assert_eq!(
        h.host.last_render_state(),
        Some(RenderState::Layers(vec![base]))
    );
    assert_eq!(h.gfx.draws(), 0, "the clip mask is not drawn either");
    assert!(!h.renderer.layer(id).unwrap().core().is_rendered());

    set_node_visible(&h, root, true);
    assert!(h.render_frame());
    assert_eq!(h.renderer.sorted_layers(), &[id]);
}

#[test]
fn test_parent_in_another_pass_hides_emulated_layer() {
    let mut h = Harness::new();
    let (root, _id) = parented_quad(&mut h);
    h.world.borrow_mut().scene.node_mut(root).unwrap().pass = Some(7);

    assert!(h.render_frame());
    assert_eq!(h.gfx.draws(), 0);

    h.world.borrow_mut().scene.node_mut(root).unwrap().pass = None;
    assert!(h.render_frame());
    assert_eq!(h.gfx.draws(), 1);
}

#[test]
fn test_destroying_a_layer_releases_host_and_gpu_objects() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    let texture = h.texture(100, 100);
    h.renderer
        .quad_layer_mut(id)
        .unwrap()
        .set_texture(Some(texture));
    h.start_session().unwrap();
    assert!(h.render_frame());
    let framebuffers = h.gfx.live_framebuffers();

    h.renderer.destroy_layer(id).unwrap();

    assert!(h.host.quad_layers().is_empty());
    assert!(h.gfx.live_framebuffers() < framebuffers);
    assert_eq!(h.gfx.live_programs(), 0);
    assert!(h.renderer.sorted_layers().is_empty());
    assert!(matches!(
        h.renderer.destroy_layer(id),
        Err(XrError::InvalidLayerState { .. })
    ));
}

#[test]
fn test_reserved_kinds_cannot_be_created() {
    let mut h = Harness::new();
    assert!(matches!(
        h.renderer
            .create_layer(LayerKind::Sphere, QuadLayerOptions::default()),
        Err(XrError::UnsupportedLayer(LayerKind::Sphere))
    ));
}

// --- Drawing ---

#[test]
fn test_stereo_frame_clears_once_and_resolves() {
    let mut h = Harness::new();
    h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    h.gfx.clear();

    assert!(h.render_frame());

    assert_eq!(h.gfx.blits(), vec![BufferMask::COLOR | BufferMask::DEPTH]);
    // one clear of the default surface, one of the first view
    assert_eq!(h.gfx.clears(), 2);
    assert_eq!(h.gfx.draws(), 2, "the clip is drawn once per eye");
}

#[test]
fn test_stereo_frame_resets_bindings_before_layer_copies() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    let texture = h.texture(100, 100);
    h.renderer
        .quad_layer_mut(id)
        .unwrap()
        .set_texture(Some(texture.clone()));
    h.start_session().unwrap();
    assert!(h.render_frame());
    assert!(is_native(&h, id));

    texture.mark_updated();
    h.gfx.clear();
    assert!(h.render_frame());

    let calls = h.gfx.calls();
    let last_draw = calls
        .iter()
        .rposition(|call| matches!(call, GraphicsCall::DrawIndexed { .. }))
        .unwrap();
    let reset = calls
        .iter()
        .position(|call| matches!(call, GraphicsCall::ResetBindingState))
        .unwrap();
    let first_copy = calls
        .iter()
        .position(|call| matches!(call, GraphicsCall::CopyTexSubImage { .. }))
        .unwrap();

    assert!(last_draw < reset, "bindings reset after the per-eye draws");
    assert!(reset < first_copy, "layers reconcile after the scene draw");
    assert_eq!(h.gfx.count(|call| matches!(call, GraphicsCall::ResetBindingState)), 1);
}

#[test]
fn test_flat_frame_draws_emulated_layers() {
    let mut h = Harness::new();
    h.quad(QuadLayerOptions::default());
    assert!(h.render_frame());
    assert_eq!(h.gfx.draws(), 1);
    assert!(h.gfx.blits().is_empty());
}

#[test]
fn test_tracked_node_follows_the_grip() {
    let mut h = Harness::new();
    let node = h.world.borrow_mut().scene.spawn(Node::new("controller"), None);
    let source = InputSourceId(3);
    h.host.set_input_sources(vec![InputSource {
        id: source,
        handedness: Handedness::Left,
        has_grip: true,
    }]);
    let grip = RigidTransform::new(Vec3::new(-0.2, 1.2, -0.3), Quaternion::IDENTITY);
    h.host.set_grip_pose(source, Some(grip));
    h.renderer.track_input_source(node, Some(source));
    h.start_session().unwrap();

    assert!(h.render_frame());
    {
        let world = h.world.borrow();
        let controller = world.scene.node(node).unwrap();
        assert!(controller.visible);
        assert_eq!(controller.world_matrix().translation(), grip.position);
    }

    h.renderer.track_input_source(node, None);
    assert!(h.render_frame());
    assert!(!h.world.borrow().scene.node(node).unwrap().visible);
}

#[test]
fn test_offscreen_target_forces_the_flat_path() {
    let mut h = Harness::new();
    h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    let framebuffer: FramebufferId = h.renderer.gfx_mut().create_framebuffer().unwrap();
    let target = OffscreenTarget {
        framebuffer,
        width: 32,
        height: 32,
    };
    h.gfx.clear();

    let world = Rc::clone(&h.world);
    h.renderer.request_frame(move |renderer, _| {
        let mut world = world.borrow_mut();
        let common::World { scene, camera } = &mut *world;
        let mut options = RenderOptions::new(scene, camera);
        options.target = Some(target);
        renderer.render(options).unwrap();
    });
    assert!(h.tick());

    assert_eq!(h.gfx.draws(), 1, "one view only");
    assert!(h.gfx.blits().is_empty());
}

// --- Frame loop ---

#[test]
fn test_callbacks_survive_a_driver_swap() {
    let mut h = Harness::new();
    let frames = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&frames);
    h.renderer
        .request_frame(move |_, info| sink.borrow_mut().push(info.frame.is_some()));
    assert!(matches!(
        h.renderer.frame_driver(),
        Some(FrameDriver::Timer(_))
    ));

    h.start_session().unwrap();
    assert_eq!(h.timer.pending(), None, "the timer request was cancelled");
    assert!(matches!(
        h.renderer.frame_driver(),
        Some(FrameDriver::Session(_))
    ));

    assert!(h.tick());
    assert_eq!(*frames.borrow(), vec![true]);
}

#[test]
fn test_callbacks_registered_during_a_tick_run_on_the_next() {
    let mut h = Harness::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let outer = Rc::clone(&order);
    h.renderer.request_frame(move |renderer, _| {
        outer.borrow_mut().push("outer");
        let inner = Rc::clone(&outer);
        renderer.request_frame(move |_, _| inner.borrow_mut().push("inner"));
    });

    assert!(h.tick());
    assert_eq!(*order.borrow(), vec!["outer"]);
    assert!(h.tick());
    assert_eq!(*order.borrow(), vec!["outer", "inner"]);
}

#[test]
fn test_cancelled_callbacks_never_fire() {
    let mut h = Harness::new();
    let fired = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&fired);
    let id = h.renderer.request_frame(move |_, _| *counter.borrow_mut() += 1);

    assert!(h.renderer.cancel_frame(id));
    assert!(h.tick());
    assert_eq!(*fired.borrow(), 0);
    assert!(!h.renderer.cancel_frame(id));
}

#[test]
fn test_stale_signals_are_ignored() {
    let mut h = Harness::new();
    let fired = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&fired);
    h.renderer.request_frame(move |_, _| *counter.borrow_mut() += 1);

    let stale = FrameSignal::Timer {
        request: TimerRequestId(u64::MAX),
        time: 0.0,
    };
    assert!(!h.renderer.dispatch_frame(stale));
    assert_eq!(*fired.borrow(), 0);

    assert!(h.tick());
    assert_eq!(*fired.borrow(), 1);
}

// --- Session loss ---

#[test]
fn test_host_end_unbinds_layers_and_resumes_the_timer() {
    let mut h = Harness::new();
    let a = h.quad(QuadLayerOptions::default());
    let b = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();
    assert!(h.render_frame());
    assert!(is_native(&h, a) && is_native(&h, b));

    h.host.end_session();
    let events = h.renderer.pump_session_events();
    assert_eq!(events.last(), Some(&SessionEvent::Ended));

    for id in [a, b] {
        let layer = h.renderer.layer(id).unwrap();
        assert!(!layer.core().is_native());
        assert_eq!(layer.clip().mask_mode(), MaskMode::None);
        assert!(layer.clip().is_visible());
        assert_eq!(layer.core().render_target_count(), 0);
    }
    assert!(matches!(
        h.renderer.frame_driver(),
        Some(FrameDriver::Timer(_))
    ));
    assert!(h.timer.pending().is_some());

    let draws = h.gfx.draws();
    assert!(h.render_frame());
    assert_eq!(h.gfx.draws(), draws + 2, "both layers drawn as geometry");
}

#[test]
fn test_loss_inside_a_tick_recovers_on_the_next_one() {
    let mut h = Harness::new();
    let id = h.quad(QuadLayerOptions::default());
    h.start_session().unwrap();

    let host = h.host.clone();
    h.renderer.request_frame(move |_, _| host.end_session());
    assert!(h.tick());
    assert!(matches!(
        h.renderer.frame_driver(),
        Some(FrameDriver::Timer(_))
    ));

    assert!(h.render_frame());
    assert!(!h.renderer.session().is_active());
    assert!(!is_native(&h, id));
}

#[test]
fn test_explicit_end_then_new_session_restores_layers() {
    let mut h = Harness::new();
    let ids: Vec<LayerId> = (0..3).map(|_| h.quad(QuadLayerOptions::default())).collect();
    h.start_session().unwrap();
    assert!(h.render_frame());

    h.renderer.end_xr().unwrap();
    assert!(!h.renderer.session().is_active());
    assert!(h.host.live_layers().is_empty());
    assert!(h.renderer.sorted_layers().is_empty());

    h.start_session().unwrap();
    assert!(h.render_frame());

    let mut registered = h.renderer.layers().ids();
    registered.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(registered, expected);
    assert!(ids.iter().all(|id| is_native(&h, *id)));
    assert_eq!(h.host.quad_layers().len(), 3);
}
