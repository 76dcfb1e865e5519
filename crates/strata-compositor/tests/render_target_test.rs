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

//! Integration tests for render targets against the headless context.

use std::rc::Rc;
use strata_compositor::{MsaaMode, RenderTarget};
use strata_core::graphics::{
    BufferMask, ContentTexture, GraphicsCapabilities, ResourceError, TextureId, Viewport,
};
use strata_core::host::SubImage;
use strata_infra::{GraphicsCall, GraphicsLog, HeadlessGraphicsContext};

fn sub_image(gfx: &mut HeadlessGraphicsContext, with_depth: bool) -> SubImage {
    SubImage {
        color_texture: gfx.create_texture(),
        depth_stencil_texture: with_depth.then(|| gfx.create_texture()),
        viewport: Viewport::sized(64, 64),
        texture_width: 128,
        texture_height: 64,
    }
}

fn invalidating() -> (HeadlessGraphicsContext, GraphicsLog) {
    HeadlessGraphicsContext::with_capabilities(GraphicsCapabilities {
        invalidate_framebuffer: true,
        ..GraphicsCapabilities::default()
    })
}

// --- Lifetime ---

#[test]
fn test_destroy_is_idempotent() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    assert_eq!(log.live_framebuffers(), 1);

    target.destroy(&mut gfx);
    target.destroy(&mut gfx);

    assert!(target.is_destroyed());
    assert_eq!(log.live_framebuffers(), 0);
    assert_eq!(
        log.count(|call| matches!(call, GraphicsCall::DestroyFramebuffer(_))),
        1
    );
}

#[test]
fn test_destroyed_target_refuses_attachments() {
    let (mut gfx, _log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, false);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.destroy(&mut gfx);

    assert!(matches!(
        target.attach(&mut gfx, image, false),
        Err(ResourceError::InvalidHandle)
    ));
}

#[test]
fn test_resolve_target_releases_every_object() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, true);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, image, true).unwrap();
    assert_eq!(log.live_framebuffers(), 2, "render and copy framebuffers");
    assert_eq!(log.live_renderbuffers(), 2, "color and depth storage");

    target.destroy(&mut gfx);
    assert_eq!(log.live_framebuffers(), 0);
    assert_eq!(log.live_renderbuffers(), 0);
    assert_eq!(target.msaa(), MsaaMode::Off);
}

// --- Attachment ---

#[test]
fn test_identical_attachment_records_nothing() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, true);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, image, false).unwrap();

    let mark = log.len();
    target.attach(&mut gfx, image, false).unwrap();
    assert!(log.calls_since(mark).is_empty());
    assert!(target.has_depth());
}

#[test]
fn test_shared_color_texture_is_adopted_without_calls() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let left = sub_image(&mut gfx, false);
    let right = SubImage {
        viewport: Viewport {
            x: 64,
            ..left.viewport
        },
        ..left
    };
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, left, false).unwrap();

    let mark = log.len();
    target.attach(&mut gfx, right, false).unwrap();
    assert!(log.calls_since(mark).is_empty());
    assert_eq!(target.attachment(), Some(&right));
}

#[test]
fn test_msaa_mode_follows_capabilities() {
    let (mut gfx, log) = HeadlessGraphicsContext::with_capabilities(GraphicsCapabilities {
        multisampled_render_to_texture: true,
        ..GraphicsCapabilities::default()
    });
    let image = sub_image(&mut gfx, false);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, image, true).unwrap();

    assert_eq!(target.msaa(), MsaaMode::Implicit);
    assert_eq!(
        log.count(|call| matches!(call, GraphicsCall::FramebufferTextureMultisample { .. })),
        1
    );

    let mark = log.len();
    target.blit(&mut gfx);
    assert!(log.calls_since(mark).is_empty(), "implicit targets resolve themselves");
}

#[test]
fn test_size_comes_from_the_viewport() {
    let (mut gfx, _log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, false);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    assert_eq!((target.width(), target.height()), (0, 0));

    target.attach(&mut gfx, image, false).unwrap();
    assert_eq!((target.width(), target.height()), (64, 64));
}

// --- Resolve ---

#[test]
fn test_resolve_blits_color_and_depth() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, true);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, image, true).unwrap();
    assert_eq!(target.msaa(), MsaaMode::Resolve);

    target.blit(&mut gfx);
    assert_eq!(log.blits(), vec![BufferMask::COLOR | BufferMask::DEPTH]);
    assert_eq!(log.invalidations(), 0);
}

#[test]
fn test_resolve_skips_ignored_depth() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, true);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.ignore_depth = true;
    target.attach(&mut gfx, image, true).unwrap();

    target.blit(&mut gfx);
    assert_eq!(log.blits(), vec![BufferMask::COLOR]);
    assert_eq!(log.invalidations(), 0, "the context cannot invalidate");
}

#[test]
fn test_resolve_invalidates_when_supported() {
    let (mut gfx, log) = invalidating();
    let image = sub_image(&mut gfx, true);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.ignore_depth = true;
    target.attach(&mut gfx, image, true).unwrap();

    target.blit(&mut gfx);
    assert_eq!(log.blits(), vec![BufferMask::COLOR]);
    // depth on both sides before, everything after
    assert_eq!(log.invalidations(), 4);
}

#[test]
fn test_blit_without_resolve_is_a_no_op() {
    let (mut gfx, log) = invalidating();
    let image = sub_image(&mut gfx, true);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, image, false).unwrap();

    let mark = log.len();
    target.blit(&mut gfx);
    assert!(log.calls_since(mark).is_empty());
}

// --- Copies ---

#[test]
fn test_copy_from_pending_texture_does_nothing() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, false);
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, image, false).unwrap();

    let pending = Rc::new(ContentTexture::pending(64, 64));
    assert!(!target.copy_from(&mut gfx, &pending).unwrap());
    assert_eq!(log.copy_count(), 0);
}

#[test]
fn test_copy_lands_in_the_attached_image() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, false);
    let content = Rc::new(ContentTexture::new(gfx.create_texture(), 64, 64));
    let mut target = RenderTarget::new(&mut gfx).unwrap();
    target.attach(&mut gfx, image, false).unwrap();

    assert!(target.copy_from(&mut gfx, &content).unwrap());
    assert_eq!(log.copies(), vec![(content.id(), Some(image.color_texture))]);
    assert!(log.calls().contains(&GraphicsCall::CopyTexSubImage {
        source: content.id(),
        destination: Some(image.color_texture),
        region: Viewport::sized(64, 64),
    }));
}

#[test]
fn test_copy_before_attach_waits_for_the_image() {
    let (mut gfx, log) = HeadlessGraphicsContext::new();
    let image = sub_image(&mut gfx, false);
    let content = Rc::new(ContentTexture::new(TextureId(900), 32, 16));
    let mut target = RenderTarget::new(&mut gfx).unwrap();

    assert!(!target.copy_from(&mut gfx, &content).unwrap());
    assert!(target.is_virtual());
    assert_eq!((target.width(), target.height()), (32, 16));
    assert_eq!(log.copy_count(), 0);

    target.attach(&mut gfx, image, false).unwrap();
    assert!(!target.is_virtual());
    assert_eq!(log.copies(), vec![(Some(TextureId(900)), Some(image.color_texture))]);
}
