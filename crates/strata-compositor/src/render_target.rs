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

//! Framebuffer wrapper bridging host sub-images and application textures.
//!
//! Host layer images are write-only destinations: they can be attached to a
//! framebuffer but not sampled. Content therefore reaches them through
//! framebuffer copies ([`RenderTarget::copy_from`]) or by rendering into the
//! framebuffer directly, in which case a multisampled target may need an
//! explicit resolve ([`RenderTarget::blit`]).

use std::rc::Rc;
use strata_core::graphics::{
    Attachment, BlitFilter, BufferMask, ContentTexture, FramebufferId, FramebufferTarget,
    GraphicsContext, RenderbufferFormat, RenderbufferId, ResourceError, TextureId, Viewport,
};
use strata_core::host::SubImage;

/// How a target is multisampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsaaMode {
    /// Single-sampled, the sub-image textures are attached directly.
    #[default]
    Off,
    /// The context resolves implicitly into the attached textures.
    Implicit,
    /// Multisampled renderbuffers, resolved by [`RenderTarget::blit`].
    Resolve,
}

/// Owns one framebuffer (plus an optional copy framebuffer and multisample
/// renderbuffers) bound to a host sub-image.
#[derive(Debug)]
pub struct RenderTarget {
    framebuffer: Option<FramebufferId>,
    copy_framebuffer: Option<FramebufferId>,
    renderbuffers: Vec<RenderbufferId>,
    attachment: Option<SubImage>,
    referenced: Option<Rc<ContentTexture>>,
    msaa: MsaaMode,
    /// Skip depth in the resolve, set for layers whose depth the host ignores.
    pub ignore_depth: bool,
}

impl RenderTarget {
    /// Allocates the framebuffer object. Attachments come later through [`RenderTarget::attach`].
    pub fn new(gfx: &mut dyn GraphicsContext) -> Result<Self, ResourceError> {
        Ok(Self {
            framebuffer: Some(gfx.create_framebuffer()?),
            copy_framebuffer: None,
            renderbuffers: Vec::new(),
            attachment: None,
            referenced: None,
            msaa: MsaaMode::Off,
            ignore_depth: false,
        })
    }

    /// The framebuffer to render into, `None` once destroyed.
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// The attached sub-image.
    pub fn attachment(&self) -> Option<&SubImage> {
        self.attachment.as_ref()
    }

    /// Current multisample mode.
    pub fn msaa(&self) -> MsaaMode {
        self.msaa
    }

    /// Width of the attached region, or of the waiting texture.
    pub fn width(&self) -> u32 {
        match (&self.attachment, &self.referenced) {
            (Some(sub), _) => sub.viewport.width,
            (None, Some(tex)) => tex.width(),
            (None, None) => 0,
        }
    }

    /// Height of the attached region, or of the waiting texture.
    pub fn height(&self) -> u32 {
        match (&self.attachment, &self.referenced) {
            (Some(sub), _) => sub.viewport.height,
            (None, Some(tex)) => tex.height(),
            (None, None) => 0,
        }
    }

    /// `true` while only a waiting texture is known and nothing is attached.
    pub fn is_virtual(&self) -> bool {
        self.attachment.is_none() && self.referenced.is_some()
    }

    /// `true` when the attachment has a depth image.
    pub fn has_depth(&self) -> bool {
        self.attachment
            .and_then(|sub| sub.depth_stencil_texture)
            .is_some()
    }

    /// `true` after [`RenderTarget::destroy`].
    pub fn is_destroyed(&self) -> bool {
        self.framebuffer.is_none()
    }

    /// Binds the target to `sub_image`.
    ///
    /// Re-attaching the same sub-image with the same MSAA request does nothing.
    /// A sub-image sharing the current color texture is adopted without
    /// touching the framebuffer. Anything else reallocates attachments.
    pub fn attach(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        sub_image: SubImage,
        use_msaa: bool,
    ) -> Result<(), ResourceError> {
        let framebuffer = self.framebuffer.ok_or(ResourceError::InvalidHandle)?;
        let caps = gfx.capabilities();
        let mode = match (use_msaa, caps.multisampled_render_to_texture) {
            (false, _) => MsaaMode::Off,
            (true, true) => MsaaMode::Implicit,
            (true, false) => MsaaMode::Resolve,
        };

        if mode == self.msaa {
            if let Some(current) = &self.attachment {
                if *current == sub_image {
                    return Ok(());
                }
                if current.color_texture == sub_image.color_texture {
                    self.attachment = Some(sub_image);
                    return Ok(());
                }
            }
        }

        self.msaa = mode;
        self.attachment = Some(sub_image);

        for rb in self.renderbuffers.drain(..) {
            gfx.destroy_renderbuffer(rb);
        }

        if mode == MsaaMode::Resolve && self.copy_framebuffer.is_none() {
            self.copy_framebuffer = Some(gfx.create_framebuffer()?);
        }

        gfx.bind_framebuffer(FramebufferTarget::Framebuffer, Some(self.texture_framebuffer()?));
        self.attach_texture(gfx, Attachment::Color0, sub_image.color_texture, caps.max_samples);
        if let Some(depth) = sub_image.depth_stencil_texture {
            self.attach_texture(gfx, Attachment::Depth, depth, caps.max_samples);
        }

        if let Some(waiting) = self.referenced.take() {
            self.copy_from(gfx, &waiting)?;
        }

        if mode == MsaaMode::Resolve {
            gfx.bind_framebuffer(FramebufferTarget::Framebuffer, Some(framebuffer));
            self.allocate_multisample(
                gfx,
                Attachment::Color0,
                RenderbufferFormat::Rgba8,
                &sub_image,
                caps.max_samples,
            )?;
            if sub_image.depth_stencil_texture.is_some() {
                self.allocate_multisample(
                    gfx,
                    Attachment::Depth,
                    RenderbufferFormat::Depth24,
                    &sub_image,
                    caps.max_samples,
                )?;
            }
        }

        gfx.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        Ok(())
    }

    /// Copies `texture` into the attached color image.
    ///
    /// Returns `false` when nothing was copied: the texture has no storage yet,
    /// or no sub-image is attached, in which case the texture is kept and
    /// copied by the next [`RenderTarget::attach`].
    pub fn copy_from(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        texture: &Rc<ContentTexture>,
    ) -> Result<bool, ResourceError> {
        let Some(source) = texture.id() else {
            return Ok(false);
        };
        if !texture.is_ready() {
            return Ok(false);
        }
        let Some(sub) = self.attachment else {
            self.referenced = Some(Rc::clone(texture));
            return Ok(false);
        };
        let target = self.texture_framebuffer()?;

        let samples = gfx.capabilities().max_samples;
        gfx.bind_framebuffer(FramebufferTarget::Framebuffer, Some(target));
        gfx.framebuffer_texture_2d(
            FramebufferTarget::Framebuffer,
            Attachment::Color0,
            Some(source),
        );
        gfx.bind_texture(0, Some(sub.color_texture));
        gfx.copy_tex_sub_image_2d(Viewport::sized(self.width(), self.height()));

        // restore the destination
        self.attach_texture(gfx, Attachment::Color0, sub.color_texture, samples);

        gfx.bind_texture(0, None);
        gfx.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        Ok(true)
    }

    /// Resolves the multisample renderbuffers into the sub-image textures.
    /// Only does work in [`MsaaMode::Resolve`].
    pub fn blit(&mut self, gfx: &mut dyn GraphicsContext) {
        if self.msaa != MsaaMode::Resolve {
            return;
        }
        let (Some(sub), Some(framebuffer), Some(copy)) =
            (self.attachment, self.framebuffer, self.copy_framebuffer)
        else {
            return;
        };

        let can_invalidate = gfx.capabilities().invalidate_framebuffer;
        let mut invalidation = vec![Attachment::Color0];

        gfx.bind_framebuffer(FramebufferTarget::Read, Some(framebuffer));
        gfx.bind_framebuffer(FramebufferTarget::Draw, Some(copy));

        let mut mask = BufferMask::COLOR;
        if self.ignore_depth {
            if can_invalidate {
                gfx.invalidate_framebuffer(FramebufferTarget::Read, &[Attachment::Depth]);
                gfx.invalidate_framebuffer(FramebufferTarget::Draw, &[Attachment::Depth]);
            }
            invalidation.push(Attachment::Depth);
        } else {
            mask = mask | BufferMask::DEPTH;
        }

        let full = Viewport::sized(sub.texture_width, sub.texture_height);
        gfx.blit_framebuffer(full, full, mask, BlitFilter::Nearest);

        if can_invalidate {
            gfx.invalidate_framebuffer(FramebufferTarget::Framebuffer, &invalidation);
            gfx.invalidate_framebuffer(FramebufferTarget::Read, &invalidation);
        }

        gfx.bind_framebuffer(FramebufferTarget::Read, None);
        gfx.bind_framebuffer(FramebufferTarget::Framebuffer, None);
    }

    /// Releases every GPU object. Later calls are no-ops.
    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext) {
        let Some(framebuffer) = self.framebuffer.take() else {
            return;
        };
        gfx.destroy_framebuffer(framebuffer);
        if let Some(copy) = self.copy_framebuffer.take() {
            gfx.destroy_framebuffer(copy);
        }
        for rb in self.renderbuffers.drain(..) {
            gfx.destroy_renderbuffer(rb);
        }
        self.attachment = None;
        self.referenced = None;
        self.msaa = MsaaMode::Off;
    }

    /// Framebuffer holding the sub-image textures.
    fn texture_framebuffer(&self) -> Result<FramebufferId, ResourceError> {
        let framebuffer = self.framebuffer.ok_or(ResourceError::InvalidHandle)?;
        Ok(match (self.msaa, self.copy_framebuffer) {
            (MsaaMode::Resolve, Some(copy)) => copy,
            _ => framebuffer,
        })
    }

    fn attach_texture(
        &self,
        gfx: &mut dyn GraphicsContext,
        attachment: Attachment,
        texture: TextureId,
        samples: u32,
    ) {
        if self.msaa == MsaaMode::Implicit {
            gfx.framebuffer_texture_2d_multisample(
                FramebufferTarget::Framebuffer,
                attachment,
                texture,
                samples,
            );
        } else {
            gfx.framebuffer_texture_2d(FramebufferTarget::Framebuffer, attachment, Some(texture));
        }
    }

    fn allocate_multisample(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        attachment: Attachment,
        format: RenderbufferFormat,
        sub: &SubImage,
        samples: u32,
    ) -> Result<(), ResourceError> {
        let rb = gfx.create_renderbuffer()?;
        self.renderbuffers.push(rb);
        gfx.framebuffer_renderbuffer(FramebufferTarget::Framebuffer, attachment, Some(rb));
        gfx.renderbuffer_storage_multisample(
            rb,
            samples,
            format,
            sub.texture_width,
            sub.texture_height,
        )
    }
}
