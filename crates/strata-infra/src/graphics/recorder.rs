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

//! Call recording shared between a [`HeadlessGraphicsContext`](super::HeadlessGraphicsContext)
//! and the code observing it.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use strata_core::graphics::{
    Attachment, BlitFilter, BufferMask, FramebufferId, FramebufferTarget, PipelineState, ProgramId,
    RenderbufferFormat, RenderbufferId, TextureId, VertexArrayId, Viewport,
};

/// One recorded graphics call.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsCall {
    /// `create_framebuffer`.
    CreateFramebuffer(FramebufferId),
    /// `destroy_framebuffer`.
    DestroyFramebuffer(FramebufferId),
    /// `bind_framebuffer`.
    BindFramebuffer {
        /// Binding point.
        target: FramebufferTarget,
        /// Bound object, `None` for the default surface.
        framebuffer: Option<FramebufferId>,
    },
    /// `framebuffer_texture_2d`.
    FramebufferTexture {
        /// Framebuffer the attachment went to.
        framebuffer: Option<FramebufferId>,
        /// Slot.
        attachment: Attachment,
        /// Attached texture, `None` when detaching.
        texture: Option<TextureId>,
    },
    /// `framebuffer_texture_2d_multisample`.
    FramebufferTextureMultisample {
        /// Framebuffer the attachment went to.
        framebuffer: Option<FramebufferId>,
        /// Slot.
        attachment: Attachment,
        /// Attached texture.
        texture: TextureId,
        /// Sample count.
        samples: u32,
    },
    /// `create_renderbuffer`.
    CreateRenderbuffer(RenderbufferId),
    /// `destroy_renderbuffer`.
    DestroyRenderbuffer(RenderbufferId),
    /// `renderbuffer_storage_multisample`.
    RenderbufferStorage {
        /// Renderbuffer.
        renderbuffer: RenderbufferId,
        /// Sample count.
        samples: u32,
        /// Format.
        format: RenderbufferFormat,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// `framebuffer_renderbuffer`.
    FramebufferRenderbuffer {
        /// Framebuffer the attachment went to.
        framebuffer: Option<FramebufferId>,
        /// Slot.
        attachment: Attachment,
        /// Attached renderbuffer.
        renderbuffer: Option<RenderbufferId>,
    },
    /// `bind_texture`.
    BindTexture {
        /// Texture unit.
        unit: u32,
        /// Bound texture.
        texture: Option<TextureId>,
    },
    /// `copy_tex_sub_image_2d`, resolved against the bindings at call time.
    CopyTexSubImage {
        /// Color attachment of the read framebuffer.
        source: Option<TextureId>,
        /// Texture bound on unit 0.
        destination: Option<TextureId>,
        /// Copied region.
        region: Viewport,
    },
    /// `blit_framebuffer`.
    Blit {
        /// Read framebuffer at call time.
        read: Option<FramebufferId>,
        /// Draw framebuffer at call time.
        draw: Option<FramebufferId>,
        /// Source rectangle.
        src: Viewport,
        /// Destination rectangle.
        dst: Viewport,
        /// Blitted planes.
        mask: BufferMask,
        /// Filter.
        filter: BlitFilter,
    },
    /// `invalidate_framebuffer`.
    Invalidate {
        /// Binding point.
        target: FramebufferTarget,
        /// Discarded attachments.
        attachments: Vec<Attachment>,
    },
    /// `viewport`.
    Viewport(Viewport),
    /// `set_clear_color`.
    SetClearColor([f32; 4]),
    /// `clear`.
    Clear {
        /// Draw framebuffer at call time.
        framebuffer: Option<FramebufferId>,
        /// Cleared planes.
        mask: BufferMask,
    },
    /// `create_program`.
    CreateProgram(ProgramId),
    /// `destroy_program`.
    DestroyProgram(ProgramId),
    /// `use_program`.
    UseProgram(Option<ProgramId>),
    /// `write_uniforms`.
    WriteUniforms {
        /// Program.
        program: ProgramId,
        /// Uploaded byte count.
        size: usize,
    },
    /// `create_vertex_array`.
    CreateVertexArray(VertexArrayId),
    /// `destroy_vertex_array`.
    DestroyVertexArray(VertexArrayId),
    /// `draw_indexed`.
    DrawIndexed {
        /// Draw framebuffer at call time.
        framebuffer: Option<FramebufferId>,
        /// Current program.
        program: Option<ProgramId>,
        /// Vertex array.
        vertex_array: VertexArrayId,
        /// Index count.
        index_count: u32,
        /// Fixed-function state.
        state: PipelineState,
    },
    /// `reset_binding_state`.
    ResetBindingState,
}

#[derive(Debug, Default)]
pub(super) struct LogState {
    pub(super) calls: Vec<GraphicsCall>,
    pub(super) framebuffers: BTreeSet<FramebufferId>,
    pub(super) renderbuffers: BTreeSet<RenderbufferId>,
    pub(super) programs: BTreeSet<ProgramId>,
    pub(super) vertex_arrays: BTreeSet<VertexArrayId>,
    pub(super) fail_programs: Option<String>,
}

/// Shared view of everything a headless context did.
///
/// Cloning the log is cheap; every clone observes the same context.
#[derive(Debug, Clone, Default)]
pub struct GraphicsLog {
    pub(super) state: Rc<RefCell<LogState>>,
}

impl GraphicsLog {
    pub(super) fn record(&self, call: GraphicsCall) {
        log::trace!("gfx: {:?}", call);
        self.state.borrow_mut().calls.push(call);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<GraphicsCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded calls. Use as a mark for [`GraphicsLog::calls_since`].
    pub fn len(&self) -> usize {
        self.state.borrow().calls.len()
    }

    /// `true` before the first call.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls recorded after `mark`.
    pub fn calls_since(&self, mark: usize) -> Vec<GraphicsCall> {
        self.state
            .borrow()
            .calls
            .get(mark..)
            .map(<[GraphicsCall]>::to_vec)
            .unwrap_or_default()
    }

    /// Forgets the recorded calls. Live object tracking is kept.
    pub fn clear(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Counts the calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&GraphicsCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|call| pred(call)).count()
    }

    /// Texture copies as `(source, destination)` pairs.
    pub fn copies(&self) -> Vec<(Option<TextureId>, Option<TextureId>)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                GraphicsCall::CopyTexSubImage {
                    source,
                    destination,
                    ..
                } => Some((*source, *destination)),
                _ => None,
            })
            .collect()
    }

    /// Number of texture copies.
    pub fn copy_count(&self) -> usize {
        self.count(|call| matches!(call, GraphicsCall::CopyTexSubImage { .. }))
    }

    /// Blitted plane masks, in order.
    pub fn blits(&self) -> Vec<BufferMask> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                GraphicsCall::Blit { mask, .. } => Some(*mask),
                _ => None,
            })
            .collect()
    }

    /// Number of `invalidate_framebuffer` calls.
    pub fn invalidations(&self) -> usize {
        self.count(|call| matches!(call, GraphicsCall::Invalidate { .. }))
    }

    /// Number of `clear` calls.
    pub fn clears(&self) -> usize {
        self.count(|call| matches!(call, GraphicsCall::Clear { .. }))
    }

    /// Number of draw calls.
    pub fn draws(&self) -> usize {
        self.count(|call| matches!(call, GraphicsCall::DrawIndexed { .. }))
    }

    /// Framebuffers created and not yet destroyed.
    pub fn live_framebuffers(&self) -> usize {
        self.state.borrow().framebuffers.len()
    }

    /// Renderbuffers created and not yet destroyed.
    pub fn live_renderbuffers(&self) -> usize {
        self.state.borrow().renderbuffers.len()
    }

    /// Programs created and not yet destroyed.
    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// Vertex arrays created and not yet destroyed.
    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    /// Makes every following `create_program` fail to link with `message`.
    /// `None` restores normal behavior.
    pub fn fail_program_creation(&self, message: Option<&str>) {
        self.state.borrow_mut().fail_programs = message.map(str::to_owned);
    }
}
