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

//! A [`GraphicsContext`] without a GPU.

use super::recorder::{GraphicsCall, GraphicsLog};
use std::collections::BTreeMap;
use strata_core::graphics::{
    Attachment, BlitFilter, BufferMask, FramebufferId, FramebufferTarget, GraphicsCapabilities,
    GraphicsContext, PipelineState, ProgramId, RenderbufferFormat, RenderbufferId,
    ResourceError, ShaderError, TextureId, VertexArrayId, Viewport,
};

/// Records calls instead of executing them.
///
/// Binding state is tracked so copies, blits and draws are logged with the
/// objects they actually touch. Ids start at 1 for every object kind.
#[derive(Debug)]
pub struct HeadlessGraphicsContext {
    capabilities: GraphicsCapabilities,
    log: GraphicsLog,
    next_id: u32,

    attachments: BTreeMap<FramebufferId, BTreeMap<Attachment, TextureId>>,
    read_framebuffer: Option<FramebufferId>,
    draw_framebuffer: Option<FramebufferId>,
    texture_units: BTreeMap<u32, TextureId>,
    program: Option<ProgramId>,
}

impl HeadlessGraphicsContext {
    /// A context with default capabilities, plus the log observing it.
    pub fn new() -> (Self, GraphicsLog) {
        Self::with_capabilities(GraphicsCapabilities::default())
    }

    /// A context exposing `capabilities`, plus the log observing it.
    pub fn with_capabilities(capabilities: GraphicsCapabilities) -> (Self, GraphicsLog) {
        let log = GraphicsLog::default();
        let context = Self {
            capabilities,
            log: log.clone(),
            next_id: 1,
            attachments: BTreeMap::new(),
            read_framebuffer: None,
            draw_framebuffer: None,
            texture_units: BTreeMap::new(),
            program: None,
        };
        (context, log)
    }

    /// Allocates an application texture id. Not recorded as a call.
    pub fn create_texture(&mut self) -> TextureId {
        TextureId(self.allocate())
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn bound(&self, target: FramebufferTarget) -> Option<FramebufferId> {
        match target {
            FramebufferTarget::Read => self.read_framebuffer,
            FramebufferTarget::Framebuffer | FramebufferTarget::Draw => self.draw_framebuffer,
        }
    }

    fn set_attachment(
        &mut self,
        framebuffer: Option<FramebufferId>,
        attachment: Attachment,
        texture: Option<TextureId>,
    ) {
        let Some(slots) = framebuffer.and_then(|fb| self.attachments.get_mut(&fb)) else {
            return;
        };
        match texture {
            Some(texture) => slots.insert(attachment, texture),
            None => slots.remove(&attachment),
        };
    }
}

impl GraphicsContext for HeadlessGraphicsContext {
    fn capabilities(&self) -> GraphicsCapabilities {
        self.capabilities
    }

    // --- Framebuffers ---

    fn create_framebuffer(&mut self) -> Result<FramebufferId, ResourceError> {
        let id = FramebufferId(self.allocate());
        self.attachments.insert(id, BTreeMap::new());
        self.log.state.borrow_mut().framebuffers.insert(id);
        self.log.record(GraphicsCall::CreateFramebuffer(id));
        Ok(id)
    }

    fn destroy_framebuffer(&mut self, id: FramebufferId) {
        self.attachments.remove(&id);
        if self.read_framebuffer == Some(id) {
            self.read_framebuffer = None;
        }
        if self.draw_framebuffer == Some(id) {
            self.draw_framebuffer = None;
        }
        self.log.state.borrow_mut().framebuffers.remove(&id);
        self.log.record(GraphicsCall::DestroyFramebuffer(id));
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        match target {
            FramebufferTarget::Framebuffer => {
                self.read_framebuffer = framebuffer;
                self.draw_framebuffer = framebuffer;
            }
            FramebufferTarget::Read => self.read_framebuffer = framebuffer,
            FramebufferTarget::Draw => self.draw_framebuffer = framebuffer,
        }
        self.log.record(GraphicsCall::BindFramebuffer {
            target,
            framebuffer,
        });
    }

    fn framebuffer_texture_2d(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureId>,
    ) {
        let framebuffer = self.bound(target);
        self.set_attachment(framebuffer, attachment, texture);
        self.log.record(GraphicsCall::FramebufferTexture {
            framebuffer,
            attachment,
            texture,
        });
    }

    fn framebuffer_texture_2d_multisample(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: TextureId,
        samples: u32,
    ) {
        let framebuffer = self.bound(target);
        self.set_attachment(framebuffer, attachment, Some(texture));
        self.log.record(GraphicsCall::FramebufferTextureMultisample {
            framebuffer,
            attachment,
            texture,
            samples,
        });
    }

    // --- Renderbuffers ---

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId, ResourceError> {
        let id = RenderbufferId(self.allocate());
        self.log.state.borrow_mut().renderbuffers.insert(id);
        self.log.record(GraphicsCall::CreateRenderbuffer(id));
        Ok(id)
    }

    fn destroy_renderbuffer(&mut self, id: RenderbufferId) {
        self.log.state.borrow_mut().renderbuffers.remove(&id);
        self.log.record(GraphicsCall::DestroyRenderbuffer(id));
    }

    fn renderbuffer_storage_multisample(
        &mut self,
        renderbuffer: RenderbufferId,
        samples: u32,
        format: RenderbufferFormat,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        if samples > self.capabilities.max_samples {
            return Err(ResourceError::Unsupported(format!(
                "{samples} samples requested, at most {} available",
                self.capabilities.max_samples
            )));
        }
        if !self.log.state.borrow().renderbuffers.contains(&renderbuffer) {
            return Err(ResourceError::InvalidHandle);
        }
        self.log.record(GraphicsCall::RenderbufferStorage {
            renderbuffer,
            samples,
            format,
            width,
            height,
        });
        Ok(())
    }

    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferId>,
    ) {
        let framebuffer = self.bound(target);
        // a renderbuffer hides whatever texture was attached there
        self.set_attachment(framebuffer, attachment, None);
        self.log.record(GraphicsCall::FramebufferRenderbuffer {
            framebuffer,
            attachment,
            renderbuffer,
        });
    }

    // --- Textures and transfers ---

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(texture) => self.texture_units.insert(unit, texture),
            None => self.texture_units.remove(&unit),
        };
        self.log.record(GraphicsCall::BindTexture { unit, texture });
    }

    fn copy_tex_sub_image_2d(&mut self, region: Viewport) {
        let source = self
            .read_framebuffer
            .and_then(|fb| self.attachments.get(&fb))
            .and_then(|slots| slots.get(&Attachment::Color0))
            .copied();
        let destination = self.texture_units.get(&0).copied();
        self.log.record(GraphicsCall::CopyTexSubImage {
            source,
            destination,
            region,
        });
    }

    fn blit_framebuffer(
        &mut self,
        src: Viewport,
        dst: Viewport,
        mask: BufferMask,
        filter: BlitFilter,
    ) {
        if mask.contains(BufferMask::DEPTH) && filter != BlitFilter::Nearest {
            log::warn!("Depth blit with a linear filter is invalid");
        }
        self.log.record(GraphicsCall::Blit {
            read: self.read_framebuffer,
            draw: self.draw_framebuffer,
            src,
            dst,
            mask,
            filter,
        });
    }

    fn invalidate_framebuffer(&mut self, target: FramebufferTarget, attachments: &[Attachment]) {
        if !self.capabilities.invalidate_framebuffer {
            log::warn!("invalidate_framebuffer called on a context without support");
        }
        self.log.record(GraphicsCall::Invalidate {
            target,
            attachments: attachments.to_vec(),
        });
    }

    // --- Rasterization ---

    fn viewport(&mut self, viewport: Viewport) {
        self.log.record(GraphicsCall::Viewport(viewport));
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.log.record(GraphicsCall::SetClearColor(rgba));
    }

    fn clear(&mut self, mask: BufferMask) {
        self.log.record(GraphicsCall::Clear {
            framebuffer: self.draw_framebuffer,
            mask,
        });
    }

    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId, ResourceError> {
        if vertex.trim().is_empty() {
            return Err(ShaderError::CompilationFailed {
                stage: "vertex",
                log: "empty source".to_owned(),
            }
            .into());
        }
        if fragment.trim().is_empty() {
            return Err(ShaderError::CompilationFailed {
                stage: "fragment",
                log: "empty source".to_owned(),
            }
            .into());
        }
        if let Some(message) = self.log.state.borrow().fail_programs.clone() {
            return Err(ShaderError::LinkFailed(message).into());
        }

        let id = ProgramId(self.allocate());
        self.log.state.borrow_mut().programs.insert(id);
        self.log.record(GraphicsCall::CreateProgram(id));
        Ok(id)
    }

    fn destroy_program(&mut self, id: ProgramId) {
        if self.program == Some(id) {
            self.program = None;
        }
        self.log.state.borrow_mut().programs.remove(&id);
        self.log.record(GraphicsCall::DestroyProgram(id));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
        self.log.record(GraphicsCall::UseProgram(program));
    }

    fn write_uniforms(&mut self, program: ProgramId, data: &[u8]) -> Result<(), ResourceError> {
        if !self.log.state.borrow().programs.contains(&program) {
            return Err(ResourceError::InvalidHandle);
        }
        self.log.record(GraphicsCall::WriteUniforms {
            program,
            size: data.len(),
        });
        Ok(())
    }

    fn create_vertex_array(
        &mut self,
        vertices: &[u8],
        indices: &[u16],
    ) -> Result<VertexArrayId, ResourceError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(ResourceError::BackendError(
                "vertex arrays need vertices and indices".to_owned(),
            ));
        }
        let id = VertexArrayId(self.allocate());
        self.log.state.borrow_mut().vertex_arrays.insert(id);
        self.log.record(GraphicsCall::CreateVertexArray(id));
        Ok(id)
    }

    fn destroy_vertex_array(&mut self, id: VertexArrayId) {
        self.log.state.borrow_mut().vertex_arrays.remove(&id);
        self.log.record(GraphicsCall::DestroyVertexArray(id));
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayId, index_count: u32, state: &PipelineState) {
        self.log.record(GraphicsCall::DrawIndexed {
            framebuffer: self.draw_framebuffer,
            program: self.program,
            vertex_array,
            index_count,
            state: *state,
        });
    }

    fn reset_binding_state(&mut self) {
        self.program = None;
        self.texture_units.clear();
        self.read_framebuffer = None;
        self.draw_framebuffer = None;
        self.log.record(GraphicsCall::ResetBindingState);
    }
}
