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

//! The graphics-context contract.

use super::error::ResourceError;
use super::types::*;
use std::fmt::Debug;

/// A stateful, GL-style graphics context.
///
/// The compositor only needs framebuffer plumbing (attachments, copies, blits,
/// invalidation) plus enough of a draw path to render the clip primitive.
/// Host-provided layer images are plain [`TextureId`]s that can be attached
/// to framebuffers but never sampled.
///
/// Contexts are single-threaded and driven from the frame loop.
pub trait GraphicsContext: Debug {
    /// Returns the optional features this context exposes.
    fn capabilities(&self) -> GraphicsCapabilities;

    // --- Framebuffers ---

    /// Creates an empty framebuffer object.
    /// ## Errors
    /// * `ResourceError` - If the backend cannot allocate the object.
    fn create_framebuffer(&mut self) -> Result<FramebufferId, ResourceError>;

    /// Releases a framebuffer. Unknown ids are ignored.
    fn destroy_framebuffer(&mut self, id: FramebufferId);

    /// Binds `framebuffer` to `target`. `None` binds the default surface.
    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferId>);

    /// Attaches a texture (or detaches with `None`) to the framebuffer bound at `target`.
    fn framebuffer_texture_2d(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureId>,
    );

    /// Attaches a texture as an implicitly multisampled render target.
    ///
    /// Only valid when [`GraphicsCapabilities::multisampled_render_to_texture`] is set.
    fn framebuffer_texture_2d_multisample(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: TextureId,
        samples: u32,
    );

    // --- Renderbuffers ---

    /// Creates a renderbuffer without storage.
    fn create_renderbuffer(&mut self) -> Result<RenderbufferId, ResourceError>;

    /// Releases a renderbuffer. Unknown ids are ignored.
    fn destroy_renderbuffer(&mut self, id: RenderbufferId);

    /// Allocates multisampled storage for a renderbuffer.
    /// ## Errors
    /// * `ResourceError::Unsupported` - If `samples` exceeds the context maximum.
    fn renderbuffer_storage_multisample(
        &mut self,
        renderbuffer: RenderbufferId,
        samples: u32,
        format: RenderbufferFormat,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError>;

    /// Attaches a renderbuffer (or detaches with `None`) to the framebuffer bound at `target`.
    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferId>,
    );

    // --- Textures and transfers ---

    /// Binds a 2D texture to a texture unit.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// Copies `region` of the read framebuffer's color attachment into the
    /// texture bound on unit 0, at offset `(0, 0)`.
    fn copy_tex_sub_image_2d(&mut self, region: Viewport);

    /// Copies a rectangle from the read framebuffer to the draw framebuffer.
    fn blit_framebuffer(
        &mut self,
        src: Viewport,
        dst: Viewport,
        mask: BufferMask,
        filter: BlitFilter,
    );

    /// Hints that the given attachments' contents are no longer needed.
    fn invalidate_framebuffer(&mut self, target: FramebufferTarget, attachments: &[Attachment]);

    // --- Rasterization ---

    /// Sets the viewport rectangle.
    fn viewport(&mut self, viewport: Viewport);

    /// Sets the color used by [`GraphicsContext::clear`].
    fn set_clear_color(&mut self, rgba: [f32; 4]);

    /// Clears the planes in `mask` of the bound draw framebuffer.
    fn clear(&mut self, mask: BufferMask);

    /// Compiles and links a program from GLSL sources.
    /// ## Errors
    /// * `ResourceError::Shader` - If compilation or linking fails.
    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId, ResourceError>;

    /// Releases a program.
    fn destroy_program(&mut self, id: ProgramId);

    /// Makes `program` current.
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Uploads the uniform block of `program` from raw bytes.
    fn write_uniforms(&mut self, program: ProgramId, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a vertex array from interleaved vertex bytes and 16-bit indices.
    fn create_vertex_array(
        &mut self,
        vertices: &[u8],
        indices: &[u16],
    ) -> Result<VertexArrayId, ResourceError>;

    /// Releases a vertex array.
    fn destroy_vertex_array(&mut self, id: VertexArrayId);

    /// Issues an indexed draw with the current program.
    fn draw_indexed(&mut self, vertex_array: VertexArrayId, index_count: u32, state: &PipelineState);

    /// Forgets every cached binding (program, vertex array, textures, framebuffer)
    /// and rebinds defaults. Used after host-side code may have touched the context.
    fn reset_binding_state(&mut self);
}
