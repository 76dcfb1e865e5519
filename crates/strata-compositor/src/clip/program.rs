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

//! Shared shader programs and the GPU-side layout of the mask uniforms.

use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use strata_core::graphics::{GraphicsContext, ProgramId, ResourceError};

/// GLSL sources of the clip program.
pub const MASK_VERTEX_SHADER: &str = include_str!("shaders/mask.vert");
/// See [`MASK_VERTEX_SHADER`].
pub const MASK_FRAGMENT_SHADER: &str = include_str!("shaders/mask.frag");

/// `MaskUniforms` block, std140 layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaskUniforms {
    /// Model matrix, column-major.
    pub model: [[f32; 4]; 4],
    /// View matrix, column-major.
    pub view: [[f32; 4]; 4],
    /// Projection matrix, column-major.
    pub projection: [[f32; 4]; 4],
    /// `-1` for mono sampling, `0`/`1` for the left/right half.
    pub eye: f32,
    /// Alpha threshold in depth-mask mode, `0` otherwise.
    pub alpha_clip: f32,
    /// std140 padding.
    pub _padding: [f32; 2],
}

/// A vertex of the clip geometry.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClipVertex {
    /// Local position.
    pub position: [f32; 3],
    /// Texture coordinate.
    pub uv: [f32; 2],
}

#[derive(Debug)]
struct CachedProgram {
    id: ProgramId,
    usage: usize,
}

/// Links each distinct pair of shader sources once and shares the program
/// between every clip primitive using it.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<String, CachedProgram>,
}

impl ProgramCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the program for these sources, linking it on first use.
    pub fn acquire(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        vertex: &str,
        fragment: &str,
    ) -> Result<ProgramId, ResourceError> {
        let key = format!("{vertex}{fragment}");
        if let Some(cached) = self.programs.get_mut(&key) {
            cached.usage += 1;
            return Ok(cached.id);
        }
        let id = gfx.create_program(vertex, fragment)?;
        log::debug!("Linked clip program {:?}", id);
        self.programs.insert(key, CachedProgram { id, usage: 1 });
        Ok(id)
    }

    /// Drops one use of `id`, deleting the program when unused.
    pub fn release(&mut self, gfx: &mut dyn GraphicsContext, id: ProgramId) {
        let Some(key) = self
            .programs
            .iter()
            .find(|(_, cached)| cached.id == id)
            .map(|(key, _)| key.clone())
        else {
            return;
        };
        let remove = self.programs.get_mut(&key).is_some_and(|cached| {
            cached.usage = cached.usage.saturating_sub(1);
            cached.usage == 0
        });
        if remove {
            self.programs.remove(&key);
            gfx.destroy_program(id);
        }
    }

    /// Number of live programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// `true` when no program is cached.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
