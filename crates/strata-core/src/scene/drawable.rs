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

use super::Camera;
use crate::graphics::{GraphicsContext, PipelineState, ResourceError};
use crate::host::Eye;
use crate::math::{Mat4, Vec3};
use std::fmt::Debug;

/// A bounding sphere in local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Center in local space.
    pub center: Vec3,
    /// Radius in local units.
    pub radius: f32,
}

/// Per-draw inputs.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext<'a> {
    /// World matrix of the drawn node.
    pub world: &'a Mat4,
    /// Camera for this view.
    pub camera: &'a Camera,
    /// Eye being rendered, `Eye::None` outside immersive rendering.
    pub eye: Eye,
}

/// Anything a scene node can draw: a mesh with its program and fixed-function state.
pub trait Drawable: Debug {
    /// State used for bucketing and for the draw call.
    fn pipeline_state(&self) -> PipelineState;

    /// Explicit ordering inside a bucket. `0` lets depth decide.
    fn render_order(&self) -> i32 {
        0
    }

    /// Whether frustum culling applies.
    fn frustum_culled(&self) -> bool {
        true
    }

    /// Local bounds for culling. `None` never culls.
    fn bounds(&self) -> Option<BoundingSphere> {
        None
    }

    /// Groups draws sharing a program.
    fn program_key(&self) -> u64 {
        0
    }

    /// Issues the draw.
    fn draw(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        ctx: &DrawContext<'_>,
    ) -> Result<(), ResourceError>;
}
