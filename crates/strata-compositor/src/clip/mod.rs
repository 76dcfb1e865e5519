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

//! Emulated layer geometry.
//!
//! Every composition layer owns a clip primitive drawn in the regular scene.
//! Without a native handle it renders the layer content itself. With one, it
//! becomes a mask: native layers are composited outside the scene, so the
//! primitive keeps the layer present in the depth buffer (and for hit tests)
//! while writing no visible color.

mod program;
mod quad;

pub use self::program::{
    ClipVertex, MaskUniforms, ProgramCache, MASK_FRAGMENT_SHADER, MASK_VERTEX_SHADER,
};
pub use self::quad::QuadClip;

use std::fmt::Debug;
use std::rc::Rc;
use strata_core::graphics::{ContentTexture, GraphicsContext, PipelineState, ResourceError};
use strata_core::math::Mat4;
use strata_core::scene::{BoundingSphere, DrawContext};

/// What the clip primitive draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaskMode {
    /// Draws the layer content. Used while no native handle is bound.
    #[default]
    None,
    /// Punches the layer shape into destination alpha, no color.
    Alpha,
    /// Writes depth where content alpha passes the threshold, no color.
    Depth,
}

/// Geometry standing in for a composition layer inside the scene.
pub trait ClipPrimitive: Debug {
    /// Current mask mode.
    fn mask_mode(&self) -> MaskMode;

    /// Switches mask mode. Takes effect on the next draw.
    fn set_mask_mode(&mut self, mode: MaskMode);

    /// Whether the primitive enters the render list.
    fn is_visible(&self) -> bool;

    /// Shows or hides the primitive.
    fn set_visible(&mut self, visible: bool);

    /// Texture sampled in `MaskMode::None` and for alpha coverage.
    fn set_texture(&mut self, texture: Option<Rc<ContentTexture>>);

    /// Transform of the primitive relative to its layer.
    fn local_matrix(&self) -> Mat4;

    /// Local bounds for culling.
    fn bounds(&self) -> BoundingSphere;

    /// Fixed-function state for the current mask mode.
    fn pipeline_state(&self) -> PipelineState;

    /// Key grouping draws that share a program.
    fn program_key(&self) -> u64;

    /// Draws the primitive, creating GPU objects on first use.
    fn draw(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        programs: &mut ProgramCache,
        ctx: &DrawContext<'_>,
    ) -> Result<(), ResourceError>;

    /// Releases GPU objects.
    fn release(&mut self, gfx: &mut dyn GraphicsContext, programs: &mut ProgramCache);
}
