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

use super::program::{ClipVertex, MaskUniforms, ProgramCache, MASK_FRAGMENT_SHADER, MASK_VERTEX_SHADER};
use super::{ClipPrimitive, MaskMode};
use std::rc::Rc;
use strata_core::graphics::{
    BlendFactor, BlendState, ContentTexture, GraphicsContext, PipelineState, ProgramId,
    ResourceError, VertexArrayId,
};
use strata_core::host::{Eye, LayerLayout};
use strata_core::math::{Mat4, Vec3};
use strata_core::scene::{BoundingSphere, DrawContext};

/// Unit plane in XY, facing +Z.
const PLANE_VERTICES: [ClipVertex; 4] = [
    ClipVertex { position: [-0.5, -0.5, 0.0], uv: [0.0, 0.0] },
    ClipVertex { position: [0.5, -0.5, 0.0], uv: [1.0, 0.0] },
    ClipVertex { position: [0.5, 0.5, 0.0], uv: [1.0, 1.0] },
    ClipVertex { position: [-0.5, 0.5, 0.0], uv: [0.0, 1.0] },
];
const PLANE_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Writes only inverse source alpha into the destination.
const ALPHA_MASK_BLEND: BlendState = BlendState {
    src: BlendFactor::Zero,
    dst: BlendFactor::OneMinusSrcAlpha,
    src_alpha: BlendFactor::Zero,
    dst_alpha: BlendFactor::OneMinusSrcAlpha,
};

/// Alpha threshold of the depth mask.
const DEPTH_MASK_ALPHA_CLIP: f32 = 0.5;

/// Plane primitive for quad layers, scaled to the layer size in meters.
#[derive(Debug)]
pub struct QuadClip {
    mask: MaskMode,
    visible: bool,
    texture: Option<Rc<ContentTexture>>,
    layout: LayerLayout,
    width: f32,
    height: f32,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
}

impl QuadClip {
    /// A visible, unmasked plane.
    pub fn new(width: f32, height: f32, layout: LayerLayout) -> Self {
        Self {
            mask: MaskMode::None,
            visible: true,
            texture: None,
            layout,
            width,
            height,
            program: None,
            vertex_array: None,
        }
    }

    /// Resizes the plane.
    pub fn apply(&mut self, width: f32, height: f32, layout: LayerLayout) {
        self.width = width;
        self.height = height;
        self.layout = layout;
    }

    /// Currently displayed texture.
    pub fn texture(&self) -> Option<&Rc<ContentTexture>> {
        self.texture.as_ref()
    }

    /// Uniform block for one draw.
    pub fn uniforms(&self, ctx: &DrawContext<'_>) -> MaskUniforms {
        let eye = match (self.layout.is_stereo(), ctx.eye) {
            (true, Eye::Left) => 0.0,
            (true, Eye::Right) => 1.0,
            _ => -1.0,
        };
        MaskUniforms {
            model: (*ctx.world * self.local_matrix()).to_cols_array_2d(),
            view: ctx.camera.view_matrix().to_cols_array_2d(),
            projection: ctx.camera.projection.to_cols_array_2d(),
            eye,
            alpha_clip: if self.mask == MaskMode::Depth {
                DEPTH_MASK_ALPHA_CLIP
            } else {
                0.0
            },
            _padding: [0.0; 2],
        }
    }
}

impl ClipPrimitive for QuadClip {
    fn mask_mode(&self) -> MaskMode {
        self.mask
    }

    fn set_mask_mode(&mut self, mode: MaskMode) {
        self.mask = mode;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_texture(&mut self, texture: Option<Rc<ContentTexture>>) {
        self.texture = texture;
    }

    fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale(Vec3::new(self.width, self.height, 1.0))
    }

    fn bounds(&self) -> BoundingSphere {
        BoundingSphere {
            center: Vec3::ZERO,
            radius: 0.5f32.hypot(0.5),
        }
    }

    fn pipeline_state(&self) -> PipelineState {
        let blend = match self.mask {
            MaskMode::Alpha => ALPHA_MASK_BLEND,
            MaskMode::None | MaskMode::Depth => BlendState::ALPHA,
        };
        PipelineState {
            transparent: self.mask != MaskMode::Depth,
            depth_test: true,
            depth_write: true,
            blend: Some(blend),
            cull_back_faces: false,
        }
    }

    fn program_key(&self) -> u64 {
        self.program.map_or(0, |p| u64::from(p.0))
    }

    fn draw(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        programs: &mut ProgramCache,
        ctx: &DrawContext<'_>,
    ) -> Result<(), ResourceError> {
        let program = match self.program {
            Some(program) => program,
            None => {
                let program = programs.acquire(gfx, MASK_VERTEX_SHADER, MASK_FRAGMENT_SHADER)?;
                self.program = Some(program);
                program
            }
        };
        let vertex_array = match self.vertex_array {
            Some(vao) => vao,
            None => {
                let vao = gfx.create_vertex_array(
                    bytemuck::cast_slice(&PLANE_VERTICES),
                    &PLANE_INDICES,
                )?;
                self.vertex_array = Some(vao);
                vao
            }
        };

        let uniforms = self.uniforms(ctx);
        gfx.use_program(Some(program));
        gfx.write_uniforms(program, bytemuck::bytes_of(&uniforms))?;
        gfx.bind_texture(0, self.texture.as_ref().and_then(|t| t.id()));
        gfx.draw_indexed(vertex_array, PLANE_INDICES.len() as u32, &self.pipeline_state());
        Ok(())
    }

    fn release(&mut self, gfx: &mut dyn GraphicsContext, programs: &mut ProgramCache) {
        if let Some(program) = self.program.take() {
            programs.release(gfx, program);
        }
        if let Some(vao) = self.vertex_array.take() {
            gfx.destroy_vertex_array(vao);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_core::scene::Camera;

    #[test]
    fn test_depth_mask_is_opaque_with_alpha_clip() {
        let mut clip = QuadClip::new(1.0, 1.0, LayerLayout::Mono);
        clip.set_mask_mode(MaskMode::Depth);
        assert!(!clip.pipeline_state().transparent);

        let camera = Camera::default();
        let world = Mat4::IDENTITY;
        let ctx = DrawContext { world: &world, camera: &camera, eye: Eye::Left };
        assert_eq!(clip.uniforms(&ctx).alpha_clip, DEPTH_MASK_ALPHA_CLIP);
        assert_eq!(clip.uniforms(&ctx).eye, -1.0, "mono content ignores the eye");
    }

    #[test]
    fn test_alpha_mask_blends_inverse_alpha_only() {
        let mut clip = QuadClip::new(1.0, 1.0, LayerLayout::Mono);
        clip.set_mask_mode(MaskMode::Alpha);
        let state = clip.pipeline_state();
        assert!(state.transparent);
        assert_eq!(state.blend, Some(ALPHA_MASK_BLEND));
    }

    #[test]
    fn test_stereo_layout_selects_eye_half() {
        let clip = QuadClip::new(2.0, 1.0, LayerLayout::StereoLeftRight);
        let camera = Camera::default();
        let world = Mat4::IDENTITY;
        let right = DrawContext { world: &world, camera: &camera, eye: Eye::Right };
        assert_eq!(clip.uniforms(&right).eye, 1.0);
        assert_relative_eq!(clip.uniforms(&right).model[0][0], 2.0);
        assert_relative_eq!(clip.uniforms(&right).model[1][1], 1.0);
    }
}
