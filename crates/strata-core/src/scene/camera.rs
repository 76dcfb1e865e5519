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

use crate::host::View;
use crate::math::{Mat4, Quaternion, Vec3, Vec4};

/// A perspective camera.
///
/// During immersive rendering the renderer overwrites the projection and pose
/// from each host view before drawing that eye.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Projection matrix.
    pub projection: Mat4,
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub orientation: Quaternion,
    world: Mat4,
    view: Mat4,
    projection_view: Mat4,
}

impl Camera {
    /// A camera at the origin looking down `-Z`.
    pub fn perspective(fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        let mut camera = Self {
            projection: Mat4::perspective_rh_gl(fov_y_radians, aspect_ratio, z_near, z_far),
            position: Vec3::ZERO,
            orientation: Quaternion::IDENTITY,
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection_view: Mat4::IDENTITY,
        };
        camera.update_matrices();
        camera
    }

    /// Copies projection and pose from a host view and refreshes the matrices.
    pub fn set_from_view(&mut self, view: &View) {
        self.projection = view.projection;
        self.position = view.transform.position;
        self.orientation = view.transform.orientation;
        self.update_matrices();
    }

    /// Recomputes world, view and projection-view matrices.
    pub fn update_matrices(&mut self) {
        self.world = Mat4::from_scale_rotation_translation(Vec3::ONE, self.orientation, self.position);
        self.view = match self.world.affine_inverse() {
            Some(view) => view,
            None => {
                log::warn!("Failed to invert camera transform, using identity");
                Mat4::IDENTITY
            }
        };
        self.projection_view = self.projection * self.view;
    }

    /// World matrix.
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// View matrix (inverse world).
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    /// `projection * view`.
    pub fn projection_view(&self) -> &Mat4 {
        &self.projection_view
    }

    /// NDC depth of a world-space point.
    pub fn depth_of(&self, point: Vec3) -> f32 {
        self.projection_view.project_point(point).z
    }

    /// Tests a world-space sphere against the six frustum planes.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let m = &self.projection_view;
        let (r0, r1, r2, r3) = (m.get_row(0), m.get_row(1), m.get_row(2), m.get_row(3));
        let planes = [
            r3 + r0,
            r3 + r0 * -1.0,
            r3 + r1,
            r3 + r1 * -1.0,
            r3 + r2,
            r3 + r2 * -1.0,
        ];
        let p = Vec4::from_vec3(center, 1.0);
        planes.iter().all(|plane| {
            let normal_len = plane.truncate().length();
            normal_len <= f32::EPSILON || plane.dot(p) / normal_len >= -radius
        })
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Eye;
    use crate::math::RigidTransform;

    #[test]
    fn test_frustum_rejects_point_behind_camera() {
        let camera = Camera::default();
        assert!(camera.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 0.5));
        assert!(!camera.intersects_sphere(Vec3::new(0.0, 0.0, 5.0), 0.5));
    }

    #[test]
    fn test_set_from_view_moves_camera() {
        let mut camera = Camera::default();
        let view = View {
            eye: Eye::Left,
            projection: Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 10.0),
            transform: RigidTransform::new(Vec3::new(-0.03, 1.6, 0.0), Quaternion::IDENTITY),
        };
        camera.set_from_view(&view);
        assert_eq!(camera.world_matrix().translation(), Vec3::new(-0.03, 1.6, 0.0));
        assert_eq!(camera.projection, view.projection);
    }
}
