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

//! Rigid (rotation + translation) transforms.

use super::{Mat4, Quaternion, Vec3};

/// A scale-free transform, as exchanged with immersive hosts for poses and
/// native layer placement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidTransform {
    /// Translation in meters.
    pub position: Vec3,
    /// Unit orientation.
    pub orientation: Quaternion,
}

impl RigidTransform {
    /// Creates a rigid transform from its parts.
    pub fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation: orientation.normalize(),
        }
    }

    /// Keeps the rotation and translation of an affine matrix, dropping scale.
    pub fn from_matrix(m: &Mat4) -> Self {
        Self {
            position: m.translation(),
            orientation: Quaternion::from_rotation_matrix(m),
        }
    }

    /// The equivalent `T * R` matrix.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::ONE, self.orientation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_matrix_drops_scale() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.7);
        let m = Mat4::from_scale_rotation_translation(Vec3::new(3.0, 3.0, 3.0), q, Vec3::new(1.0, 2.0, 3.0));
        let rigid = RigidTransform::from_matrix(&m);
        assert_eq!(rigid.position, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(rigid.to_matrix().max_scale(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(rigid.orientation.y, q.y, epsilon = 1e-5);
    }
}
