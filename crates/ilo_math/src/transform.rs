// Transform utilities for scene placement
//
// Scene nodes carry translation, per-axis rotation in degrees and per-axis
// scale. These helpers compose them into a Mat4 and push bounding volumes
// through the result.

use glam::{Mat4, Vec3};
use crate::{Aabb, BoundingSphere};

/// Extension trait for Mat4 to move bounding volumes between spaces.
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transform a bounding sphere, scaling the radius by the largest axis scale.
    fn transform_sphere(&self, sphere: &BoundingSphere) -> BoundingSphere;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }
        Aabb::from_points(aabb.corners().map(|corner| self.transform_point3(corner)))
    }

    fn transform_sphere(&self, sphere: &BoundingSphere) -> BoundingSphere {
        let scale = self.x_axis.truncate().length()
            .max(self.y_axis.truncate().length())
            .max(self.z_axis.truncate().length());
        BoundingSphere::new(self.transform_point3(sphere.center), sphere.radius * scale)
    }
}

/// Rotation about X, then Y, then Z, angles in degrees (Rx * Ry * Rz).
pub fn euler_degrees_to_mat4(degrees: Vec3) -> Mat4 {
    Mat4::from_rotation_x(degrees.x.to_radians())
        * Mat4::from_rotation_y(degrees.y.to_radians())
        * Mat4::from_rotation_z(degrees.z.to_radians())
}

/// Translate * Rx * Ry * Rz * Scale, rotation given in degrees.
pub fn trs_degrees(translation: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_translation(translation)
        * euler_degrees_to_mat4(rotation_degrees)
        * Mat4::from_scale(scale)
}
