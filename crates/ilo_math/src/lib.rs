// Re-export glam for convenience
pub use glam::*;

// Bounding volumes and transform helpers
mod aabb;
mod sphere;
mod transform;

pub use aabb::Aabb;
pub use sphere::BoundingSphere;
pub use transform::{euler_degrees_to_mat4, trs_degrees, Mat4Ext};
