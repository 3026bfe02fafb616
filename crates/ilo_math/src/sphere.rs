use crate::Vec3;

/// Bounding sphere: centroid of a point set and the largest distance from it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Center is the average of the points, radius the maximum distance from
    /// that center to any point. An empty set gives a zero sphere at the origin.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
        I::IntoIter: Clone,
    {
        let points = points.into_iter();

        let mut sum = Vec3::ZERO;
        let mut count = 0usize;
        for p in points.clone() {
            sum += p;
            count += 1;
        }
        if count == 0 {
            return Self::default();
        }

        let center = sum / count as f32;
        let radius = points
            .map(|p| p.distance(center))
            .fold(0.0_f32, f32::max);

        Self { center, radius }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.distance_squared(self.center) <= self.radius * self.radius
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 0.0,
        }
    }
}
