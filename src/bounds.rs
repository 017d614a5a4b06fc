use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Box containing nothing; the identity of [`BoundingBox::union`].
    pub const fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::empty(), |mut bounds, point| {
            bounds.expand(point);
            bounds
        })
    }

    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self::new(center - Vec3::splat(radius), center + Vec3::splat(radius))
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Containment with a small tolerance for points produced by matrix math.
    pub fn contains_point(&self, point: Vec3) -> bool {
        let epsilon = Vec3::splat(1e-3) * (Vec3::ONE + self.extents().abs());
        point.cmpge(self.min - epsilon).all() && point.cmple(self.max + epsilon).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half size along each axis.
    pub fn extents(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.max - self.min) * 0.5
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn transform(&self, matrix: Mat4) -> BoundingBox {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(self.corners().map(|corner| matrix.transform_point3(corner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_union_identity() {
        let bounds = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(BoundingBox::empty().union(&bounds), bounds);
        assert!(BoundingBox::empty().is_empty());
        assert_eq!(BoundingBox::empty().extents(), Vec3::ZERO);
    }

    #[test]
    fn from_points_contains_every_point() {
        let points = [Vec3::new(1.0, -2.0, 3.0), Vec3::new(-4.0, 5.0, 0.5)];
        let bounds = BoundingBox::from_points(points);
        assert!(points.iter().all(|point| bounds.contains_point(*point)));
        assert!(!bounds.contains_point(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(bounds.center(), Vec3::new(-1.5, 1.5, 1.75));
    }

    #[test]
    fn transform_keeps_corners_inside() {
        let bounds = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let matrix = Mat4::from_rotation_y(0.7) * Mat4::from_translation(Vec3::X * 3.0);
        let moved = bounds.transform(matrix);
        for corner in bounds.corners() {
            assert!(moved.contains_point(matrix.transform_point3(corner)));
        }
    }
}
