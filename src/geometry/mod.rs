mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

pub use aabb::AABB;
pub use ray_box_intersection::{ray_box, ray_box_interval};
pub use ray_triangle_intersection::{TriangleHit, ray_triangle};
pub use triangle::{BarycentricCoordinates, Triangle};

use nalgebra::{Point3, Vector3};

pub type FloatType = f32;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

/// Linear RGB triplet used for material coefficients and path throughput.
pub type Color = Vector3<FloatType>;

/// Determinant and distance threshold of the ray/triangle test.
pub const EPSILON: FloatType = 1e-8;

/// Distance a secondary ray origin is pushed along its direction to avoid self intersection.
pub const RAY_OFFSET: FloatType = 1e-3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Axis> {
        Self::ALL.get(index).copied()
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction.
    /// Zero components become infinities with the sign of the zero.
    pub inv_direction: WorldVector,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = direction.normalize();
        let inv_direction = direction.map(|x| 1.0 / x);

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    /// Secondary ray leaving a surface point, with the origin nudged along the direction.
    pub fn leaving(point: WorldPoint, direction: WorldVector) -> Ray {
        let direction = direction.normalize();
        Ray::new(point + direction * RAY_OFFSET, direction)
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}
