use std::ops::Sub;

use nalgebra::{ClosedAddAssign, ClosedDivAssign, Point, Scalar};
use num_traits::One;

use super::{Axis, FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> AABB<Point2> {
        AABB {
            min: f(&self.min),
            max: f(&self.max),
        }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> AABB<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

impl<Point> From<(Point, Point)> for AABB<Point> {
    fn from(value: (Point, Point)) -> Self {
        let (min, max) = value;
        AABB { min, max }
    }
}

impl WorldBox {
    /// Smallest box containing all the points, None if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a WorldPoint>) -> Option<WorldBox> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(WorldBox::new(first, first), |b, p| {
            WorldBox::new(b.min.inf(p), b.max.sup(p))
        }))
    }

    pub fn union(&self, other: &WorldBox) -> WorldBox {
        WorldBox::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Closed-interval overlap test; boxes touching on a face overlap.
    pub fn overlaps(&self, other: &WorldBox) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    pub fn contains_box(&self, other: &WorldBox) -> bool {
        (0..3).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    pub fn longest_axis(&self) -> Axis {
        let size = self.size();
        if size.x >= size.y && size.x >= size.z {
            Axis::X
        } else if size.y >= size.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Cuts the box by a plane perpendicular to `axis`, returns (low, high) halves.
    pub fn split_at(&self, axis: Axis, coordinate: FloatType) -> (WorldBox, WorldBox) {
        let mut low = self.clone();
        let mut high = self.clone();
        low.max[axis.index()] = coordinate;
        high.min[axis.index()] = coordinate;
        (low, high)
    }

    /// Grows the box on every side by `relative` times its largest extent (at least `relative`).
    pub fn padded(&self, relative: FloatType) -> WorldBox {
        let size = self.size();
        let pad = relative * size.x.max(size.y).max(size.z).max(1.0);
        let pad = WorldVector::repeat(pad);
        WorldBox::new(self.min - pad, self.max + pad)
    }

    /// Flattens to `[min.x, min.y, min.z, max.x, max.y, max.z]`.
    pub fn to_array(&self) -> [FloatType; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }

    pub fn from_array(values: [FloatType; 6]) -> WorldBox {
        WorldBox::new(
            WorldPoint::new(values[0], values[1], values[2]),
            WorldPoint::new(values[3], values[4], values[5]),
        )
    }
}
