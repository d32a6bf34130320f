use std::ops::{Add, Index, IndexMut, Mul};

use super::{FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Point> {
        self.0.iter()
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }
}

impl<Point: Default> Default for Triangle<Point> {
    fn default() -> Self {
        Triangle([Default::default(), Default::default(), Default::default()])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Triangle<WorldPoint> {
    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [WorldVector; 2] {
        [self[1] - self[0], self[2] - self[0]]
    }

    /// Returns a normal vector of the triangle, not normalized.
    pub fn normal(&self) -> WorldVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }

    pub fn area(&self) -> FloatType {
        0.5 * self.normal().norm()
    }

    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::new(
            self[0].inf(&self[1]).inf(&self[2]),
            self[0].sup(&self[1]).sup(&self[2]),
        )
    }

    /// Maps a uniform sample from the unit square to a uniformly distributed point on the triangle.
    pub fn sample_point(&self, sample: (FloatType, FloatType)) -> WorldPoint {
        let su0 = sample.0.sqrt();
        let b0 = 1.0 - su0;
        let b1 = sample.1 * su0;
        WorldPoint::from(self[0].coords * b0 + self[1].coords * b1 + self[2].coords * (1.0 - b0 - b1))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates {
    pub u: FloatType,
    pub v: FloatType,
}

impl BarycentricCoordinates {
    pub fn interpolate<T>(&self, a: &T, b: &T, c: &T) -> T
    where
        for<'a> &'a T: Mul<FloatType, Output = T>,
        T: Add<Output = T>,
    {
        let w = 1.0 - self.u - self.v;
        a * w + b * self.u + c * self.v
    }

    pub fn interpolate_triangle<T>(&self, triangle: &Triangle<T>) -> T
    where
        for<'a> &'a T: Mul<FloatType, Output = T>,
        T: Add<Output = T>,
    {
        self.interpolate(&triangle[0], &triangle[1], &triangle[2])
    }
}
