use super::{
    BarycentricCoordinates, EPSILON, FloatType, Ray, Triangle, WorldPoint, WorldVector,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TriangleHit {
    /// Distance along the ray
    pub t: FloatType,
    pub point: WorldPoint,
    /// Unit normal, either geometric or interpolated from vertex normals.
    pub normal: WorldVector,
    pub uv: BarycentricCoordinates,
}

/// Calculates ray intersection with a (two sided) triangle.
/// If `normals` are given, the hit normal is interpolated from them, otherwise it is the
/// normalized `e1 x e2`.
/// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
pub fn ray_triangle(
    ray: &Ray,
    triangle: &Triangle<WorldPoint>,
    normals: Option<&Triangle<WorldVector>>,
) -> Option<TriangleHit> {
    let [e1, e2] = triangle.edges();

    let ray_cross_e2 = ray.direction.cross(&e2);
    let det = e1.dot(&ray_cross_e2);
    if det.abs() < EPSILON {
        return None; // Parallel or degenerate
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - triangle[0];
    let u = inv_det * s.dot(&ray_cross_e2);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let s_cross_e1 = s.cross(&e1);
    let v = inv_det * ray.direction.dot(&s_cross_e1);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = inv_det * e2.dot(&s_cross_e1);
    if t <= EPSILON {
        return None;
    }

    let uv = BarycentricCoordinates { u, v };
    let normal = match normals {
        Some(normals) => uv.interpolate_triangle(normals),
        None => e1.cross(&e2),
    }
    .normalize();

    Some(TriangleHit {
        t,
        point: ray.point_at(t),
        normal,
        uv,
    })
}
