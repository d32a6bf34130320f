use super::{FloatType, Ray, WorldBox};

/// Distances along the ray to the box entry and exit, clipped to the part of the ray with t >= 0.
/// Returns None if the ray misses the box or the box is entirely behind the ray origin.
pub fn ray_box_interval(ray: &Ray, b: &WorldBox) -> Option<(FloatType, FloatType)> {
    let mut t_min = FloatType::NEG_INFINITY;
    let mut t_max = FloatType::INFINITY;

    for i in 0..3 {
        // The multiplication is NaN if the ray starts on a slab bounding plane and is
        // parallel to it. Blending to -+infinity keeps the slab range unbounded.
        let to_min = (b.min[i] - ray.origin[i]) * ray.inv_direction[i];
        let to_max = (b.max[i] - ray.origin[i]) * ray.inv_direction[i];
        let to_min = if to_min.is_nan() { FloatType::NEG_INFINITY } else { to_min };
        let to_max = if to_max.is_nan() { FloatType::INFINITY } else { to_max };

        t_min = t_min.max(to_min.min(to_max));
        t_max = t_max.min(to_min.max(to_max));
    }

    if t_max > t_min.max(0.0) {
        Some((t_min.max(0.0), t_max))
    } else {
        None
    }
}

/// Slab test returning a single distance: the entry point if it is in front of the ray origin,
/// otherwise the exit point (the origin is inside the box).
pub fn ray_box(ray: &Ray, b: &WorldBox) -> Option<FloatType> {
    let (entry, exit) = ray_box_interval(ray, b)?;
    if entry > 0.0 { Some(entry) } else { Some(exit) }
}
