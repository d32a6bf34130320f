use crate::{
    geometry::{Color, EPSILON, FloatType, Ray, WorldPoint, WorldVector},
    packing::SceneTables,
    random::SampleStream,
    scene::Material,
};

use super::brdf;

/// Distance the shadow ray origin is lifted off the surface along the normal.
pub const SURFACE_OFFSET: FloatType = 1e-4;

/// Relative tolerance between the sampled light distance and the shadow ray hit.
const SHADOW_TOLERANCE: FloatType = 1e-3;

/// Next event estimation: radiance arriving at `point` directly from one randomly
/// picked emissive triangle, weighted by the surface BRDF.
/// Triangles are picked uniformly by count, points uniformly by area, so the sample
/// density is `1 / (light_count * area)`.
pub fn direct_lighting(
    scene: &SceneTables,
    point: &WorldPoint,
    normal: &WorldVector,
    incoming: &WorldVector,
    material: &Material,
    stream: &mut SampleStream,
) -> Color {
    let count = scene.light_count();
    if count == 0 {
        return Color::zeros();
    }
    let index = stream.next_index(count);
    let sample = stream.next_vec2();
    let Some(light) = scene.light(index) else {
        return Color::zeros();
    };

    let area = light.triangle.area();
    let origin = point + normal * SURFACE_OFFSET;
    let to_light = light.triangle.sample_point(sample) - origin;
    let distance = to_light.norm();
    if !(area > 0.0 && distance > EPSILON) {
        return Color::zeros();
    }
    let direction = to_light / distance;
    let cos_surface = normal.dot(&direction);
    if cos_surface <= 0.0 {
        return Color::zeros();
    }

    let Some(blocker) = scene.intersect(&Ray::new(origin, direction)) else {
        return Color::zeros();
    };
    if !blocker.material.is_emissive()
        || (blocker.t - distance).abs() > SHADOW_TOLERANCE * distance
    {
        return Color::zeros();
    }

    // Emitters are two sided
    let cos_light = blocker.normal.dot(&direction).abs();
    let pdf = 1.0 / (count as FloatType * area);
    let brdf = brdf::light_brdf(material, incoming, normal, &direction);

    blocker.material.ke.component_mul(&brdf) * (cos_light * cos_surface / (distance * distance) / pdf)
}
