use crate::{
    geometry::{Color, Ray},
    packing::SceneTables,
    random::SampleStream,
    settings::RenderSettings,
};

use super::{brdf, lights, sampling};

/// Number of bounces after the camera hit.
pub const MAX_BOUNCE: u32 = 8;

/// Radiance carried back along `ray`, estimated with a single path.
pub fn radiance(
    settings: &RenderSettings,
    scene: &SceneTables,
    ray: Ray,
    stream: &mut SampleStream,
) -> Color {
    let continuation_probability = settings.continuation_probability;

    let mut radiance = Color::zeros();
    let mut throughput = Color::repeat(1.0);
    let mut ray = ray;
    let mut specular = false;

    for depth in 0..=MAX_BOUNCE {
        let Some(hit) = scene.intersect(&ray) else {
            break;
        };
        let material = hit.material;
        let incoming = ray.direction;
        let normal = if hit.normal.dot(&incoming) > 0.0 {
            -hit.normal
        } else {
            hit.normal
        };

        if material.is_emissive() && (depth == 0 || specular) {
            radiance += throughput.component_mul(&material.ke);
            break;
        }

        radiance += throughput.component_mul(&lights::direct_lighting(
            scene, &hit.point, &normal, &incoming, material, stream,
        ));
        if settings.direct_lighting_only {
            break;
        }

        if stream.next_f32() > continuation_probability {
            break;
        }

        let mut reflect = material.is_mirror();
        if material.is_dielectric() {
            // Uses the stored normal, its orientation tells inside from outside
            match brdf::refract(&incoming, &hit.normal, material.ni, stream.next_f32()) {
                Some(direction) => {
                    throughput /= continuation_probability;
                    ray = Ray::leaving(hit.point, direction);
                    specular = true;
                    continue;
                }
                None => reflect = true,
            }
        }
        if reflect {
            throughput /= continuation_probability;
            ray = Ray::leaving(hit.point, brdf::reflect(&incoming, &normal));
            specular = true;
            continue;
        }

        let sample = sampling::sample_hemisphere(
            &normal,
            stream.next_vec2(),
            settings.use_importance_sampling,
        );
        if sample.pdf <= 0.0 {
            break;
        }
        let brdf = brdf::surface_brdf(
            material,
            settings.use_microfacet,
            &incoming,
            &normal,
            &sample.direction,
        );
        let cos = sample.direction.dot(&normal);
        throughput = throughput.component_mul(&brdf) * (cos / (sample.pdf * continuation_probability));
        ray = Ray::leaving(hit.point, sample.direction);
        specular = false;
    }

    radiance
}
