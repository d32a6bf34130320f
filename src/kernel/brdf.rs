//! Reflection models. Directions follow the ray: `incoming` points towards the surface,
//! `outgoing` points away from it.

use std::f32::consts::PI;

use crate::{
    geometry::{Color, FloatType, WorldVector},
    scene::{Material, PHONG_LIGHT_EXPONENT},
};

/// Index of refraction used for dielectrics without a usable `Ni`.
const DEFAULT_IOR: FloatType = 1.5;

/// Roughness of the Beckmann distribution.
const BECKMANN_ALPHA: FloatType = 1.0;

pub fn reflect(incoming: &WorldVector, normal: &WorldVector) -> WorldVector {
    incoming - normal * (2.0 * incoming.dot(normal))
}

/// Chooses between reflection and refraction on a dielectric boundary using Schlick's
/// approximation. `xi` is a uniform sample in `[0, 1)`.
/// Returns the refracted direction, or None if the ray reflects (including total internal
/// reflection).
pub fn refract(
    incoming: &WorldVector,
    normal: &WorldVector,
    ni: FloatType,
    xi: FloatType,
) -> Option<WorldVector> {
    let ior = if ni > 0.0 { ni } else { DEFAULT_IOR };
    let cos_i = incoming.dot(normal).clamp(-1.0, 1.0);
    let (cos_i, eta_i, eta_t, normal) = if cos_i < 0.0 {
        (-cos_i, 1.0, ior, *normal)
    } else {
        // Leaving the medium
        (cos_i, ior, 1.0, -normal)
    };

    let r0 = ((eta_i - eta_t) / (eta_i + eta_t)).powi(2);
    let reflectance = r0 + (1.0 - r0) * (1.0 - cos_i).powi(5);
    if xi < reflectance {
        return None;
    }

    let ratio = eta_i / eta_t;
    let k = 1.0 - ratio * ratio * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }
    Some(incoming * ratio + normal * (ratio * cos_i - k.sqrt()))
}

/// BRDF used for next event estimation.
/// Materials with the exponent `PHONG_LIGHT_EXPONENT` get a glossy lobe whose back side
/// falls back to a Lambert term weighted by `-q`.
pub fn light_brdf(
    material: &Material,
    incoming: &WorldVector,
    normal: &WorldVector,
    to_light: &WorldVector,
) -> Color {
    if material.ns != PHONG_LIGHT_EXPONENT {
        return lambert(material);
    }
    let q = reflect(incoming, normal).dot(to_light);
    if q < 0.0 {
        material.kd * (-q / PI)
    } else {
        phong_lobe(material, q)
    }
}

fn phong_lobe(material: &Material, q: FloatType) -> Color {
    let n = material.ns;
    material.ks * ((n + 2.0) * q.powf(n) / (2.0 * PI))
}

/// Normalized Phong lobe around the mirror direction.
pub fn phong(
    material: &Material,
    incoming: &WorldVector,
    normal: &WorldVector,
    outgoing: &WorldVector,
) -> Color {
    let q = reflect(incoming, normal).dot(outgoing);
    if q < 0.0 {
        Color::zeros()
    } else {
        phong_lobe(material, q)
    }
}

/// Beckmann distribution of the half vector, scaled by the diffuse color.
pub fn beckmann(
    material: &Material,
    incoming: &WorldVector,
    normal: &WorldVector,
    outgoing: &WorldVector,
) -> Color {
    let half = (outgoing - incoming).normalize();
    let cos_delta = half.dot(normal);
    if !(cos_delta > 0.0) {
        return Color::zeros();
    }
    let cos2 = cos_delta * cos_delta;
    let tan2 = (1.0 - cos2) / cos2;
    let alpha2 = BECKMANN_ALPHA * BECKMANN_ALPHA;
    let d = (-tan2 / alpha2).exp() / (PI * alpha2 * cos2 * cos2);
    material.kd * d
}

pub fn lambert(material: &Material) -> Color {
    material.kd / PI
}

/// BRDF of a sampled bounce on a non-specular surface.
pub fn surface_brdf(
    material: &Material,
    use_microfacet: bool,
    incoming: &WorldVector,
    normal: &WorldVector,
    outgoing: &WorldVector,
) -> Color {
    if material.has_highlight() {
        phong(material, incoming, normal, outgoing)
    } else if use_microfacet {
        beckmann(material, incoming, normal, outgoing)
    } else {
        lambert(material)
    }
}
