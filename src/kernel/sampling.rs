use std::f32::consts::PI;

use crate::geometry::{FloatType, WorldVector};

/// Orthonormal basis around a unit normal.
/// Branchless construction from Duff et al., "Building an Orthonormal Basis, Revisited".
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Onb {
    pub tangent: WorldVector,
    pub bitangent: WorldVector,
    pub normal: WorldVector,
}

impl Onb {
    pub fn new(normal: &WorldVector) -> Onb {
        let sign = 1.0f32.copysign(normal.z);
        let a = -1.0 / (sign + normal.z);
        let b = normal.x * normal.y * a;

        Onb {
            tangent: WorldVector::new(
                1.0 + sign * normal.x * normal.x * a,
                sign * b,
                -sign * normal.x,
            ),
            bitangent: WorldVector::new(b, sign + normal.y * normal.y * a, -normal.y),
            normal: *normal,
        }
    }

    pub fn to_world(&self, local: &WorldVector) -> WorldVector {
        self.tangent * local.x + self.bitangent * local.y + self.normal * local.z
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionSample {
    pub direction: WorldVector,
    /// Solid angle density of the direction
    pub pdf: FloatType,
}

/// Samples a direction in the hemisphere around `normal`, either cosine weighted
/// (`importance`) or uniformly.
pub fn sample_hemisphere(
    normal: &WorldVector,
    sample: (FloatType, FloatType),
    importance: bool,
) -> DirectionSample {
    let (xi1, xi2) = sample;
    let phi = 2.0 * PI * xi1;
    let cos_theta = if importance { xi2.sqrt() } else { xi2 };
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    let local = WorldVector::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    let pdf = if importance {
        cos_theta / PI
    } else {
        1.0 / (2.0 * PI)
    };

    DirectionSample {
        direction: Onb::new(normal).to_world(&local),
        pdf,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::test::nonzero_world_vector_strategy;
    use assert2::assert;
    use proptest::prop_assume;
    use test_case::test_case;
    use test_strategy::proptest;

    #[proptest]
    fn basis_is_orthonormal(#[strategy(nonzero_world_vector_strategy())] n: WorldVector) {
        let n = n.normalize();
        let onb = Onb::new(&n);

        for v in [onb.tangent, onb.bitangent, onb.normal] {
            assert!((v.norm() - 1.0).abs() < 1e-4);
        }
        assert!(onb.tangent.dot(&onb.bitangent).abs() < 1e-4);
        assert!(onb.tangent.dot(&onb.normal).abs() < 1e-4);
        assert!(onb.bitangent.dot(&onb.normal).abs() < 1e-4);
    }

    #[test_case(WorldVector::z() ; "up")]
    #[test_case(-WorldVector::z() ; "down")]
    #[test_case(WorldVector::x() ; "sideways")]
    fn basis_near_poles(n: WorldVector) {
        let onb = Onb::new(&n);
        assert!(onb.to_world(&WorldVector::z()) == n);
        assert!(onb.tangent.cross(&onb.bitangent).dot(&n) > 0.99);
    }

    #[proptest]
    fn samples_are_in_hemisphere(
        #[strategy(nonzero_world_vector_strategy())] n: WorldVector,
        #[strategy(0.0f32..1.0)] xi1: f32,
        #[strategy(0.0f32..1.0)] xi2: f32,
        importance: bool,
    ) {
        let n = n.normalize();
        let sample = sample_hemisphere(&n, (xi1, xi2), importance);
        prop_assume!(sample.pdf > 0.0);

        assert!((sample.direction.norm() - 1.0).abs() < 1e-3);
        assert!(sample.direction.dot(&n) >= -1e-4);
        if importance {
            assert!((sample.pdf - sample.direction.dot(&n).max(0.0) / PI).abs() < 1e-3);
        } else {
            assert!(sample.pdf == 1.0 / (2.0 * PI));
        }
    }

    #[test]
    fn cosine_sampling_mean() {
        // E[cos] is 2/3 for cosine weighted and 1/2 for uniform sampling
        let n = WorldVector::y();
        let count = 64;
        let mean = |importance: bool| {
            let mut sum = 0.0;
            for i in 0..count {
                for j in 0..count {
                    let xi = ((i as f32 + 0.5) / count as f32, (j as f32 + 0.5) / count as f32);
                    sum += sample_hemisphere(&n, xi, importance).direction.dot(&n);
                }
            }
            sum / (count * count) as f32
        };
        assert!((mean(true) - 2.0 / 3.0).abs() < 1e-3);
        assert!((mean(false) - 0.5).abs() < 1e-3);
    }
}
