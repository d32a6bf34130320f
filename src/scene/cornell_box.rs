//! Built-in demo scene: a Cornell box with a ceiling light, a mirror block and a glossy block.
//!
//! The room spans x and z in [-1, 1], y in [0, 2], the open side faces +Z.

use crate::{
    camera::Camera,
    geometry::{Color, WorldPoint, WorldVector},
};

use super::{Illumination, Material, PHONG_LIGHT_EXPONENT, Scene, SceneBuilder, SceneError};

const LIGHT_HEIGHT: f32 = 1.98;
const LIGHT_HALF_SIZE: f32 = 0.25;

pub fn scene() -> Result<Scene, SceneError> {
    let mut builder = SceneBuilder::new();

    let light = builder.material("light", Material::emitter(Color::new(17.0, 12.0, 4.0)));
    let white = builder.material("white", Material::diffuse(Color::new(0.73, 0.73, 0.73)));
    let red = builder.material("red", Material::diffuse(Color::new(0.65, 0.05, 0.05)));
    let green = builder.material("green", Material::diffuse(Color::new(0.12, 0.45, 0.15)));
    let mirror = builder.material("mirror", Material::mirror());
    let glossy = builder.material(
        "glossy",
        Material::builder()
            .ns(PHONG_LIGHT_EXPONENT)
            .illum(Illumination::Highlight)
            .kd(Color::new(0.5, 0.5, 0.6))
            .ks(Color::new(0.2, 0.2, 0.2))
            .build(),
    );

    let p = WorldPoint::new;

    // Floor, ceiling, back wall
    builder.quad(
        [p(-1.0, 0.0, 1.0), p(1.0, 0.0, 1.0), p(1.0, 0.0, -1.0), p(-1.0, 0.0, -1.0)],
        white,
    );
    builder.quad(
        [p(-1.0, 2.0, -1.0), p(1.0, 2.0, -1.0), p(1.0, 2.0, 1.0), p(-1.0, 2.0, 1.0)],
        white,
    );
    builder.quad(
        [p(-1.0, 0.0, -1.0), p(1.0, 0.0, -1.0), p(1.0, 2.0, -1.0), p(-1.0, 2.0, -1.0)],
        white,
    );

    // Side walls
    builder.quad(
        [p(-1.0, 0.0, 1.0), p(-1.0, 0.0, -1.0), p(-1.0, 2.0, -1.0), p(-1.0, 2.0, 1.0)],
        red,
    );
    builder.quad(
        [p(1.0, 0.0, -1.0), p(1.0, 0.0, 1.0), p(1.0, 2.0, 1.0), p(1.0, 2.0, -1.0)],
        green,
    );

    let s = LIGHT_HALF_SIZE;
    builder.quad(
        [
            p(-s, LIGHT_HEIGHT, -s),
            p(s, LIGHT_HEIGHT, -s),
            p(s, LIGHT_HEIGHT, s),
            p(-s, LIGHT_HEIGHT, s),
        ],
        light,
    );

    builder.cuboid(
        p(-0.35, 0.6, -0.3),
        WorldVector::new(0.6, 1.2, 0.6),
        0.3,
        mirror,
    );
    builder.cuboid(
        p(0.35, 0.3, 0.35),
        WorldVector::new(0.6, 0.6, 0.6),
        -0.3,
        glossy,
    );

    builder.build()
}

/// Camera looking into the box through its open side.
pub fn camera() -> Camera {
    Camera::builder()
        .position(WorldPoint::new(0.0, 1.0, 3.4))
        .look(WorldVector::new(0.0, 0.0, -1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .vertical_fov(40f32.to_radians())
        .build()
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};

    #[test]
    fn builds() {
        let_assert!(Ok(scene) = scene());
        assert!(scene.triangles.len() == 6 * 2 + 2 * 12);
        assert!(scene.emissive_triangle_count() == 2);
        assert!(scene.normals.is_none());
    }

    #[test]
    fn everything_inside_room() {
        let scene = scene().unwrap();
        let b = scene.bounding_box();
        assert!(b.min.x > -1.01);
        assert!(b.max.y < 2.01);
    }
}
