use assert2::assert;
use bon::bon;
use nalgebra::{Isometry3, Matrix4};

use crate::geometry::{EPSILON, FloatType, Ray, WorldPoint, WorldVector};

/// Pinhole camera.
/// Camera space looks down -Z with +Y up, the view plane sits at `z = -focal_length`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    position: WorldPoint,
    world_to_camera: Matrix4<FloatType>,
    camera_to_world: Matrix4<FloatType>,

    focal_length: FloatType,
    /// Full vertical field of view in radians
    vertical_fov: FloatType,
}

#[bon]
impl Camera {
    #[builder]
    pub fn new(
        position: WorldPoint,
        look: WorldVector,
        up: WorldVector,
        #[builder(default = 1.0)] focal_length: FloatType,
        #[builder(default = 60f32.to_radians())] vertical_fov: FloatType,
    ) -> Self {
        assert!(look.norm() > EPSILON, "Look vector must be non-zero");
        assert!(
            look.cross(&up).norm() > EPSILON,
            "`up` and `look` must be linearly independent"
        );
        assert!(focal_length > 0.0);
        assert!(vertical_fov > 0.0 && vertical_fov < std::f32::consts::PI);

        let view = Isometry3::look_at_rh(&position, &(position + look), &up);

        Camera {
            position,
            world_to_camera: view.to_homogeneous(),
            camera_to_world: view.inverse().to_homogeneous(),
            focal_length,
            vertical_fov,
        }
    }
}

impl Camera {
    /// Reassembles a camera from its serialized parts.
    pub(crate) fn from_parts(
        position: WorldPoint,
        world_to_camera: Matrix4<FloatType>,
        camera_to_world: Matrix4<FloatType>,
        focal_length: FloatType,
        vertical_fov: FloatType,
    ) -> Camera {
        Camera {
            position,
            world_to_camera,
            camera_to_world,
            focal_length,
            vertical_fov,
        }
    }

    pub fn position(&self) -> WorldPoint {
        self.position
    }

    pub fn world_to_camera(&self) -> &Matrix4<FloatType> {
        &self.world_to_camera
    }

    pub fn camera_to_world(&self) -> &Matrix4<FloatType> {
        &self.camera_to_world
    }

    pub fn focal_length(&self) -> FloatType {
        self.focal_length
    }

    pub fn vertical_fov(&self) -> FloatType {
        self.vertical_fov
    }

    /// Primary ray through a (possibly jittered, fractional) pixel position.
    /// Pixel (0, 0) is the top left corner of the image.
    pub fn ray(
        &self,
        pixel_x: FloatType,
        pixel_y: FloatType,
        width: u32,
        height: u32,
        aspect_ratio: FloatType,
    ) -> Ray {
        let (width, height) = (width as FloatType, height as FloatType);
        let norm_x = (pixel_x + 0.5) / width - 0.5;
        let norm_y = (height - 1.0 - pixel_y + 0.5) / height - 0.5;

        let plane_height = 2.0 * self.focal_length * (self.vertical_fov * 0.5).tan();
        let plane_width = plane_height * aspect_ratio;

        let on_plane = WorldPoint::new(
            plane_width * norm_x,
            plane_height * norm_y,
            -self.focal_length,
        );
        let world = self.camera_to_world.transform_point(&on_plane);

        Ray::new(self.position, world - self.position)
    }
}
