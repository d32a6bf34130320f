use crate::{
    camera::Camera,
    geometry::{FloatType, WorldPoint},
    settings::RenderSettings,
};

use super::{BufferError, layout::MAX_EXACT_INTEGER};

pub const META_RECORD_LEN: usize = 52;

mod field {
    pub const RESOLUTION: usize = 0;
    pub const FOCAL_LENGTH: usize = 2;
    pub const VERTICAL_FOV: usize = 3;
    pub const CAMERA_POSITION: usize = 4;
    pub const INVERSE_RESOLUTION: usize = 8;
    pub const ASPECT: usize = 10;
    pub const FRAME: usize = 11;
    pub const WORLD_TO_CAMERA: usize = 12;
    pub const CAMERA_TO_WORLD: usize = 28;
    pub const SAMPLES_PER_PIXEL: usize = 44;
    pub const CONTINUATION_PROBABILITY: usize = 45;
    pub const DIRECT_LIGHTING_ONLY: usize = 46;
    pub const USE_MICROFACET: usize = 47;
    pub const USE_IMPORTANCE_SAMPLING: usize = 48;
}

/// Per-dispatch metadata: resolution, camera and render settings in one flat record.
/// Matrices are stored column major.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MetaRecord(pub [FloatType; META_RECORD_LEN]);

fn flag(value: bool) -> FloatType {
    if value { 1.0 } else { 0.0 }
}

impl MetaRecord {
    /// The frame counter is reduced to stay exactly representable.
    pub fn new(camera: &Camera, settings: &RenderSettings, frame: u32) -> MetaRecord {
        let mut r = [0.0; META_RECORD_LEN];
        let (width, height) = (settings.width as FloatType, settings.height as FloatType);

        r[field::RESOLUTION] = width;
        r[field::RESOLUTION + 1] = height;
        r[field::FOCAL_LENGTH] = camera.focal_length();
        r[field::VERTICAL_FOV] = camera.vertical_fov();
        let position = camera.position();
        r[field::CAMERA_POSITION..field::CAMERA_POSITION + 4]
            .copy_from_slice(&[position.x, position.y, position.z, 1.0]);
        r[field::INVERSE_RESOLUTION] = 1.0 / width;
        r[field::INVERSE_RESOLUTION + 1] = 1.0 / height;
        r[field::ASPECT] = settings.aspect_ratio();
        r[field::FRAME] = (frame as usize % MAX_EXACT_INTEGER) as FloatType;
        r[field::WORLD_TO_CAMERA..field::WORLD_TO_CAMERA + 16]
            .copy_from_slice(camera.world_to_camera().as_slice());
        r[field::CAMERA_TO_WORLD..field::CAMERA_TO_WORLD + 16]
            .copy_from_slice(camera.camera_to_world().as_slice());
        r[field::SAMPLES_PER_PIXEL] = settings.samples_per_pixel as FloatType;
        r[field::CONTINUATION_PROBABILITY] = settings.continuation_probability;
        r[field::DIRECT_LIGHTING_ONLY] = flag(settings.direct_lighting_only);
        r[field::USE_MICROFACET] = flag(settings.use_microfacet);
        r[field::USE_IMPORTANCE_SAMPLING] = flag(settings.use_importance_sampling);

        MetaRecord(r)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.0)
    }

    fn integer(&self, index: usize, name: &'static str) -> Result<u32, BufferError> {
        let value = self.0[index];
        if value < 0.0 || value.fract() != 0.0 || value > MAX_EXACT_INTEGER as FloatType {
            Err(BufferError::MetaField { field: name, value })
        } else {
            Ok(value as u32)
        }
    }

    /// Decodes the settings, validating them the same way as the settings builder.
    pub fn settings(&self) -> Result<RenderSettings, BufferError> {
        let r = &self.0;
        Ok(RenderSettings::builder()
            .width(self.integer(field::RESOLUTION, "width")?)
            .height(self.integer(field::RESOLUTION + 1, "height")?)
            .samples_per_pixel(self.integer(field::SAMPLES_PER_PIXEL, "samples per pixel")?)
            .continuation_probability(r[field::CONTINUATION_PROBABILITY])
            .direct_lighting_only(r[field::DIRECT_LIGHTING_ONLY] > 0.0)
            .use_microfacet(r[field::USE_MICROFACET] > 0.0)
            .use_importance_sampling(r[field::USE_IMPORTANCE_SAMPLING] > 0.0)
            .build()?)
    }

    pub fn frame(&self) -> Result<u32, BufferError> {
        self.integer(field::FRAME, "frame")
    }

    pub fn camera(&self) -> Result<Camera, BufferError> {
        let r = &self.0;
        if !r.iter().all(|x| x.is_finite()) {
            return Err(BufferError::MetaField {
                field: "camera",
                value: FloatType::NAN,
            });
        }
        let focal_length = r[field::FOCAL_LENGTH];
        if focal_length <= 0.0 {
            return Err(BufferError::MetaField {
                field: "focal length",
                value: focal_length,
            });
        }
        let vertical_fov = r[field::VERTICAL_FOV];
        if !(vertical_fov > 0.0 && vertical_fov < std::f32::consts::PI) {
            return Err(BufferError::MetaField {
                field: "vertical field of view",
                value: vertical_fov,
            });
        }

        let matrix = |start: usize| nalgebra::Matrix4::from_column_slice(&r[start..start + 16]);
        Ok(Camera::from_parts(
            WorldPoint::new(
                r[field::CAMERA_POSITION],
                r[field::CAMERA_POSITION + 1],
                r[field::CAMERA_POSITION + 2],
            ),
            matrix(field::WORLD_TO_CAMERA),
            matrix(field::CAMERA_TO_WORLD),
            focal_length,
            vertical_fov,
        ))
    }
}
