//! Per-pixel path tracing over decoded scene tables.

pub mod brdf;
mod integrator;
pub mod lights;
mod ray_bvh_intersection;
pub mod sampling;

pub use integrator::{MAX_BOUNCE, radiance};
pub use ray_bvh_intersection::{Intersection, TRAVERSAL_STACK_CAPACITY, TraversalStack};

use crate::{
    camera::Camera,
    geometry::{Color, FloatType},
    packing::{BufferError, MetaRecord, SceneTables},
    random::SampleStream,
    settings::RenderSettings,
};

/// Linear radiance of one pixel.
pub type Rgb = rgb::RGB<FloatType>;

/// Immutable per-dispatch inputs of the kernel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KernelContext {
    pub settings: RenderSettings,
    pub camera: Camera,
    /// Frame counter, decorrelates the seeds of successive dispatches
    pub frame: u32,
}

impl KernelContext {
    pub fn new(settings: RenderSettings, camera: Camera, frame: u32) -> KernelContext {
        KernelContext {
            settings,
            camera,
            frame,
        }
    }

    pub fn from_meta(meta: &MetaRecord) -> Result<KernelContext, BufferError> {
        Ok(KernelContext {
            settings: meta.settings()?,
            camera: meta.camera()?,
            frame: meta.frame()?,
        })
    }

    pub fn to_meta(&self) -> MetaRecord {
        MetaRecord::new(&self.camera, &self.settings, self.frame)
    }
}

/// The per-pixel entry point, bound to one dispatch.
#[derive(Copy, Clone, Debug)]
pub struct Kernel<'a> {
    context: KernelContext,
    tables: &'a SceneTables,
}

impl<'a> Kernel<'a> {
    pub fn new(context: KernelContext, tables: &'a SceneTables) -> Kernel<'a> {
        Kernel { context, tables }
    }

    pub fn context(&self) -> &KernelContext {
        &self.context
    }

    pub fn tables(&self) -> &'a SceneTables {
        self.tables
    }

    /// Mean radiance of `samples_per_pixel` jittered camera paths through the pixel.
    /// Samples that come out non-finite count as black.
    pub fn render_pixel(&self, x: u32, y: u32) -> Rgb {
        let settings = &self.context.settings;
        let pixel_index = y.wrapping_mul(settings.width).wrapping_add(x);

        let mut sum = Color::zeros();
        for sample in 0..settings.samples_per_pixel {
            let mut stream = SampleStream::for_sample(pixel_index, self.context.frame, sample);
            let (jitter_x, jitter_y) = stream.next_vec2();
            let ray = self.context.camera.ray(
                x as FloatType + jitter_x - 0.5,
                y as FloatType + jitter_y - 0.5,
                settings.width,
                settings.height,
                settings.aspect_ratio(),
            );

            let l = radiance(settings, self.tables, ray, &mut stream);
            if l.iter().all(|c| c.is_finite()) {
                sum += l;
            }
        }

        let mean = sum / settings.samples_per_pixel as FloatType;
        Rgb::new(mean.x, mean.y, mean.z)
    }
}
