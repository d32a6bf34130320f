use flatpath::{
    Accumulator, Kernel, KernelContext, RenderSettings, SceneTables, pack_group, render_frame,
    scene::{
        cornell_box,
        triangle_bvh::{BvhSettings, TriangleBvh},
    },
};

use indicatif::ProgressBar;
use rand::{Rng as _, SeedableRng as _, rngs::SmallRng};
use tracing_subscriber::EnvFilter;

const FRAME_COUNT: u32 = 16;
const OUTPUT_PATH: &str = "cornell_box.png";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = RenderSettings::builder()
        .width(512)
        .height(512)
        .samples_per_pixel(4)
        .continuation_probability(0.8)
        .build()?;
    let camera = cornell_box::camera();

    let scene = cornell_box::scene()?;
    let bvh = TriangleBvh::build(&scene, &BvhSettings::default());
    tracing::info!("BVH: {}", bvh.statistics());

    let packed = pack_group(&scene, &bvh)?;
    let tables = SceneTables::decode(&[packed])?;

    // Random starting frame, so separate runs can be averaged together
    let first_frame = SmallRng::from_os_rng().random_range(0..1 << 20);

    let mut accumulator = Accumulator::new(settings.width, settings.height);
    let bar = ProgressBar::new(FRAME_COUNT as u64);
    for frame in first_frame..first_frame + FRAME_COUNT {
        let kernel = Kernel::new(KernelContext::new(settings, camera, frame), &tables);
        let pixels = render_frame(&kernel, |_| {})?;
        accumulator.add_frame(&pixels)?;
        bar.inc(1);
        tracing::info!(frame, accumulated = accumulator.frames(), "Frame finished");
    }
    bar.finish();

    accumulator.to_image().save(OUTPUT_PATH)?;
    tracing::info!(path = OUTPUT_PATH, "Saved image");

    Ok(())
}
