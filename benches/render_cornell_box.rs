use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use flatpath::{
    Kernel, KernelContext, RenderSettings, SceneTables, pack_group, render_frame,
    scene::{
        cornell_box,
        triangle_bvh::{BvhSettings, TriangleBvh},
    },
};

fn criterion_benchmark(c: &mut Criterion) {
    let settings = RenderSettings::builder()
        .width(256)
        .height(256)
        .samples_per_pixel(4)
        .build()
        .unwrap();
    let scene = cornell_box::scene().unwrap();

    c.bench_function("build_and_pack_cornell_box", |b| {
        b.iter(|| {
            let bvh = TriangleBvh::build(&scene, &BvhSettings::default());
            pack_group(&scene, &bvh).unwrap()
        })
    });

    let bvh = TriangleBvh::build(&scene, &BvhSettings::default());
    let tables = SceneTables::decode(&[pack_group(&scene, &bvh).unwrap()]).unwrap();
    let kernel = Kernel::new(
        KernelContext::new(settings, cornell_box::camera(), 0),
        &tables,
    );

    c.bench_function("render_cornell_box", |b| {
        b.iter(|| render_frame(&kernel, |_| {}).unwrap())
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20).measurement_time(Duration::from_secs(30));
    targets = criterion_benchmark
}
criterion_main!(benches);
