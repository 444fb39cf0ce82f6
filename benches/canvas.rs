//! Benchmarks for canvas compositing and the GPU frame pipeline.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use particle_canvas::{
    compute::{Canvas, Particle, SeedArray, gpu::GpuRenderer},
    schema::RenderConfig,
};

/// Particles scattered over the canvas using the seed generator.
fn scattered_particles(count: u32) -> Vec<Particle> {
    let seeds = SeedArray::from_seed(count, 42);
    (0..count as usize)
        .map(|i| {
            let [sx, sy] = seeds.pair(i);
            Particle {
                position: [sx + 0.5, sy + 0.5],
                color: Particle::pack_rgb(255, (i % 256) as u8, 32),
                ..Default::default()
            }
        })
        .collect()
}

fn bench_host_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_composite");

    for count in [1_000, 10_000, 100_000] {
        let particles = scattered_particles(count);
        let mut canvas = Canvas::new(480);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                canvas.composite(black_box(&particles));
            });
        });
    }

    group.finish();
}

fn bench_rgb_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("rgb_conversion");

    for size in [240, 480, 1024] {
        let mut canvas = Canvas::new(size);
        canvas.composite(&scattered_particles(10_000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| black_box(canvas.to_rgb8()));
            },
        );
    }

    group.finish();
}

fn bench_gpu_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("gpu_frame");

    for count in [1_000, 100_000] {
        let config = RenderConfig {
            particles: count,
            random_seed: Some(42),
            allow_software_adapter: true,
            ..Default::default()
        };

        let mut renderer = match pollster::block_on(GpuRenderer::new(&config)) {
            Ok(renderer) => renderer,
            Err(e) => {
                eprintln!("Skipping GPU benchmark: {e}");
                return;
            }
        };
        renderer
            .initialize(&SeedArray::new(count, config.random_seed))
            .unwrap();
        renderer.warm_up(config.warmup_iterations).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(renderer.render_frame().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_host_composite,
    bench_rgb_conversion,
    bench_gpu_frame
);
criterion_main!(benches);
