use criterion::{black_box, criterion_group, criterion_main, Criterion};
use neurodecode::{Basis, Deconvolver, Event, FrameGrid, Matrix, RegressorGenerator};

/// 30 events over 200 frames, alternating between three conditions.
fn schedule() -> Vec<Vec<Event>> {
    let mut conditions = vec![Vec::new(); 3];
    for k in 0..30 {
        conditions[k % 3].push(Event::new(10.0 + 12.0 * k as f64, 1.0, 1.0));
    }
    conditions
}

fn roi_data(n_timepoints: usize, n_voxels: usize) -> Matrix {
    Matrix::from_fn(n_timepoints, n_voxels, |t, v| ((t * 13 + v * 7) as f64 * 0.1).sin())
}

fn bench_deconvolution(c: &mut Criterion) {
    let conditions = schedule();
    let data = roi_data(200, 50);

    let mut group = c.benchmark_group("deconvolution");
    group.sample_size(20);
    group.bench_function("regressor_canonical", |b| {
        let generator = RegressorGenerator::new(FrameGrid::new(200, 2.0), Basis::Canonical).unwrap();
        b.iter(|| black_box(generator.regressor(black_box(&conditions[0]))));
    });

    group.bench_function("canonical_split_confounds", |b| {
        let deconv = Deconvolver::new().tr(2.0);
        b.iter(|| black_box(deconv.deconvolve(black_box(&data), &conditions).unwrap()));
    });

    group.bench_function("fir_8_bins", |b| {
        let deconv = Deconvolver::new().tr(2.0).basis(Basis::Fir { bins: 8 });
        b.iter(|| black_box(deconv.deconvolve(black_box(&data), &conditions).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_deconvolution);
criterion_main!(benches);
