//! Criterion benchmarks for VBAP gain calculation.
//!
//! Measures per-object gain computation over rings of increasing size
//! (linear triplet search) and the inverse-matrix recomputation triggered by
//! a listener move.
//!
//! Run with: `cargo bench -p orbis-panning -- vbap/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use orbis_panning::{LoudspeakerArray, Vbap, Vector3, spherical_to_cartesian};

/// Two rings of `count` loudspeakers at 0 and 45 degrees elevation, closed
/// by a zenith loudspeaker.
fn dome(count: usize) -> LoudspeakerArray {
    let mut b = LoudspeakerArray::builder();
    for ring in 0..2 {
        for i in 0..count {
            let az = 360.0 * i as f32 / count as f32;
            let id = ring * count + i + 1;
            b = b.speaker(id, id, spherical_to_cartesian(az, 45.0 * ring as f32, 2.0));
        }
    }
    let zenith = 2 * count + 1;
    b = b.speaker(zenith, zenith, Vector3::new(0.0, 0.0, 2.0));
    for i in 0..count {
        let (lo, lo_next) = (i + 1, (i + 1) % count + 1);
        let (hi, hi_next) = (lo + count, lo_next + count);
        b = b
            .triplet(&[lo, lo_next, hi])
            .triplet(&[lo_next, hi_next, hi])
            .triplet(&[hi, hi_next, zenith]);
    }
    b.build().unwrap()
}

fn bench_gains(c: &mut Criterion) {
    let mut group = c.benchmark_group("vbap/gains");
    for &count in &[4usize, 8, 16, 32] {
        let array = dome(count);
        let mut vbap = Vbap::new(&array).unwrap();
        let mut gains = vec![0.0f32; array.number_of_regular_speakers()];
        let sources: Vec<_> = (0..64)
            .map(|i| spherical_to_cartesian(i as f32 * 5.6, (i % 8) as f32 * 10.0, 1.0))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                for &s in &sources {
                    black_box(vbap.calculate_gains(s, false, &mut gains));
                }
            });
        });
    }
    group.finish();
}

fn bench_listener_move(c: &mut Criterion) {
    let array = dome(16);
    let mut vbap = Vbap::new(&array).unwrap();
    let mut x = 0.0f32;
    c.bench_function("vbap/listener_move", |b| {
        b.iter(|| {
            x = (x + 0.01) % 0.5;
            black_box(vbap.set_listener_position(Vector3::new(x, 0.0, 0.0)))
        });
    });
}

criterion_group!(benches, bench_gains, bench_listener_move);
criterion_main!(benches);
