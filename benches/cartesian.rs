use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ndarray::Array2;
use radar_volume_analysis::{polar_to_cart, InterpOrder};

fn bench_polar_to_cart(c: &mut Criterion) {
    let polar = Array2::from_shape_fn((360, 250), |(ray, bin)| (ray % 7) as f64 + bin as f64 / 50.0);
    let coords: Vec<f64> = (0..500).map(|i| -250.0 + i as f64 * 1.0).collect();

    for (name, order) in [
        ("polar_to_cart 500x500 nearest", InterpOrder::Nearest),
        ("polar_to_cart 500x500 linear", InterpOrder::Linear),
        ("polar_to_cart 500x500 cubic", InterpOrder::Cubic),
    ]
    .iter()
    {
        c.bench_function(name, |b| {
            b.iter(|| {
                polar_to_cart(
                    black_box(&polar),
                    1.0,
                    1.0,
                    black_box(&coords),
                    black_box(&coords),
                    *order,
                )
            })
        });
    }
}

criterion_group!(benches, bench_polar_to_cart);
criterion_main!(benches);
