use criterion::{Criterion, criterion_group, criterion_main};
use ndarray::{Array1, Array2};
use safezone::classifier::{Classify, Forest};
use safezone::config::CleaningConfig;
use safezone::encoder::fit_feature_encoder;
use safezone::record::clean_row;
use safezone::serve::Predictor;

fn grid() -> (Array2<f64>, Array1<usize>) {
    let n = 400;
    let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 3)) % 11) as f64);
    let y = Array1::from_shape_fn(n, |i| usize::from(i % 4 != 3));
    (x, y)
}

fn bench_forest_predict(c: &mut Criterion) {
    let (x, y) = grid();
    let forest = Forest::fit(&x, &y, 150, 42).unwrap();

    c.bench_function("forest predict 400 rows", |b| {
        b.iter(|| {
            let _ = forest.predict_labels(&x);
        })
    });
}

fn bench_lookup_prediction(c: &mut Criterion) {
    let cfg = CleaningConfig::default();
    let areas: Vec<String> = (0..200).map(|i| format!("area{i}")).collect();
    let mut records = Vec::new();
    for area in &areas {
        for time in ["Morning", "Night"] {
            let class = if time == "Night" { "Unsafe" } else { "Safe" };
            let record = clean_row(
                |col| match col {
                    "Area" => Some(area.as_str()),
                    "Zone" => Some("North"),
                    "Time" => Some(time),
                    "Class" => Some(class),
                    _ => None,
                },
                &cfg,
            )
            .unwrap();
            records.push(record);
        }
    }

    let encoder = fit_feature_encoder(&records).unwrap();
    let x = safezone::encoder::encode_features(&encoder, &records).unwrap();
    let y: Array1<usize> = records.iter().map(|r| r.class.code()).collect();
    let forest = Forest::fit(&x, &y, 50, 42).unwrap();
    let predictor = Predictor::new(encoder, forest, records);

    c.bench_function("predict exact match", |b| {
        b.iter(|| {
            let _ = predictor.predict("area150", "north", "night");
        })
    });

    c.bench_function("predict via model", |b| {
        b.iter(|| {
            let _ = predictor.predict("area150", "south", "night");
        })
    });
}

criterion_group!(benches, bench_forest_predict, bench_lookup_prediction);
criterion_main!(benches);
