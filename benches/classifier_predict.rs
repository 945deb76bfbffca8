use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use handsign::ml::mlp::{MlpModel, TrainOptions, TrainSet, train_mlp};

const FEATURE_LEN: usize = 18;

fn trained_model(classes: usize) -> MlpModel {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for class in 0..classes {
        for i in 0..8 {
            x.push(
                (0..FEATURE_LEN)
                    .map(|f| (class * 10 + f) as f32 + i as f32 * 0.05)
                    .collect(),
            );
            y.push(class);
        }
    }
    let set = TrainSet {
        feature_len_f32: FEATURE_LEN,
        classes: (0..classes).map(|class| format!("gesture_{class}")).collect(),
        x,
        y,
    };
    let options = TrainOptions {
        epochs: 2,
        ..TrainOptions::default()
    };
    match train_mlp(&set, &options) {
        Ok((model, _)) => model,
        Err(err) => panic!("bench model failed to train: {err}"),
    }
}

fn bench_predict(c: &mut Criterion) {
    let features: Vec<f32> = (0..FEATURE_LEN).map(|f| f as f32 * 1.5).collect();
    for classes in [2usize, 8] {
        let model = trained_model(classes);
        c.bench_with_input(
            BenchmarkId::new("predict_proba", classes),
            &features,
            |b, features| {
                b.iter(|| model.predict_proba(black_box(features)));
            },
        );
    }
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
