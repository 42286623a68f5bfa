//! Criterion benchmarks for grove-rf: tree induction, forest training, and voting.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use grove_rf::{
    Comparator, DecisionTreeConfig, FeatureList, Label, RandomForestConfig, Sample, SearchStrategy,
};

fn make_classification(n_samples: usize, n_columns: usize, seed: u64) -> (Vec<Sample>, Vec<FeatureList>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let samples: Vec<Sample> = (0..n_samples)
        .map(|i| {
            let up = i % 2 == 0;
            let values: Vec<(String, f64)> = (0..n_columns)
                .map(|f| {
                    let base = if f < 3 && up { 3.0 } else { 0.0 };
                    (format!("f{f}"), base + rng.r#gen::<f64>() * 0.5)
                })
                .collect();
            Sample::new(values, Label::directional(up))
        })
        .collect();
    let lists = (0..n_columns)
        .map(|f| {
            let column = format!("f{f}");
            let values: Vec<f64> = samples.iter().map(|s| s.numeric(&column).unwrap()).collect();
            FeatureList::from_values(column, Comparator::GreaterOrEqual, values)
        })
        .collect();
    (samples, lists)
}

fn bench_forest_train(c: &mut Criterion) {
    let (samples, lists) = make_classification(500, 20, 42);
    let cfg = RandomForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("forest_train_500x20_50trees", |b| {
        b.iter(|| cfg.fit(&samples, &lists).unwrap());
    });
}

fn bench_classify_batch(c: &mut Criterion) {
    let (samples, lists) = make_classification(500, 20, 42);
    let forest = RandomForestConfig::new(50)
        .unwrap()
        .with_seed(42)
        .fit(&samples, &lists)
        .unwrap()
        .into_forest();

    c.bench_function("forest_classify_batch_500x20_50trees", |b| {
        b.iter(|| forest.classify_batch(&samples, 7).unwrap());
    });
}

fn bench_single_tree(c: &mut Criterion) {
    let (samples, lists) = make_classification(500, 20, 42);
    let mut group = c.benchmark_group("single_tree_500x20");
    for (name, search) in [
        ("bisection", SearchStrategy::Bisection),
        ("exhaustive", SearchStrategy::Exhaustive),
    ] {
        let cfg = DecisionTreeConfig::new().with_search(search);
        group.bench_function(name, |b| {
            b.iter(|| cfg.fit(&samples, &lists).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forest_train, bench_classify_batch, bench_single_tree);
criterion_main!(benches);
