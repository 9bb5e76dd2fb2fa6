use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use explain_eval::prelude::*;
use ndarray::{Array1, ArrayD, IxDyn};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

fn random_vector(n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<f64> {
    (0..n).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect()
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);

    for n in [256, 4096].iter() {
        let a = random_vector(*n, &mut rng);
        let b = random_vector(*n, &mut rng);

        for func in [
            SimilarityFunc::CorrelationSpearman,
            SimilarityFunc::CorrelationPearson,
            SimilarityFunc::Ssim,
            SimilarityFunc::Cosine,
        ] {
            group.bench_with_input(BenchmarkId::new(func.name(), n), &(&a, &b), |bench, (a, b)| {
                bench.iter(|| func.compute(black_box(a), black_box(b)).unwrap())
            });
        }
    }

    group.finish();
}

fn saliency(
    model: &DenseNetwork,
    x: &ArrayD<f64>,
    _y: &Array1<usize>,
    _ctx: &ExplainContext,
) -> Result<ArrayD<f64>> {
    let out = model.predict(&x.view(), false)?;
    let mut a = x.clone();
    for (mut row, o) in a.outer_iter_mut().zip(out.rows()) {
        let scale = o.sum();
        row.mapv_inplace(|v| v * scale);
    }
    Ok(a)
}

fn bench_parameter_randomisation(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_parameter_randomisation");
    group.sample_size(10);

    let model = DenseNetwork::new(&[64, 32, 32, 10], Activation::ReLU, 0).unwrap();
    let explainer: &dyn Explainer<DenseNetwork> = &saliency;

    for n in [32, 256].iter() {
        let x = ArrayD::from_shape_fn(IxDyn(&[*n, 64]), |idx| ((idx[0] * 64 + idx[1]) as f64).sin());
        let batch = EvaluationBatch::new(x, Array1::zeros(*n));

        for order in [LayerOrder::Independent, LayerOrder::TopDown] {
            group.bench_with_input(BenchmarkId::new(order.name(), n), &batch, |bench, batch| {
                bench.iter(|| {
                    let mut metric = ModelParameterRandomisation::new(
                        ModelParameterRandomisationConfig::new()
                            .with_layer_order(order)
                            .with_warnings_disabled(),
                    )
                    .unwrap();
                    metric
                        .evaluate(&model, black_box(batch.clone()), Some(explainer), &CallOptions::new())
                        .unwrap()
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_similarity, bench_parameter_randomisation);
criterion_main!(benches);
