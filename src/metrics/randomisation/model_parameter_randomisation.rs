//! Model Parameter Randomisation
//!
//! Corrupts the model one layer at a time, regenerates the explanations after
//! every step and measures how similar they still are to the explanations of
//! the intact model. Explanations that stay similar under heavy corruption do
//! not depend on what the model learned, so lower scores are better.
//!
//! Adebayo et al., "Sanity Checks for Saliency Maps", NeurIPS 2018.

use crate::error::{EvalError, Result};
use crate::functions::{AggregateFunc, NormaliseFunc, SimilarityFunc};
use crate::metrics::base::{BatchPairs, CallOptions, EvaluationBatch, EvaluationEngine, MetricConfig};
use crate::metrics::explain::{ExplainContext, Explainer};
use crate::metrics::progress::Progress;
use crate::metrics::scores::{EvaluationScores, LayerScores};
use crate::metrics::warn::warn_parameterisation;
use crate::metrics::{
    DataType, EvaluationCategory, Metric, MetricInfo, ScoreDirection, Similarity,
};
use crate::model::{LayerOrder, ModelInterface};
use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

const NAME: &str = "Model Parameter Randomisation";

const CITATION: &str = "Adebayo, J., Gilmer, J., Muelly, M., Goodfellow, I., Hardt, M., \
                        and Kim, B. \"Sanity Checks for Saliency Maps.\" arXiv preprint, \
                        arXiv:1810.073292v3 (2018)";

/// Configuration for [`ModelParameterRandomisation`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelParameterRandomisationConfig {
    /// Compares regenerated to baseline explanations
    pub similarity_func: SimilarityFunc,
    pub layer_order: LayerOrder,
    /// Base seed; layer `i` is randomised with `seed + i`
    pub seed: u64,
    /// Reduce the per-layer scores to one mean score per instance
    pub return_sample_correlation: bool,
    pub abs: bool,
    pub normalise: bool,
    pub normalise_func: NormaliseFunc,
    /// Only valid together with `return_sample_correlation`
    pub return_aggregate: bool,
    pub aggregate_func: AggregateFunc,
    pub display_progressbar: bool,
    pub disable_warnings: bool,
}

impl Default for ModelParameterRandomisationConfig {
    fn default() -> Self {
        Self {
            similarity_func: SimilarityFunc::CorrelationSpearman,
            layer_order: LayerOrder::Independent,
            seed: 42,
            return_sample_correlation: false,
            abs: true,
            normalise: true,
            normalise_func: NormaliseFunc::NormaliseByMax,
            return_aggregate: false,
            aggregate_func: AggregateFunc::Mean,
            display_progressbar: false,
            disable_warnings: false,
        }
    }
}

impl ModelParameterRandomisationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration, rejecting unknown keys and invalid values
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EvalError::InvalidConfiguration(e.to_string()))
    }

    pub fn with_similarity_func(mut self, similarity_func: SimilarityFunc) -> Self {
        self.similarity_func = similarity_func;
        self
    }

    pub fn with_layer_order(mut self, layer_order: LayerOrder) -> Self {
        self.layer_order = layer_order;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sample_correlation(mut self, enabled: bool) -> Self {
        self.return_sample_correlation = enabled;
        self
    }

    pub fn with_abs(mut self, abs: bool) -> Self {
        self.abs = abs;
        self
    }

    pub fn with_normalise(mut self, normalise: bool) -> Self {
        self.normalise = normalise;
        self
    }

    pub fn with_normalise_func(mut self, normalise_func: NormaliseFunc) -> Self {
        self.normalise_func = normalise_func;
        self
    }

    pub fn with_aggregate(mut self, aggregate_func: AggregateFunc) -> Self {
        self.return_aggregate = true;
        self.aggregate_func = aggregate_func;
        self
    }

    pub fn with_progressbar(mut self, enabled: bool) -> Self {
        self.display_progressbar = enabled;
        self
    }

    pub fn with_warnings_disabled(mut self) -> Self {
        self.disable_warnings = true;
        self
    }

    fn metric_config(&self) -> MetricConfig {
        MetricConfig {
            abs: self.abs,
            normalise: self.normalise,
            normalise_func: self.normalise_func.clone(),
            return_aggregate: self.return_aggregate,
            aggregate_func: self.aggregate_func,
            display_progressbar: self.display_progressbar,
            disable_warnings: self.disable_warnings,
        }
    }
}

/// Layer-randomisation sanity check
#[derive(Debug, Clone)]
pub struct ModelParameterRandomisation {
    config: ModelParameterRandomisationConfig,
    similarity: Similarity,
    engine: EvaluationEngine,
}

impl ModelParameterRandomisation {
    pub const INFO: MetricInfo = MetricInfo {
        name: NAME,
        score_direction: ScoreDirection::Lower,
        evaluation_category: EvaluationCategory::Randomisation,
        data_applicability: &[DataType::Image, DataType::TimeSeries, DataType::Tabular],
    };

    pub fn new(config: ModelParameterRandomisationConfig) -> Result<Self> {
        if config.return_aggregate && !config.return_sample_correlation {
            return Err(EvalError::InvalidConfiguration(
                "return_aggregate requires return_sample_correlation, since per-layer \
                 scores cannot be aggregated"
                    .to_string(),
            ));
        }
        if !config.disable_warnings {
            warn_parameterisation(
                NAME,
                "similarity metric 'similarity_func' and the order of the layer \
                 randomisation 'layer_order'",
                CITATION,
            );
        }

        Ok(Self {
            similarity: Similarity::Builtin(config.similarity_func),
            engine: EvaluationEngine::new(config.metric_config()),
            config,
        })
    }

    /// Replace the built-in similarity function with a custom one
    pub fn with_custom_similarity<F>(mut self, f: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        self.similarity = Similarity::custom(f);
        self
    }

    pub fn config(&self) -> &ModelParameterRandomisationConfig {
        &self.config
    }

    /// Result of the most recent call
    pub fn evaluation_scores(&self) -> Option<&EvaluationScores> {
        self.engine.evaluation_scores()
    }

    /// Every result since construction, oldest first
    pub fn all_evaluation_scores(&self) -> &[EvaluationScores] {
        self.engine.all_evaluation_scores()
    }

    fn score_layers<M: ModelInterface>(
        &self,
        model: &M,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        baseline: &ArrayD<f64>,
        explainer: &dyn Explainer<M>,
        options: &CallOptions,
    ) -> Result<LayerScores> {
        let names = model.layer_names();
        let mut seen = HashSet::with_capacity(names.len());
        if let Some(repeated) = names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(EvalError::InvalidConfiguration(format!(
                "layer '{}' appears more than once in the model's layer names",
                repeated
            )));
        }

        let n = x.shape()[0];
        let mut layer_scores = LayerScores::new();
        if n == 0 {
            return Ok(layer_scores);
        }

        let ctx = options.explain_context();
        let mut progress = Progress::new(
            NAME,
            model.random_layer_generator_length() * n,
            self.config.display_progressbar,
        );

        for step in model.random_layer_generator(self.config.layer_order, self.config.seed) {
            let (layer, corrupted) = step?;
            progress.set_step(&layer);

            let regenerated = self.engine.generate_explanations(
                &corrupted,
                x,
                y,
                options.batch_size,
                explainer,
                &ctx,
            );

            let mut scores = Vec::with_capacity(n);
            for pair in BatchPairs::new(baseline, options.batch_size, regenerated) {
                let (a_batch, a_perturbed) = pair?;
                for (a, a_perturbed) in a_batch.outer_iter().zip(a_perturbed.outer_iter()) {
                    let a: Vec<f64> = a.iter().copied().collect();
                    let a_perturbed: Vec<f64> = a_perturbed.iter().copied().collect();
                    scores.push(self.similarity.score(&a_perturbed, &a)?);
                }
                progress.update(a_batch.shape()[0]);
            }

            debug!(layer = %layer, instances = scores.len(), "Scored randomised layer");
            layer_scores.insert(layer, scores);
        }
        progress.finish();

        Ok(layer_scores)
    }
}

impl<M: ModelInterface> Metric<M> for ModelParameterRandomisation {
    fn info(&self) -> MetricInfo {
        Self::INFO
    }

    fn engine(&self) -> &EvaluationEngine {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut EvaluationEngine {
        &mut self.engine
    }

    fn requires_explainer(&self) -> bool {
        true
    }

    fn evaluate_batch(
        &self,
        _model: &M,
        _x: &ArrayD<f64>,
        _y: &Array1<usize>,
        _a: &ArrayD<f64>,
        _explainer: Option<&dyn Explainer<M>>,
        _ctx: &ExplainContext,
        _offset: usize,
    ) -> Result<Vec<f64>> {
        Err(EvalError::UnsupportedOperation(format!(
            "{} scores whole layers and cannot be evaluated batch by batch",
            NAME
        )))
    }

    /// Score every randomisation step against the baseline explanations.
    ///
    /// Returns `PerLayer` scores, `PerSample` means when
    /// `return_sample_correlation` is set, or a single `Aggregate` value when
    /// `return_aggregate` is set as well.
    fn evaluate(
        &mut self,
        model: &M,
        batch: EvaluationBatch,
        explainer: Option<&dyn Explainer<M>>,
        options: &CallOptions,
    ) -> Result<EvaluationScores> {
        let explainer = explainer.ok_or(EvalError::MissingExplainFunction)?;
        let data = self
            .engine
            .general_preprocess(model, batch, Some(explainer), options)?;

        let layer_scores = self.score_layers(
            model,
            &data.x_batch,
            &data.y_batch,
            &data.a_batch,
            explainer,
            options,
        )?;

        let mut result = EvaluationScores::PerLayer(layer_scores);
        if self.config.return_sample_correlation {
            let per_sample = EvaluationEngine::compute_correlation_per_sample(&result)?;
            result = if self.config.return_aggregate {
                let values: Vec<f64> = per_sample.values().copied().collect();
                self.engine.aggregate(&values)
            } else {
                EvaluationScores::PerSample(per_sample)
            };
        }

        Ok(self.engine.record(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activation, DenseNetwork};
    use ndarray::{Array2, ArrayViewD, IxDyn};
    use rand::RngCore;

    fn input_times_output(
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

    fn setup() -> (DenseNetwork, EvaluationBatch) {
        let model = DenseNetwork::new(&[5, 4, 3], Activation::Tanh, 7).unwrap();
        let x = ArrayD::from_shape_fn(IxDyn(&[4, 5]), |idx| {
            ((idx[0] * 5 + idx[1]) as f64 * 0.37).sin()
        });
        (model, EvaluationBatch::new(x, Array1::from(vec![0, 1, 2, 0])))
    }

    #[test]
    fn test_defaults() {
        let config = ModelParameterRandomisationConfig::default();
        assert_eq!(config.similarity_func, SimilarityFunc::CorrelationSpearman);
        assert_eq!(config.layer_order, LayerOrder::Independent);
        assert_eq!(config.seed, 42);
        assert!(config.abs && config.normalise);
        assert!(!config.return_sample_correlation);
    }

    #[test]
    fn test_aggregate_without_sample_correlation_rejected() {
        let config = ModelParameterRandomisationConfig::new()
            .with_aggregate(AggregateFunc::Mean)
            .with_warnings_disabled();
        let err = ModelParameterRandomisation::new(config).unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_from_json_rejects_bad_order() {
        let err = ModelParameterRandomisationConfig::from_json(r#"{"layer_order": "bottom_up"}"#)
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfiguration(_)));

        let config =
            ModelParameterRandomisationConfig::from_json(r#"{"layer_order": "top_down", "seed": 3}"#)
                .unwrap();
        assert_eq!(config.layer_order, LayerOrder::TopDown);
        assert_eq!(config.seed, 3);
        assert!(config.abs);
    }

    #[test]
    fn test_per_layer_scores() {
        let (model, batch) = setup();
        let mut metric = ModelParameterRandomisation::new(
            ModelParameterRandomisationConfig::new().with_warnings_disabled(),
        )
        .unwrap();
        let explainer: &dyn Explainer<DenseNetwork> = &input_times_output;
        let scores = metric
            .evaluate(&model, batch, Some(explainer), &CallOptions::new().with_batch_size(3))
            .unwrap();
        let layers = scores.as_per_layer().unwrap();
        assert_eq!(layers.keys().collect::<Vec<_>>(), vec!["dense_0", "dense_1"]);
        for (_, values) in layers.iter() {
            assert_eq!(values.len(), 4);
            assert!(values.iter().all(|v| v.is_nan() || (-1.0..=1.0).contains(v)));
        }
    }

    /// Backend that reports the same id for every layer
    #[derive(Clone)]
    struct SharedNames(DenseNetwork);

    impl ModelInterface for SharedNames {
        fn predict(&self, x: &ArrayViewD<f64>, softmax: bool) -> Result<Array2<f64>> {
            self.0.predict(x, softmax)
        }

        fn layer_names(&self) -> Vec<String> {
            vec!["block".to_string(); self.0.layers().len()]
        }

        fn randomise_layer(&mut self, index: usize, rng: &mut dyn RngCore) -> Result<()> {
            self.0.randomise_layer(index, rng)
        }
    }

    fn shared_input_times_output(
        model: &SharedNames,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        ctx: &ExplainContext,
    ) -> Result<ArrayD<f64>> {
        input_times_output(&model.0, x, y, ctx)
    }

    #[test]
    fn test_repeated_layer_names_rejected() {
        let (model, batch) = setup();
        let model = SharedNames(model);
        let explainer: &dyn Explainer<SharedNames> = &shared_input_times_output;

        let mut metric = ModelParameterRandomisation::new(
            ModelParameterRandomisationConfig::new().with_warnings_disabled(),
        )
        .unwrap();
        let err = metric
            .evaluate(&model, batch, Some(explainer), &CallOptions::new())
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfiguration(ref msg) if msg.contains("block")));
        assert!(metric.all_evaluation_scores().is_empty());
    }

    #[test]
    fn test_evaluate_batch_unsupported() {
        let (model, batch) = setup();
        let metric = ModelParameterRandomisation::new(
            ModelParameterRandomisationConfig::new().with_warnings_disabled(),
        )
        .unwrap();
        let a = batch.x_batch.clone();
        let err = Metric::<DenseNetwork>::evaluate_batch(
            &metric,
            &model,
            &batch.x_batch,
            &batch.y_batch,
            &a,
            None,
            &ExplainContext::default(),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::UnsupportedOperation(_)));
    }
}
