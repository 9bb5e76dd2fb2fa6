//! Random Logit
//!
//! Compares the explanation for the true class with the explanation for a
//! randomly drawn other class. A class-sensitive explanation method should
//! produce dissimilar maps, so lower scores are better.
//!
//! Sixt et al., "When Explanations Lie: Why Many Modified BP Attributions
//! Fail", ICML 2020.

use crate::error::{EvalError, Result};
use crate::functions::{AggregateFunc, NormaliseFunc, SimilarityFunc};
use crate::metrics::base::{EvaluationBatch, EvaluationEngine, MetricConfig};
use crate::metrics::explain::{ExplainContext, Explainer};
use crate::metrics::scores::EvaluationScores;
use crate::metrics::warn::warn_parameterisation;
use crate::metrics::{
    DataType, EvaluationCategory, Metric, MetricInfo, ScoreDirection, Similarity,
};
use crate::model::ModelInterface;
use ndarray::{Array1, ArrayD, Axis};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

const NAME: &str = "Random Logit";

const CITATION: &str = "Sixt, Leon, Granz, Maximilian, and Landgraf, Tim. \"When Explanations \
                        Lie: Why Many Modified BP Attributions Fail.\" arXiv preprint, \
                        arXiv:1912.09818v6 (2020)";

/// Configuration for [`RandomLogit`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomLogitConfig {
    pub similarity_func: SimilarityFunc,
    /// Number of classes the off-label is drawn from
    pub num_classes: usize,
    /// Base seed; instance `i` draws its off-label with `seed + i`
    pub seed: u64,
    pub abs: bool,
    pub normalise: bool,
    pub normalise_func: NormaliseFunc,
    pub return_aggregate: bool,
    pub aggregate_func: AggregateFunc,
    pub display_progressbar: bool,
    pub disable_warnings: bool,
}

impl Default for RandomLogitConfig {
    fn default() -> Self {
        Self {
            similarity_func: SimilarityFunc::Ssim,
            num_classes: 1000,
            seed: 42,
            abs: false,
            normalise: true,
            normalise_func: NormaliseFunc::NormaliseByMax,
            return_aggregate: false,
            aggregate_func: AggregateFunc::Mean,
            display_progressbar: false,
            disable_warnings: false,
        }
    }
}

impl RandomLogitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EvalError::InvalidConfiguration(e.to_string()))
    }

    pub fn with_similarity_func(mut self, similarity_func: SimilarityFunc) -> Self {
        self.similarity_func = similarity_func;
        self
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
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

/// True-class versus random-class explanation similarity
#[derive(Debug, Clone)]
pub struct RandomLogit {
    config: RandomLogitConfig,
    similarity: Similarity,
    engine: EvaluationEngine,
}

impl RandomLogit {
    pub const INFO: MetricInfo = MetricInfo {
        name: NAME,
        score_direction: ScoreDirection::Lower,
        evaluation_category: EvaluationCategory::Randomisation,
        data_applicability: &[DataType::Image, DataType::TimeSeries, DataType::Tabular],
    };

    pub fn new(config: RandomLogitConfig) -> Result<Self> {
        if config.num_classes < 2 {
            return Err(EvalError::InvalidConfiguration(format!(
                "num_classes must be at least 2 to draw another class, got {}",
                config.num_classes
            )));
        }
        if !config.disable_warnings {
            warn_parameterisation(
                NAME,
                "similarity metric 'similarity_func' and the number of classes \
                 'num_classes'",
                CITATION,
            );
        }

        Ok(Self {
            similarity: Similarity::Builtin(config.similarity_func),
            engine: EvaluationEngine::new(config.metric_config()),
            config,
        })
    }

    pub fn with_custom_similarity<F>(mut self, f: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        self.similarity = Similarity::custom(f);
        self
    }

    pub fn config(&self) -> &RandomLogitConfig {
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

    fn check_labels(&self, y: &Array1<usize>) -> Result<()> {
        match y.iter().find(|&&label| label >= self.config.num_classes) {
            Some(&label) => Err(EvalError::InvalidConfiguration(format!(
                "label {} is outside 0..{}",
                label, self.config.num_classes
            ))),
            None => Ok(()),
        }
    }

    /// Uniform draw from every class except `label`
    fn off_label(&self, label: usize, index: usize) -> usize {
        let mut rng =
            Xoshiro256PlusPlus::seed_from_u64(self.config.seed.wrapping_add(index as u64));
        let off = rng.gen_range(0..self.config.num_classes - 1);
        if off >= label {
            off + 1
        } else {
            off
        }
    }
}

impl<M: ModelInterface> Metric<M> for RandomLogit {
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

    fn validate(&self, batch: &EvaluationBatch) -> Result<()> {
        self.check_labels(&batch.y_batch)
    }

    fn evaluate_batch(
        &self,
        model: &M,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        a: &ArrayD<f64>,
        explainer: Option<&dyn Explainer<M>>,
        ctx: &ExplainContext,
        offset: usize,
    ) -> Result<Vec<f64>> {
        let explainer = explainer.ok_or(EvalError::MissingExplainFunction)?;
        self.check_labels(y)?;

        x.outer_iter()
            .zip(a.outer_iter())
            .zip(y.iter())
            .enumerate()
            .map(|(i, ((x_i, a_i), &label))| {
                let off = self.off_label(label, offset + i);
                let x_single = x_i.insert_axis(Axis(0)).to_owned();
                let y_off = Array1::from_elem(1, off);
                let a_off = self
                    .engine
                    .explain_batch(model, &x_single, &y_off, explainer, ctx)?;

                let a_i: Vec<f64> = a_i.iter().copied().collect();
                let a_off: Vec<f64> = a_off.iter().copied().collect();
                self.similarity.score(&a_i, &a_off)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CallOptions;
    use crate::model::{Activation, DenseNetwork};
    use ndarray::IxDyn;

    /// Input scaled by the logit of the requested class
    fn logit_saliency(
        model: &DenseNetwork,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        _ctx: &ExplainContext,
    ) -> Result<ArrayD<f64>> {
        let out = model.predict(&x.view(), false)?;
        let mut a = x.clone();
        for ((mut row, o), &label) in a.outer_iter_mut().zip(out.rows()).zip(y.iter()) {
            let scale = o[label];
            row.mapv_inplace(|v| v * scale);
        }
        Ok(a)
    }

    fn metric(num_classes: usize) -> RandomLogit {
        RandomLogit::new(
            RandomLogitConfig::new()
                .with_num_classes(num_classes)
                .with_similarity_func(SimilarityFunc::CorrelationPearson)
                .with_warnings_disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_off_label_never_true_label() {
        let metric = metric(3);
        for index in 0..50 {
            for label in 0..3 {
                let off = metric.off_label(label, index);
                assert_ne!(off, label);
                assert!(off < 3);
            }
        }
        assert_eq!(metric.off_label(1, 5), metric.off_label(1, 5));
    }

    #[test]
    fn test_rejects_single_class() {
        let err = RandomLogit::new(RandomLogitConfig::new().with_num_classes(1)).unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_scores_one_per_instance() {
        let model = DenseNetwork::new(&[4, 6, 3], Activation::ReLU, 2).unwrap();
        let x = ArrayD::from_shape_fn(IxDyn(&[5, 4]), |idx| (idx[0] + 2 * idx[1]) as f64 + 1.0);
        let batch = EvaluationBatch::new(x, Array1::from(vec![0, 1, 2, 1, 0]));
        let explainer: &dyn Explainer<DenseNetwork> = &logit_saliency;

        let mut metric = metric(3);
        let scores = metric
            .evaluate(&model, batch, Some(explainer), &CallOptions::new().with_batch_size(2))
            .unwrap();
        assert_eq!(scores.as_slice().map(|s| s.len()), Some(5));
        assert_eq!(Metric::<DenseNetwork>::all_evaluation_scores(&metric).len(), 1);
    }

    #[test]
    fn test_label_out_of_range() {
        let model = DenseNetwork::new(&[2, 2], Activation::ReLU, 0).unwrap();
        let batch = EvaluationBatch::new(ArrayD::ones(IxDyn(&[2, 2])), Array1::from(vec![0, 4]));
        let explainer: &dyn Explainer<DenseNetwork> = &logit_saliency;
        let err = metric(2)
            .evaluate(&model, batch, Some(explainer), &CallOptions::new())
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_requires_explainer() {
        let model = DenseNetwork::new(&[2, 2], Activation::ReLU, 0).unwrap();
        let batch = EvaluationBatch::new(ArrayD::ones(IxDyn(&[2, 2])), Array1::from(vec![0, 1]))
            .with_attributions(ArrayD::ones(IxDyn(&[2, 2])));
        let err = metric(2)
            .evaluate(&model, batch, None, &CallOptions::new())
            .unwrap_err();
        assert!(matches!(err, EvalError::MissingExplainFunction));
    }
}
