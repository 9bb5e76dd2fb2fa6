//! Shared evaluation engine
//!
//! Every metric owns an [`EvaluationEngine`]. The engine validates and
//! normalises the call inputs, generates explanations in batches, pairs
//! baseline and regenerated explanations, reduces scores and keeps the
//! evaluation history. Metric-specific scoring lives in the metric itself.

use super::explain::{ExplainContext, Explainer};
use super::scores::EvaluationScores;
use crate::error::{EvalError, Result};
use crate::functions::{AggregateFunc, NormaliseFunc};
use crate::model::ModelInterface;
use crate::utils::{
    assert_attributions, assert_segmentations, expand_attribution_channel, gen_batches,
    infer_channel_first, make_channel_first,
};
use ndarray::{concatenate, Array1, ArrayD, ArrayViewD, Axis, Slice};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

/// Settings shared by every metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Take the absolute value of attributions
    pub abs: bool,
    /// Normalise each attribution map with `normalise_func`
    pub normalise: bool,
    pub normalise_func: NormaliseFunc,
    /// Reduce the result to a single value with `aggregate_func`
    pub return_aggregate: bool,
    pub aggregate_func: AggregateFunc,
    /// Emit progress events while scoring
    pub display_progressbar: bool,
    /// Suppress parameterisation warnings at construction
    pub disable_warnings: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
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

/// Call-time options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallOptions {
    /// Layout of `x_batch`; inferred from its shape when `None`
    pub channel_first: Option<bool>,
    pub explain_func_kwargs: Map<String, Value>,
    pub model_predict_kwargs: Map<String, Value>,
    pub softmax: bool,
    pub device: Option<String>,
    /// Instances per explanation call
    pub batch_size: usize,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            channel_first: None,
            explain_func_kwargs: Map::new(),
            model_predict_kwargs: Map::new(),
            softmax: false,
            device: None,
            batch_size: 64,
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_channel_first(mut self, channel_first: bool) -> Self {
        self.channel_first = Some(channel_first);
        self
    }

    pub fn with_softmax(mut self, softmax: bool) -> Self {
        self.softmax = softmax;
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_explain_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.explain_func_kwargs.insert(key.into(), value);
        self
    }

    pub fn with_predict_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.model_predict_kwargs.insert(key.into(), value);
        self
    }

    pub fn explain_context(&self) -> ExplainContext {
        ExplainContext {
            softmax: self.softmax,
            device: self.device.clone(),
            explain_func_kwargs: self.explain_func_kwargs.clone(),
            model_predict_kwargs: self.model_predict_kwargs.clone(),
        }
    }
}

/// Dataset handed to a metric call
#[derive(Debug, Clone)]
pub struct EvaluationBatch {
    /// Inputs, instances on the leading axis
    pub x_batch: ArrayD<f64>,
    /// Target labels, one per instance
    pub y_batch: Array1<usize>,
    /// Precomputed attributions
    pub a_batch: Option<ArrayD<f64>>,
    /// Binary segmentation masks
    pub s_batch: Option<ArrayD<f64>>,
}

impl EvaluationBatch {
    pub fn new(x_batch: ArrayD<f64>, y_batch: Array1<usize>) -> Self {
        Self {
            x_batch,
            y_batch,
            a_batch: None,
            s_batch: None,
        }
    }

    pub fn with_attributions(mut self, a_batch: ArrayD<f64>) -> Self {
        self.a_batch = Some(a_batch);
        self
    }

    pub fn with_segmentations(mut self, s_batch: ArrayD<f64>) -> Self {
        self.s_batch = Some(s_batch);
        self
    }

    pub fn len(&self) -> usize {
        self.x_batch.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated, channel-first data with post-processed attributions
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x_batch: ArrayD<f64>,
    pub y_batch: Array1<usize>,
    pub a_batch: ArrayD<f64>,
    pub s_batch: Option<ArrayD<f64>>,
    pub channel_first: bool,
}

impl PreparedData {
    pub fn len(&self) -> usize {
        self.x_batch.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pairs each baseline attribution chunk with the regenerated batch at the
/// same position.
///
/// Both sides must run out together and every pair must cover the same
/// number of instances; otherwise the iterator yields `ShapeMismatch` and
/// stops.
pub struct BatchPairs<'a, I> {
    baseline: &'a ArrayD<f64>,
    ranges: Box<dyn Iterator<Item = Range<usize>> + 'a>,
    regenerated: I,
    done: bool,
}

impl<'a, I> BatchPairs<'a, I>
where
    I: Iterator<Item = Result<ArrayD<f64>>>,
{
    pub fn new(baseline: &'a ArrayD<f64>, batch_size: usize, regenerated: I) -> Self {
        let n = baseline.shape().first().copied().unwrap_or(0);
        Self {
            baseline,
            ranges: Box::new(gen_batches(n, batch_size)),
            regenerated,
            done: false,
        }
    }

    fn fail(&mut self, err: EvalError) -> Option<Result<(ArrayViewD<'a, f64>, ArrayD<f64>)>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<'a, I> Iterator for BatchPairs<'a, I>
where
    I: Iterator<Item = Result<ArrayD<f64>>>,
{
    type Item = Result<(ArrayViewD<'a, f64>, ArrayD<f64>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match (self.ranges.next(), self.regenerated.next()) {
            (None, None) => {
                self.done = true;
                None
            }
            (Some(_), Some(Err(err))) => self.fail(err),
            (Some(range), Some(Ok(regenerated))) => {
                let expected = range.len();
                let actual = regenerated.shape().first().copied().unwrap_or(0);
                if expected != actual {
                    return self.fail(EvalError::shape(
                        format!("{} regenerated explanations", expected),
                        format!("{}", actual),
                    ));
                }
                let baseline = self.baseline.slice_axis(Axis(0), Slice::from(range));
                Some(Ok((baseline, regenerated)))
            }
            (Some(_), None) | (None, Some(_)) => self.fail(EvalError::shape(
                "baseline and regenerated batches of equal count",
                "sequences of different length",
            )),
        }
    }
}

/// Shared preprocessing, explanation and bookkeeping for metrics
#[derive(Debug, Clone)]
pub struct EvaluationEngine {
    config: MetricConfig,
    all_evaluation_scores: Vec<EvaluationScores>,
}

impl EvaluationEngine {
    pub fn new(config: MetricConfig) -> Self {
        Self {
            config,
            all_evaluation_scores: Vec::new(),
        }
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Validate the call inputs and make sure attributions exist.
    ///
    /// Nothing is scored here; every shape or configuration problem surfaces
    /// before any model is corrupted.
    pub fn general_preprocess<M: ModelInterface>(
        &self,
        model: &M,
        batch: EvaluationBatch,
        explainer: Option<&dyn Explainer<M>>,
        options: &CallOptions,
    ) -> Result<PreparedData> {
        if options.batch_size == 0 {
            return Err(EvalError::InvalidConfiguration(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let EvaluationBatch {
            x_batch,
            y_batch,
            a_batch,
            s_batch,
        } = batch;

        if x_batch.ndim() < 2 {
            return Err(EvalError::shape(
                "input batch with at least 2 axes",
                format!("{:?}", x_batch.shape()),
            ));
        }
        let n = x_batch.shape()[0];
        if y_batch.len() != n {
            return Err(EvalError::shape(
                format!("{} labels", n),
                format!("{}", y_batch.len()),
            ));
        }

        let channel_first = match options.channel_first {
            Some(channel_first) => channel_first,
            None => infer_channel_first(x_batch.shape())?,
        };
        let x_ndim = x_batch.ndim();
        let x_batch = make_channel_first(x_batch, channel_first);

        if let Some(s) = &s_batch {
            assert_segmentations(x_batch.shape(), &s.view())?;
        }

        let a_batch = match a_batch {
            Some(a) => {
                let a = if a.ndim() == x_ndim {
                    make_channel_first(a, channel_first)
                } else {
                    a
                };
                let a = expand_attribution_channel(a, x_batch.shape())?;
                assert_attributions(x_batch.shape(), a.shape())?;
                self.postprocess_attributions(a)?
            }
            None => {
                let explainer = explainer.ok_or(EvalError::MissingExplainFunction)?;
                if n == 0 {
                    ArrayD::zeros(x_batch.raw_dim())
                } else {
                    let ctx = options.explain_context();
                    let chunks = self
                        .generate_explanations(
                            model,
                            &x_batch,
                            &y_batch,
                            options.batch_size,
                            explainer,
                            &ctx,
                        )
                        .collect::<Result<Vec<_>>>()?;
                    let views: Vec<ArrayViewD<f64>> = chunks.iter().map(|c| c.view()).collect();
                    concatenate(Axis(0), &views)?
                }
            }
        };

        debug!(
            instances = n,
            channel_first,
            input_shape = ?x_batch.shape(),
            attribution_shape = ?a_batch.shape(),
            "Preprocessed evaluation batch"
        );

        Ok(PreparedData {
            x_batch,
            y_batch,
            a_batch,
            s_batch,
            channel_first,
        })
    }

    /// Normalise each instance and take absolute values, as configured
    pub fn postprocess_attributions(&self, mut a: ArrayD<f64>) -> Result<ArrayD<f64>> {
        if self.config.normalise {
            for mut instance in a.outer_iter_mut() {
                let normalised = self.config.normalise_func.apply(&instance.view())?;
                instance.assign(&normalised);
            }
        }
        if self.config.abs {
            a.mapv_inplace(f64::abs);
        }
        Ok(a)
    }

    /// Explain one batch and post-process the result
    pub fn explain_batch<M>(
        &self,
        model: &M,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        explainer: &dyn Explainer<M>,
        ctx: &ExplainContext,
    ) -> Result<ArrayD<f64>> {
        let a = explainer.explain(model, x, y, ctx)?;
        let a = expand_attribution_channel(a, x.shape())?;
        assert_attributions(x.shape(), a.shape())?;
        self.postprocess_attributions(a)
    }

    /// Lazily explain the dataset in contiguous batches of `batch_size`
    pub fn generate_explanations<'a, M>(
        &'a self,
        model: &'a M,
        x: &'a ArrayD<f64>,
        y: &'a Array1<usize>,
        batch_size: usize,
        explainer: &'a dyn Explainer<M>,
        ctx: &'a ExplainContext,
    ) -> impl Iterator<Item = Result<ArrayD<f64>>> + 'a
    where
        M: 'a,
    {
        let n = x.shape().first().copied().unwrap_or(0);
        gen_batches(n, batch_size).map(move |range| {
            let x_chunk = x.slice_axis(Axis(0), Slice::from(range.clone())).to_owned();
            let y_chunk = y.slice_axis(Axis(0), Slice::from(range)).to_owned();
            self.explain_batch(model, &x_chunk, &y_chunk, explainer, ctx)
        })
    }

    /// Mean score of each instance across all steps.
    ///
    /// Only defined for per-layer results whose sequences all have the same
    /// length.
    pub fn compute_correlation_per_sample(
        scores: &EvaluationScores,
    ) -> Result<BTreeMap<usize, f64>> {
        let layers = scores.as_per_layer().ok_or_else(|| {
            EvalError::ValidationError(
                "per-sample correlation needs per-layer scores".to_string(),
            )
        })?;

        let mut lengths = layers.iter().map(|(_, s)| s.len());
        let n_samples = match lengths.next() {
            Some(n) => n,
            None => return Ok(BTreeMap::new()),
        };
        if lengths.any(|len| len != n_samples) {
            return Err(EvalError::InvalidConfiguration(
                "per-layer score sequences differ in length".to_string(),
            ));
        }

        let n_layers = layers.len() as f64;
        Ok((0..n_samples)
            .map(|sample| {
                let total: f64 = layers.iter().map(|(_, s)| s[sample]).sum();
                (sample, total / n_layers)
            })
            .collect())
    }

    /// Reduce scores to a single-element result with the configured function
    pub fn aggregate(&self, scores: &[f64]) -> EvaluationScores {
        EvaluationScores::Aggregate(vec![self.config.aggregate_func.apply(scores)])
    }

    /// Per-instance scores, aggregated when `return_aggregate` is set
    pub fn postprocess_instances(&self, scores: Vec<f64>) -> EvaluationScores {
        if self.config.return_aggregate {
            self.aggregate(&scores)
        } else {
            EvaluationScores::PerInstance(scores)
        }
    }

    /// Append a finished result to the history and hand it back
    pub fn record(&mut self, scores: EvaluationScores) -> EvaluationScores {
        self.all_evaluation_scores.push(scores.clone());
        scores
    }

    /// Result of the most recent call
    pub fn evaluation_scores(&self) -> Option<&EvaluationScores> {
        self.all_evaluation_scores.last()
    }

    /// Every result since construction, oldest first
    pub fn all_evaluation_scores(&self) -> &[EvaluationScores] {
        &self.all_evaluation_scores
    }
}
