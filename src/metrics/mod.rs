//! Explanation quality metrics
//!
//! Every metric combines the shared [`EvaluationEngine`] with a scoring
//! strategy. Batch metrics only implement [`Metric::evaluate_batch`] and
//! inherit the generic evaluation loop; metrics that need their own control
//! flow (such as layer randomisation) override [`Metric::evaluate`].

pub mod base;
pub mod explain;
mod progress;
pub mod randomisation;
pub mod scores;
mod warn;

pub use base::{
    BatchPairs, CallOptions, EvaluationBatch, EvaluationEngine, MetricConfig, PreparedData,
};
pub use explain::{ExplainContext, Explainer};
pub use randomisation::{
    ModelParameterRandomisation, ModelParameterRandomisationConfig, RandomLogit,
    RandomLogitConfig,
};
pub use scores::{EvaluationScores, LayerScores};

use crate::error::{EvalError, Result};
use crate::functions::SimilarityFunc;
use crate::model::ModelInterface;
use crate::utils::gen_batches;
use ndarray::{Array1, ArrayD, Axis, Slice};
use progress::Progress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a better explanation scores higher or lower
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    Higher,
    Lower,
}

/// Family of explanation properties a metric measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationCategory {
    Faithfulness,
    Robustness,
    Localisation,
    Complexity,
    Randomisation,
    Axiomatic,
}

impl EvaluationCategory {
    pub const ALL: [EvaluationCategory; 6] = [
        EvaluationCategory::Faithfulness,
        EvaluationCategory::Robustness,
        EvaluationCategory::Localisation,
        EvaluationCategory::Complexity,
        EvaluationCategory::Randomisation,
        EvaluationCategory::Axiomatic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EvaluationCategory::Faithfulness => "Faithfulness",
            EvaluationCategory::Robustness => "Robustness",
            EvaluationCategory::Localisation => "Localisation",
            EvaluationCategory::Complexity => "Complexity",
            EvaluationCategory::Randomisation => "Randomisation",
            EvaluationCategory::Axiomatic => "Axiomatic",
        }
    }
}

impl fmt::Display for EvaluationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of data a metric can be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Image,
    TimeSeries,
    Tabular,
}

/// Static description of a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricInfo {
    pub name: &'static str,
    pub score_direction: ScoreDirection,
    pub evaluation_category: EvaluationCategory,
    pub data_applicability: &'static [DataType],
}

/// Similarity used to compare two flattened attributions
#[derive(Clone)]
pub enum Similarity {
    Builtin(SimilarityFunc),
    Custom(Arc<dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync>),
}

impl Similarity {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        Similarity::Custom(Arc::new(f))
    }

    pub fn score(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        match self {
            Similarity::Builtin(func) => func.compute(a, b),
            Similarity::Custom(f) => {
                if a.len() != b.len() {
                    return Err(EvalError::shape(
                        format!("{} values", a.len()),
                        format!("{}", b.len()),
                    ));
                }
                Ok(f(a, b))
            }
        }
    }
}

impl fmt::Debug for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Similarity::Builtin(func) => write!(f, "Builtin({})", func),
            Similarity::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<SimilarityFunc> for Similarity {
    fn from(func: SimilarityFunc) -> Self {
        Similarity::Builtin(func)
    }
}

/// An explanation quality metric over models of type `M`
pub trait Metric<M: ModelInterface> {
    fn info(&self) -> MetricInfo;

    fn engine(&self) -> &EvaluationEngine;

    fn engine_mut(&mut self) -> &mut EvaluationEngine;

    /// Whether an explainer is needed even when attributions are supplied
    fn requires_explainer(&self) -> bool {
        false
    }

    /// Metric-specific checks on the raw call inputs, run before anything
    /// is explained or scored
    fn validate(&self, _batch: &EvaluationBatch) -> Result<()> {
        Ok(())
    }

    /// Score one batch of prepared instances.
    ///
    /// `offset` is the index of the first instance of the batch within the
    /// whole call. Must return exactly one score per instance.
    #[allow(clippy::too_many_arguments)]
    fn evaluate_batch(
        &self,
        model: &M,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        a: &ArrayD<f64>,
        explainer: Option<&dyn Explainer<M>>,
        ctx: &ExplainContext,
        offset: usize,
    ) -> Result<Vec<f64>>;

    /// Run the metric over a dataset and record the result
    fn evaluate(
        &mut self,
        model: &M,
        batch: EvaluationBatch,
        explainer: Option<&dyn Explainer<M>>,
        options: &CallOptions,
    ) -> Result<EvaluationScores> {
        if self.requires_explainer() && explainer.is_none() {
            return Err(EvalError::MissingExplainFunction);
        }
        self.validate(&batch)?;
        let data = self
            .engine()
            .general_preprocess(model, batch, explainer, options)?;

        let n = data.len();
        let ctx = options.explain_context();
        let mut progress = Progress::new(
            self.info().name,
            n,
            self.engine().config().display_progressbar,
        );

        let mut scores = Vec::with_capacity(n);
        for range in gen_batches(n, options.batch_size) {
            let x = data
                .x_batch
                .slice_axis(Axis(0), Slice::from(range.clone()))
                .to_owned();
            let y = data
                .y_batch
                .slice_axis(Axis(0), Slice::from(range.clone()))
                .to_owned();
            let a = data
                .a_batch
                .slice_axis(Axis(0), Slice::from(range.clone()))
                .to_owned();

            let batch_scores = self.evaluate_batch(model, &x, &y, &a, explainer, &ctx, range.start)?;
            if batch_scores.len() != range.len() {
                return Err(EvalError::shape(
                    format!("{} batch scores", range.len()),
                    format!("{}", batch_scores.len()),
                ));
            }
            progress.update(range.len());
            scores.extend(batch_scores);
        }
        progress.finish();

        let result = self.engine().postprocess_instances(scores);
        Ok(self.engine_mut().record(result))
    }

    /// Result of the most recent call
    fn evaluation_scores(&self) -> Option<&EvaluationScores> {
        self.engine().evaluation_scores()
    }

    /// Every result since construction, oldest first
    fn all_evaluation_scores(&self) -> &[EvaluationScores] {
        self.engine().all_evaluation_scores()
    }
}
