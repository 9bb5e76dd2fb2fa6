//! Explanation generator interface consumed by the metrics

use crate::error::Result;
use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Call-time settings forwarded to the explanation generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplainContext {
    /// Whether the explainer should work on softmax probabilities
    pub softmax: bool,
    /// Target device hint, passed through untouched
    pub device: Option<String>,
    /// Explainer-specific keyword arguments
    pub explain_func_kwargs: Map<String, Value>,
    /// Keyword arguments for the model's predict call
    pub model_predict_kwargs: Map<String, Value>,
}

/// Produces one attribution map per input instance.
///
/// The returned array must have the same leading length as `x`. It may omit
/// the channel axis, which the engine then inserts.
pub trait Explainer<M> {
    fn explain(
        &self,
        model: &M,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        ctx: &ExplainContext,
    ) -> Result<ArrayD<f64>>;
}

impl<M, F> Explainer<M> for F
where
    F: Fn(&M, &ArrayD<f64>, &Array1<usize>, &ExplainContext) -> Result<ArrayD<f64>>,
{
    fn explain(
        &self,
        model: &M,
        x: &ArrayD<f64>,
        y: &Array1<usize>,
        ctx: &ExplainContext,
    ) -> Result<ArrayD<f64>> {
        self(model, x, y, ctx)
    }
}
