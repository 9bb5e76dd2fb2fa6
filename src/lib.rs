//! explain-eval - Quantitative evaluation of model explanations
//!
//! This crate scores attribution maps produced by explanation methods:
//! - A shared evaluation engine (input validation, batched explanation,
//!   post-processing, aggregation, result history)
//! - Randomisation sanity checks (model parameter randomisation, random logit)
//! - A library of similarity, normalisation, perturbation and aggregation
//!   functions
//!
//! # Modules
//!
//! - [`metrics`] - Evaluation engine and metrics
//! - [`model`] - Model capability adapter and the dense network backend
//! - [`functions`] - Stateless numeric functions
//! - [`catalog`] - Names of selectable functions and metrics
//! - [`utils`] - Batching and shape helpers
//!
//! # Example
//!
//! ```no_run
//! use explain_eval::prelude::*;
//! use ndarray::{Array1, ArrayD, IxDyn};
//!
//! fn saliency(
//!     model: &DenseNetwork,
//!     x: &ArrayD<f64>,
//!     _y: &Array1<usize>,
//!     _ctx: &ExplainContext,
//! ) -> Result<ArrayD<f64>> {
//!     let out = model.predict(&x.view(), false)?;
//!     let mut a = x.clone();
//!     for (mut row, o) in a.outer_iter_mut().zip(out.rows()) {
//!         let scale = o.sum();
//!         row.mapv_inplace(|v| v * scale);
//!     }
//!     Ok(a)
//! }
//!
//! # fn main() -> Result<()> {
//! let model = DenseNetwork::new(&[8, 16, 4], Activation::ReLU, 0)?;
//! let x = ArrayD::from_elem(IxDyn(&[10, 8]), 0.5);
//! let batch = EvaluationBatch::new(x, Array1::zeros(10));
//!
//! let mut metric = ModelParameterRandomisation::new(
//!     ModelParameterRandomisationConfig::new().with_layer_order(LayerOrder::TopDown),
//! )?;
//! let explainer: &dyn Explainer<DenseNetwork> = &saliency;
//! let scores = metric.evaluate(&model, batch, Some(explainer), &CallOptions::new())?;
//! println!("{:?}", scores.as_per_layer());
//! # Ok(())
//! # }
//! ```

pub mod error;

pub mod functions;
pub mod metrics;
pub mod model;

pub mod catalog;
pub mod utils;

pub use error::{EvalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{EvalError, Result};

    // Functions
    pub use crate::functions::{AggregateFunc, BaselineValue, NormaliseFunc, PerturbFunc, SimilarityFunc};

    // Models
    pub use crate::model::{Activation, DenseLayer, DenseNetwork, LayerOrder, ModelInterface};

    // Metrics
    pub use crate::metrics::{
        CallOptions, EvaluationBatch, EvaluationScores, ExplainContext, Explainer, LayerScores,
        Metric, MetricConfig, ModelParameterRandomisation, ModelParameterRandomisationConfig,
        RandomLogit, RandomLogitConfig,
    };
}
