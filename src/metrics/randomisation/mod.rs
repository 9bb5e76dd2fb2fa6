//! Randomisation metrics
//!
//! Both metrics check that explanations change when the model or the
//! explained class is randomised.

mod model_parameter_randomisation;
mod random_logit;

pub use model_parameter_randomisation::{
    ModelParameterRandomisation, ModelParameterRandomisationConfig,
};
pub use random_logit::{RandomLogit, RandomLogitConfig};
