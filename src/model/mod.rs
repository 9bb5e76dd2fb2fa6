//! Model capability adapter
//!
//! The engine only talks to models through [`ModelInterface`]: batched
//! prediction, layer enumeration and single-layer parameter replacement.
//! Corruption order (cascading or independent) is implemented once, in
//! [`RandomLayerGenerator`], on top of those primitives.

mod dense;
mod generator;

pub use dense::{Activation, DenseLayer, DenseNetwork};
pub use generator::RandomLayerGenerator;

use crate::error::{EvalError, Result};
use ndarray::{Array2, ArrayViewD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order in which layers are randomised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerOrder {
    /// Each layer is randomised alone, starting from the original parameters
    Independent,
    /// Cascading: starting at the output layer, every step randomises one more
    /// layer on top of all previously randomised ones
    TopDown,
}

impl LayerOrder {
    pub fn name(&self) -> &'static str {
        match self {
            LayerOrder::Independent => "independent",
            LayerOrder::TopDown => "top_down",
        }
    }
}

impl Default for LayerOrder {
    fn default() -> Self {
        Self::Independent
    }
}

impl fmt::Display for LayerOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayerOrder {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "independent" => Ok(LayerOrder::Independent),
            "top_down" => Ok(LayerOrder::TopDown),
            other => Err(EvalError::InvalidConfiguration(format!(
                "layer_order must be 'independent' or 'top_down', got '{}'",
                other
            ))),
        }
    }
}

/// Uniform interface over model backends
///
/// Implementors must be cheap enough to clone once per randomisation step;
/// the original model is never mutated by the evaluation.
pub trait ModelInterface: Clone {
    /// Batched forward pass. Every instance (leading axis) is flattened to a
    /// feature row; returns one row of outputs per instance.
    fn predict(&self, x: &ArrayViewD<f64>, softmax: bool) -> Result<Array2<f64>>;

    /// Identifiers of the randomisable layers, input to output
    fn layer_names(&self) -> Vec<String>;

    /// Replace the parameters of layer `index` with freshly sampled values
    fn randomise_layer(&mut self, index: usize, rng: &mut dyn RngCore) -> Result<()>;

    /// Number of randomisable layers
    fn random_layer_generator_length(&self) -> usize {
        self.layer_names().len()
    }

    /// Lazy sequence of `(layer name, corrupted model)` pairs
    fn random_layer_generator(&self, order: LayerOrder, seed: u64) -> RandomLayerGenerator<'_, Self>
    where
        Self: Sized,
    {
        RandomLayerGenerator::new(self, order, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_order_parse() {
        assert_eq!("independent".parse::<LayerOrder>().unwrap(), LayerOrder::Independent);
        assert_eq!("top_down".parse::<LayerOrder>().unwrap(), LayerOrder::TopDown);
        let err = "bottom_up".parse::<LayerOrder>().unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_layer_order_serde() {
        let order: LayerOrder = serde_json::from_str("\"top_down\"").unwrap();
        assert_eq!(order, LayerOrder::TopDown);
        assert!(serde_json::from_str::<LayerOrder>("\"sideways\"").is_err());
    }
}
