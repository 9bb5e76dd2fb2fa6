//! Dense feed-forward network backend
//!
//! A plain multi-layer perceptron holding its parameters as `ndarray`
//! matrices. It implements [`ModelInterface`] natively, so every dense layer
//! is a randomisable layer.

use super::ModelInterface;
use crate::error::{EvalError, Result};
use crate::utils::flatten_instances;
use ndarray::{Array1, Array2, ArrayViewD};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Activation function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    ReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Linear (identity)
    Linear,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU
    }
}

impl Activation {
    fn apply(&self, z: &mut Array2<f64>) {
        match self {
            Activation::ReLU => z.mapv_inplace(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv_inplace(|v| v.tanh()),
            Activation::Linear => {}
        }
    }
}

/// One fully connected layer: `activation(x · W + b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub name: String,
    /// Shape `(n_in, n_out)`
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    pub fn n_in(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_out(&self) -> usize {
        self.weights.ncols()
    }

    /// Xavier/Glorot uniform weights, bias uniform in ±1/sqrt(n_in)
    fn reinitialise(&mut self, rng: &mut dyn RngCore) {
        let (n_in, n_out) = self.weights.dim();
        let scale = (2.0 / (n_in + n_out) as f64).sqrt();
        let bias_bound = 1.0 / (n_in.max(1) as f64).sqrt();

        self.weights.mapv_inplace(|_| rng.gen::<f64>() * 2.0 * scale - scale);
        self.bias.mapv_inplace(|_| rng.gen::<f64>() * 2.0 * bias_bound - bias_bound);
    }
}

/// Feed-forward network of dense layers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "NetworkLayers")]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

/// Unchecked serialized form, validated through [`DenseNetwork::from_layers`]
#[derive(Deserialize)]
struct NetworkLayers {
    layers: Vec<DenseLayer>,
}

impl TryFrom<NetworkLayers> for DenseNetwork {
    type Error = EvalError;

    fn try_from(raw: NetworkLayers) -> Result<Self> {
        Self::from_layers(raw.layers)
    }
}

impl DenseNetwork {
    /// Build a randomly initialised network.
    ///
    /// `layer_sizes` lists the input width, every hidden width and the output
    /// width. Hidden layers use `activation`, the output layer is linear.
    pub fn new(layer_sizes: &[usize], activation: Activation, seed: u64) -> Result<Self> {
        if layer_sizes.len() < 2 || layer_sizes.contains(&0) {
            return Err(EvalError::InvalidConfiguration(format!(
                "network needs at least input and output sizes, all non-zero, got {:?}",
                layer_sizes
            )));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let n_layers = layer_sizes.len() - 1;
        let layers = (0..n_layers)
            .map(|i| {
                let mut layer = DenseLayer {
                    name: format!("dense_{}", i),
                    weights: Array2::zeros((layer_sizes[i], layer_sizes[i + 1])),
                    bias: Array1::zeros(layer_sizes[i + 1]),
                    activation: if i + 1 < n_layers {
                        activation
                    } else {
                        Activation::Linear
                    },
                };
                layer.reinitialise(&mut rng);
                layer
            })
            .collect();

        Ok(Self { layers })
    }

    /// Assemble a network from explicit layers, checking that widths chain
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(EvalError::InvalidConfiguration(
                "network needs at least one layer".to_string(),
            ));
        }
        for layer in &layers {
            if layer.bias.len() != layer.n_out() {
                return Err(EvalError::shape(
                    format!("bias of length {} in layer '{}'", layer.n_out(), layer.name),
                    format!("length {}", layer.bias.len()),
                ));
            }
        }
        for pair in layers.windows(2) {
            if pair[0].n_out() != pair[1].n_in() {
                return Err(EvalError::shape(
                    format!("{} inputs to layer '{}'", pair[0].n_out(), pair[1].name),
                    format!("{}", pair[1].n_in()),
                ));
            }
        }
        let mut names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != layers.len() {
            return Err(EvalError::InvalidConfiguration(
                "layer names must be unique".to_string(),
            ));
        }

        Ok(Self { layers })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn n_features(&self) -> usize {
        self.layers[0].n_in()
    }

    pub fn n_outputs(&self) -> usize {
        self.layers[self.layers.len() - 1].n_out()
    }

    /// Forward pass over feature rows
    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut activation = x.clone();
        for layer in &self.layers {
            let mut z = activation.dot(&layer.weights) + &layer.bias;
            layer.activation.apply(&mut z);
            activation = z;
        }
        activation
    }
}

fn softmax_rows(logits: &mut Array2<f64>) {
    for mut row in logits.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

impl ModelInterface for DenseNetwork {
    fn predict(&self, x: &ArrayViewD<f64>, softmax: bool) -> Result<Array2<f64>> {
        let rows = flatten_instances(x)?;
        if rows.ncols() != self.n_features() {
            return Err(EvalError::shape(
                format!("{} features per instance", self.n_features()),
                format!("{}", rows.ncols()),
            ));
        }

        let mut out = self.forward(&rows);
        if softmax {
            softmax_rows(&mut out);
        }
        Ok(out)
    }

    fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name.clone()).collect()
    }

    fn randomise_layer(&mut self, index: usize, rng: &mut dyn RngCore) -> Result<()> {
        let n_layers = self.layers.len();
        let layer = self.layers.get_mut(index).ok_or_else(|| {
            EvalError::ValidationError(format!(
                "layer index {} out of range for {} layers",
                index, n_layers
            ))
        })?;
        layer.reinitialise(rng);
        Ok(())
    }
}
