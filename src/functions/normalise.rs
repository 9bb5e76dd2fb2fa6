//! Attribution normalisation functions
//!
//! Every function works on a single instance. Inputs that are entirely zero
//! are returned unchanged rather than divided by zero.

use crate::error::{EvalError, Result};
use ndarray::{Array, ArrayView, Axis, Dimension, RemoveAxis};
use serde::{Deserialize, Serialize};

/// ImageNet channel means, the conventional default for `denormalise`
pub const IMAGENET_MEAN: [f64; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
pub const IMAGENET_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// Built-in normalisation functions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormaliseFunc {
    NormaliseByMax,
    NormaliseByNegative,
    Denormalise { mean: Vec<f64>, std: Vec<f64> },
}

impl NormaliseFunc {
    pub fn name(&self) -> &'static str {
        match self {
            NormaliseFunc::NormaliseByMax => "normalise_by_max",
            NormaliseFunc::NormaliseByNegative => "normalise_by_negative",
            NormaliseFunc::Denormalise { .. } => "denormalise",
        }
    }

    /// Names of every built-in normalisation function
    pub fn names() -> Vec<&'static str> {
        vec!["normalise_by_max", "normalise_by_negative", "denormalise"]
    }

    /// Denormalise with the ImageNet statistics
    pub fn imagenet_denormalise() -> Self {
        NormaliseFunc::Denormalise {
            mean: IMAGENET_MEAN.to_vec(),
            std: IMAGENET_STD.to_vec(),
        }
    }

    /// Normalise one instance
    pub fn apply<D: RemoveAxis>(&self, a: &ArrayView<f64, D>) -> Result<Array<f64, D>> {
        match self {
            NormaliseFunc::NormaliseByMax => Ok(normalise_by_max(a)),
            NormaliseFunc::NormaliseByNegative => Ok(normalise_by_negative(a)),
            NormaliseFunc::Denormalise { mean, std } => denormalise(a, mean, std),
        }
    }
}

impl Default for NormaliseFunc {
    fn default() -> Self {
        Self::NormaliseByMax
    }
}

/// Divide by the largest absolute value
pub fn normalise_by_max<D: Dimension>(a: &ArrayView<f64, D>) -> Array<f64, D> {
    let max_abs = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max_abs == 0.0 {
        return a.to_owned();
    }
    a.mapv(|v| v / max_abs)
}

/// Scale positive values by the maximum and negative values by |minimum|,
/// mapping the result into [-1, 1] while keeping the sign split at zero.
pub fn normalise_by_negative<D: Dimension>(a: &ArrayView<f64, D>) -> Array<f64, D> {
    let min = a.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = a.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if a.is_empty() || (min == 0.0 && max == 0.0) {
        return a.to_owned();
    }
    if min >= 0.0 {
        a.mapv(|v| v / max)
    } else if max <= 0.0 {
        a.mapv(|v| -v / min)
    } else {
        a.mapv(|v| if v > 0.0 { v / max } else { -v / min })
    }
}

/// Undo a per-channel standardisation: `a * std + mean`.
///
/// The instance is expected channel-first; with no channel axis (1-D input)
/// only the first statistic is used.
pub fn denormalise<D: RemoveAxis>(
    a: &ArrayView<f64, D>,
    mean: &[f64],
    std: &[f64],
) -> Result<Array<f64, D>> {
    if mean.len() != std.len() || mean.is_empty() {
        return Err(EvalError::InvalidConfiguration(format!(
            "denormalise needs matching non-empty mean/std, got {} and {}",
            mean.len(),
            std.len()
        )));
    }

    let mut out = a.to_owned();
    if out.ndim() < 2 {
        out.mapv_inplace(|v| v * std[0] + mean[0]);
        return Ok(out);
    }

    let n_channels = out.len_of(Axis(0));
    if n_channels != mean.len() {
        return Err(EvalError::shape(
            format!("{} channels", mean.len()),
            format!("{} channels", n_channels),
        ));
    }
    for (c, mut channel) in out.axis_iter_mut(Axis(0)).enumerate() {
        channel.mapv_inplace(|v| v * std[c] + mean[c]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalise_by_max() {
        let a = array![1.0, -4.0, 2.0];
        let n = normalise_by_max(&a.view());
        assert_eq!(n, array![0.25, -1.0, 0.5]);
    }

    #[test]
    fn test_normalise_zeros_unchanged() {
        let a = array![[0.0, 0.0], [0.0, 0.0]];
        assert_eq!(normalise_by_max(&a.view()), a);
        assert_eq!(normalise_by_negative(&a.view()), a);
    }

    #[test]
    fn test_normalise_by_negative_mixed_signs() {
        let a = array![2.0, -4.0, 1.0, -1.0];
        let n = normalise_by_negative(&a.view());
        assert_eq!(n, array![1.0, -1.0, 0.5, -0.25]);
    }

    #[test]
    fn test_normalise_by_negative_all_negative() {
        let a = array![-2.0, -4.0];
        let n = normalise_by_negative(&a.view());
        assert_eq!(n, array![-0.5, -1.0]);
    }

    #[test]
    fn test_denormalise_per_channel() {
        let a = array![[[0.0, 1.0]], [[1.0, 2.0]]];
        let out = denormalise(&a.view(), &[1.0, 0.0], &[2.0, 3.0]).unwrap();
        assert_eq!(out, array![[[1.0, 3.0]], [[3.0, 6.0]]]);
    }

    #[test]
    fn test_denormalise_channel_mismatch() {
        let a = array![[0.0, 1.0], [1.0, 2.0]];
        let err = NormaliseFunc::imagenet_denormalise().apply(&a.view()).unwrap_err();
        assert!(matches!(err, EvalError::ShapeMismatch { .. }));
    }
}
