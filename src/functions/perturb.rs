//! Input perturbation functions
//!
//! Indices address elements in logical (row-major) order of the instance.
//! All randomness comes from the caller's RNG so results are reproducible.

use crate::error::{EvalError, Result};
use ndarray::{ArrayD, ArrayViewD};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Built-in perturbation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbFunc {
    BaselineReplacementByIndices,
    GaussianNoise,
    UniformNoise,
    NoPerturbation,
}

impl PerturbFunc {
    pub const ALL: [PerturbFunc; 4] = [
        PerturbFunc::BaselineReplacementByIndices,
        PerturbFunc::GaussianNoise,
        PerturbFunc::UniformNoise,
        PerturbFunc::NoPerturbation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PerturbFunc::BaselineReplacementByIndices => "baseline_replacement_by_indices",
            PerturbFunc::GaussianNoise => "gaussian_noise",
            PerturbFunc::UniformNoise => "uniform_noise",
            PerturbFunc::NoPerturbation => "no_perturbation",
        }
    }
}

/// Replacement value used by `baseline_replacement_by_indices`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineValue {
    Zeros,
    Mean,
    /// Uniform draw between the instance minimum and maximum
    Uniform,
    /// Instance minimum
    Black,
    /// Instance maximum
    White,
    Constant(f64),
}

impl Default for BaselineValue {
    fn default() -> Self {
        Self::Black
    }
}

fn check_indices(len: usize, indices: &[usize]) -> Result<()> {
    match indices.iter().find(|&&i| i >= len) {
        Some(&bad) => Err(EvalError::ValidationError(format!(
            "perturbation index {} out of range for {} elements",
            bad, len
        ))),
        None => Ok(()),
    }
}

fn min_max(arr: &ArrayViewD<f64>) -> (f64, f64) {
    arr.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Replace the indexed elements with a baseline value
pub fn baseline_replacement_by_indices<R: Rng + ?Sized>(
    arr: &ArrayViewD<f64>,
    indices: &[usize],
    baseline: BaselineValue,
    rng: &mut R,
) -> Result<ArrayD<f64>> {
    check_indices(arr.len(), indices)?;
    let (lo, hi) = min_max(arr);
    let mean = if arr.is_empty() {
        0.0
    } else {
        arr.sum() / arr.len() as f64
    };

    let mut out = arr.to_owned();
    {
        let mut flat: Vec<&mut f64> = out.iter_mut().collect();
        for &i in indices {
            *flat[i] = match baseline {
                BaselineValue::Zeros => 0.0,
                BaselineValue::Mean => mean,
                BaselineValue::Uniform if hi > lo => rng.gen_range(lo..hi),
                BaselineValue::Uniform => lo,
                BaselineValue::Black => lo,
                BaselineValue::White => hi,
                BaselineValue::Constant(value) => value,
            };
        }
    }
    Ok(out)
}

/// Add Gaussian noise to the indexed elements, or to every element when
/// `indices` is `None`
pub fn gaussian_noise<R: Rng + ?Sized>(
    arr: &ArrayViewD<f64>,
    indices: Option<&[usize]>,
    perturb_mean: f64,
    perturb_std: f64,
    rng: &mut R,
) -> Result<ArrayD<f64>> {
    if !(perturb_std >= 0.0 && perturb_std.is_finite()) {
        return Err(EvalError::InvalidConfiguration(format!(
            "gaussian noise std must be finite and non-negative, got {}",
            perturb_std
        )));
    }
    let normal = Normal::new(perturb_mean, perturb_std).map_err(|e| {
        EvalError::InvalidConfiguration(format!("gaussian noise std {}: {}", perturb_std, e))
    })?;
    apply_noise(arr, indices, || normal.sample(&mut *rng))
}

/// Add uniform noise to the indexed elements.
///
/// Without an upper bound the noise is drawn from `[-lower_bound, lower_bound)`.
pub fn uniform_noise<R: Rng + ?Sized>(
    arr: &ArrayViewD<f64>,
    indices: Option<&[usize]>,
    lower_bound: f64,
    upper_bound: Option<f64>,
    rng: &mut R,
) -> Result<ArrayD<f64>> {
    let (low, high) = match upper_bound {
        None => (-lower_bound.abs(), lower_bound.abs()),
        Some(upper) => (lower_bound, upper),
    };
    if !(high > low) {
        return Err(EvalError::InvalidConfiguration(format!(
            "uniform noise needs upper bound > lower bound, got [{}, {})",
            low, high
        )));
    }
    apply_noise(arr, indices, || rng.gen_range(low..high))
}

pub fn no_perturbation(arr: &ArrayViewD<f64>) -> ArrayD<f64> {
    arr.to_owned()
}

fn apply_noise(
    arr: &ArrayViewD<f64>,
    indices: Option<&[usize]>,
    mut noise: impl FnMut() -> f64,
) -> Result<ArrayD<f64>> {
    let mut out = arr.to_owned();
    match indices {
        None => out.mapv_inplace(|v| v + noise()),
        Some(indices) => {
            check_indices(out.len(), indices)?;
            let mut flat: Vec<&mut f64> = out.iter_mut().collect();
            for &i in indices {
                *flat[i] += noise();
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_baseline_replacement() {
        let arr = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);

        let out = baseline_replacement_by_indices(&arr.view(), &[0, 3], BaselineValue::Zeros, &mut rng)
            .unwrap();
        assert_eq!(out, array![[0.0, 2.0], [3.0, 0.0]].into_dyn());

        let out = baseline_replacement_by_indices(&arr.view(), &[1], BaselineValue::White, &mut rng)
            .unwrap();
        assert_eq!(out, array![[1.0, 4.0], [3.0, 4.0]].into_dyn());

        let out = baseline_replacement_by_indices(&arr.view(), &[2], BaselineValue::Mean, &mut rng)
            .unwrap();
        assert_eq!(out, array![[1.0, 2.0], [2.5, 4.0]].into_dyn());
    }

    #[test]
    fn test_baseline_out_of_range() {
        let arr = array![1.0, 2.0].into_dyn();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let err = baseline_replacement_by_indices(&arr.view(), &[2], BaselineValue::Zeros, &mut rng)
            .unwrap_err();
        assert!(matches!(err, EvalError::ValidationError(_)));
    }

    #[test]
    fn test_gaussian_noise_only_touches_indices() {
        let arr = ArrayD::<f64>::zeros(ndarray::IxDyn(&[4]));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let out = gaussian_noise(&arr.view(), Some(&[1, 2]), 0.0, 1.0, &mut rng).unwrap();
        let values: Vec<f64> = out.iter().copied().collect();
        assert_eq!(values[0], 0.0);
        assert_eq!(values[3], 0.0);
        assert!(values[1] != 0.0 && values[2] != 0.0);
    }

    #[test]
    fn test_noise_is_seeded() {
        let arr = ArrayD::<f64>::zeros(ndarray::IxDyn(&[8]));
        let first = uniform_noise(
            &arr.view(),
            None,
            0.1,
            None,
            &mut Xoshiro256PlusPlus::seed_from_u64(3),
        )
        .unwrap();
        let second = uniform_noise(
            &arr.view(),
            None,
            0.1,
            None,
            &mut Xoshiro256PlusPlus::seed_from_u64(3),
        )
        .unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|v| v.abs() <= 0.1));
    }

    #[test]
    fn test_uniform_noise_rejects_inverted_bounds() {
        let arr = ArrayD::<f64>::zeros(ndarray::IxDyn(&[2]));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        assert!(uniform_noise(&arr.view(), None, 0.5, Some(0.1), &mut rng).is_err());
    }

    #[test]
    fn test_negative_std_rejected() {
        let arr = ArrayD::<f64>::zeros(ndarray::IxDyn(&[2]));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        assert!(gaussian_noise(&arr.view(), None, 0.0, -1.0, &mut rng).is_err());
        assert!(gaussian_noise(&arr.view(), None, 0.0, f64::NAN, &mut rng).is_err());
        assert!(gaussian_noise(&arr.view(), None, 0.0, 0.0, &mut rng).is_ok());
    }
}
