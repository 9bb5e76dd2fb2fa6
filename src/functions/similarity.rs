//! Similarity and distance functions between two attribution vectors
//!
//! All functions operate on flattened attributions of equal length. Constant
//! input to a correlation yields NaN, and NaN anywhere in the input yields NaN;
//! no function panics on non-finite values.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const LIPSCHITZ_EPS: f64 = 1e-10;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;
const SSIM_DEFAULT_WINDOW: usize = 7;

/// Built-in similarity functions, selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityFunc {
    CorrelationSpearman,
    CorrelationPearson,
    CorrelationKendallTau,
    CorrelationConcordance,
    DistanceEuclidean,
    DistanceManhattan,
    DistanceChebyshev,
    AbsDifference,
    Difference,
    Cosine,
    Ssim,
    Mse,
}

impl SimilarityFunc {
    /// Every built-in similarity function
    pub const ALL: [SimilarityFunc; 12] = [
        SimilarityFunc::CorrelationSpearman,
        SimilarityFunc::CorrelationPearson,
        SimilarityFunc::CorrelationKendallTau,
        SimilarityFunc::CorrelationConcordance,
        SimilarityFunc::DistanceEuclidean,
        SimilarityFunc::DistanceManhattan,
        SimilarityFunc::DistanceChebyshev,
        SimilarityFunc::AbsDifference,
        SimilarityFunc::Difference,
        SimilarityFunc::Cosine,
        SimilarityFunc::Ssim,
        SimilarityFunc::Mse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SimilarityFunc::CorrelationSpearman => "correlation_spearman",
            SimilarityFunc::CorrelationPearson => "correlation_pearson",
            SimilarityFunc::CorrelationKendallTau => "correlation_kendall_tau",
            SimilarityFunc::CorrelationConcordance => "correlation_concordance",
            SimilarityFunc::DistanceEuclidean => "distance_euclidean",
            SimilarityFunc::DistanceManhattan => "distance_manhattan",
            SimilarityFunc::DistanceChebyshev => "distance_chebyshev",
            SimilarityFunc::AbsDifference => "abs_difference",
            SimilarityFunc::Difference => "difference",
            SimilarityFunc::Cosine => "cosine",
            SimilarityFunc::Ssim => "ssim",
            SimilarityFunc::Mse => "mse",
        }
    }

    /// Whether swapping the arguments can change the result
    pub fn is_order_sensitive(&self) -> bool {
        matches!(self, SimilarityFunc::Difference)
    }

    /// Apply the function, checking that both inputs have the same length
    pub fn compute(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        if a.len() != b.len() {
            return Err(EvalError::shape(
                format!("vectors of equal length ({})", a.len()),
                format!("length {}", b.len()),
            ));
        }
        Ok(self.apply(a, b))
    }

    fn apply(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            SimilarityFunc::CorrelationSpearman => correlation_spearman(a, b),
            SimilarityFunc::CorrelationPearson => correlation_pearson(a, b),
            SimilarityFunc::CorrelationKendallTau => correlation_kendall_tau(a, b),
            SimilarityFunc::CorrelationConcordance => correlation_concordance(a, b),
            SimilarityFunc::DistanceEuclidean => distance_euclidean(a, b),
            SimilarityFunc::DistanceManhattan => distance_manhattan(a, b),
            SimilarityFunc::DistanceChebyshev => distance_chebyshev(a, b),
            SimilarityFunc::AbsDifference => abs_difference(a, b),
            SimilarityFunc::Difference => difference(a, b),
            SimilarityFunc::Cosine => cosine(a, b),
            SimilarityFunc::Ssim => ssim(a, b),
            SimilarityFunc::Mse => mse(a, b),
        }
    }
}

impl Default for SimilarityFunc {
    fn default() -> Self {
        Self::CorrelationSpearman
    }
}

impl fmt::Display for SimilarityFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimilarityFunc {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|func| func.name() == s)
            .ok_or_else(|| {
                EvalError::InvalidConfiguration(format!("unknown similarity function '{}'", s))
            })
    }
}

fn has_nan(a: &[f64], b: &[f64]) -> bool {
    a.iter().chain(b.iter()).any(|v| v.is_nan())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Average ranks (1-based), ties share the mean of their positions
pub fn rank_with_ties(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&i, &j| values[i].partial_cmp(&values[j]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let value = values[indices[i]];
        let mut j = i + 1;
        while j < n && values[indices[j]] == value {
            j += 1;
        }
        let avg_rank = (i + j + 1) as f64 / 2.0;
        for &idx in &indices[i..j] {
            ranks[idx] = avg_rank;
        }
        i = j;
    }

    ranks
}

/// Spearman rank correlation
pub fn correlation_spearman(a: &[f64], b: &[f64]) -> f64 {
    if has_nan(a, b) {
        return f64::NAN;
    }
    correlation_pearson(&rank_with_ties(a), &rank_with_ties(b))
}

/// Pearson linear correlation
pub fn correlation_pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 {
        return f64::NAN;
    }
    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut num = 0.0;
    let mut den_a = 0.0;
    let mut den_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        num += dx * dy;
        den_a += dx * dx;
        den_b += dy * dy;
    }

    if den_a == 0.0 || den_b == 0.0 {
        return f64::NAN;
    }
    (num / (den_a.sqrt() * den_b.sqrt())).clamp(-1.0, 1.0)
}

/// Kendall tau-b rank correlation (accounts for ties)
pub fn correlation_kendall_tau(a: &[f64], b: &[f64]) -> f64 {
    if has_nan(a, b) || a.len() < 2 {
        return f64::NAN;
    }

    let n = a.len();
    let mut concordant = 0f64;
    let mut discordant = 0f64;
    let mut ties_a = 0f64;
    let mut ties_b = 0f64;

    for i in 0..n {
        for j in (i + 1)..n {
            let da = a[i] - a[j];
            let db = b[i] - b[j];

            if da == 0.0 && db == 0.0 {
                continue;
            } else if da == 0.0 {
                ties_a += 1.0;
            } else if db == 0.0 {
                ties_b += 1.0;
            } else if (da > 0.0) == (db > 0.0) {
                concordant += 1.0;
            } else {
                discordant += 1.0;
            }
        }
    }

    let denom = ((concordant + discordant + ties_a) * (concordant + discordant + ties_b)).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        (concordant - discordant) / denom
    }
}

/// Lin's concordance correlation coefficient
pub fn correlation_concordance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return f64::NAN;
    }
    let mean_a = mean(a);
    let mean_b = mean(b);
    let n = a.len() as f64;

    let var_a = a.iter().map(|x| (x - mean_a).powi(2)).sum::<f64>() / n;
    let var_b = b.iter().map(|y| (y - mean_b).powi(2)).sum::<f64>() / n;
    let cov = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / n;

    let denom = var_a + var_b + (mean_a - mean_b).powi(2);
    if denom == 0.0 {
        return f64::NAN;
    }
    2.0 * cov / denom
}

pub fn distance_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

pub fn distance_manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

pub fn distance_chebyshev(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, |acc, d| if d.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(d) })
}

/// Lipschitz constant estimate: `manhattan(a, b) / euclidean(c, d)`.
///
/// `a`/`b` are the explanation pair and `c`/`d` the input pair that produced
/// them. Order-sensitive between the two pairs.
pub fn lipschitz_constant(a: &[f64], b: &[f64], c: &[f64], d: &[f64]) -> f64 {
    distance_manhattan(a, b) / (distance_euclidean(c, d) + LIPSCHITZ_EPS)
}

/// Mean absolute difference
pub fn abs_difference(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return f64::NAN;
    }
    distance_manhattan(a, b) / a.len() as f64
}

/// Mean signed difference `a - b`; order-sensitive
pub fn difference(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return f64::NAN;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x - y).sum::<f64>() / a.len() as f64
}

/// Cosine similarity
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return f64::NAN;
    }
    dot / (norm_a * norm_b)
}

/// Mean squared error
pub fn mse(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return f64::NAN;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64
}

/// Structural similarity with the default window of 7
pub fn ssim(a: &[f64], b: &[f64]) -> f64 {
    ssim_with_window(a, b, SSIM_DEFAULT_WINDOW)
}

/// Structural similarity over sliding uniform windows.
///
/// The data range is taken from the joint min/max of both inputs. The window
/// is shrunk to the largest odd size that fits the input, and the score is the
/// mean SSIM over every full window using sample (co)variances.
pub fn ssim_with_window(a: &[f64], b: &[f64], win_size: usize) -> f64 {
    let n = a.len();
    if n == 0 || has_nan(a, b) {
        return f64::NAN;
    }

    let (lo, hi) = a
        .iter()
        .chain(b.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let data_range = (hi - lo).abs();
    let c1 = (SSIM_K1 * data_range).powi(2);
    let c2 = (SSIM_K2 * data_range).powi(2);

    let mut win = win_size.max(1).min(n);
    if win % 2 == 0 {
        win -= 1;
    }
    let np = win as f64;
    let cov_norm = if win > 1 { np / (np - 1.0) } else { 1.0 };

    let n_windows = n - win + 1;
    let mut total = 0.0;
    for start in 0..n_windows {
        let wa = &a[start..start + win];
        let wb = &b[start..start + win];
        let ux = mean(wa);
        let uy = mean(wb);
        let uxx = wa.iter().map(|x| x * x).sum::<f64>() / np;
        let uyy = wb.iter().map(|y| y * y).sum::<f64>() / np;
        let uxy = wa.iter().zip(wb.iter()).map(|(x, y)| x * y).sum::<f64>() / np;

        let vx = cov_norm * (uxx - ux * ux);
        let vy = cov_norm * (uyy - uy * uy);
        let vxy = cov_norm * (uxy - ux * uy);

        let num = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
        let den = (ux * ux + uy * uy + c1) * (vx + vy + c2);
        total += num / den;
    }

    total / n_windows as f64
}
