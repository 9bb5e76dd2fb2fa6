//! Aggregation of per-instance scores into a single value

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Reduction applied when `return_aggregate` is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunc {
    Mean,
    Median,
    Max,
    Min,
    Std,
}

impl AggregateFunc {
    pub const ALL: [AggregateFunc; 5] = [
        AggregateFunc::Mean,
        AggregateFunc::Median,
        AggregateFunc::Max,
        AggregateFunc::Min,
        AggregateFunc::Std,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Mean => "mean",
            AggregateFunc::Median => "median",
            AggregateFunc::Max => "max",
            AggregateFunc::Min => "min",
            AggregateFunc::Std => "std",
        }
    }

    /// Reduce the scores; an empty slice gives NaN
    pub fn apply(&self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return f64::NAN;
        }
        match self {
            AggregateFunc::Mean => mean(scores),
            AggregateFunc::Median => median(scores),
            AggregateFunc::Max => scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            AggregateFunc::Min => scores.iter().cloned().fold(f64::INFINITY, f64::min),
            AggregateFunc::Std => {
                let m = mean(scores);
                (scores.iter().map(|s| (s - m).powi(2)).sum::<f64>() / scores.len() as f64).sqrt()
            }
        }
    }
}

impl Default for AggregateFunc {
    fn default() -> Self {
        Self::Mean
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateFunc {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|func| func.name() == s)
            .ok_or_else(|| EvalError::InvalidConfiguration(format!("unknown aggregate function '{}'", s)))
    }
}

pub(crate) fn mean(scores: &[f64]) -> f64 {
    scores.iter().sum::<f64>() / scores.len() as f64
}

fn median(scores: &[f64]) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
