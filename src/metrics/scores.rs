//! Evaluation result containers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-instance scores keyed by step (layer) name, in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerScores {
    entries: Vec<(String, Vec<f64>)>,
}

impl LayerScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the scores of one step, replacing an earlier entry of the same name
    pub fn insert(&mut self, step: impl Into<String>, scores: Vec<f64>) {
        let step = step.into();
        match self.entries.iter_mut().find(|(name, _)| *name == step) {
            Some(entry) => entry.1 = scores,
            None => self.entries.push((step, scores)),
        }
    }

    pub fn get(&self, step: &str) -> Option<&[f64]> {
        self.entries
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, scores)| scores.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries
            .iter()
            .map(|(name, scores)| (name.as_str(), scores.as_slice()))
    }
}

/// Result of one metric call
///
/// Which variant comes back is fixed by the metric's configuration flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "scores", rename_all = "snake_case")]
pub enum EvaluationScores {
    /// Step name -> one score per instance
    PerLayer(LayerScores),
    /// Instance index -> mean score over all steps
    PerSample(BTreeMap<usize, f64>),
    /// One score per instance
    PerInstance(Vec<f64>),
    /// Single aggregated value
    Aggregate(Vec<f64>),
}

impl EvaluationScores {
    pub fn as_per_layer(&self) -> Option<&LayerScores> {
        match self {
            EvaluationScores::PerLayer(scores) => Some(scores),
            _ => None,
        }
    }

    pub fn as_per_sample(&self) -> Option<&BTreeMap<usize, f64>> {
        match self {
            EvaluationScores::PerSample(scores) => Some(scores),
            _ => None,
        }
    }

    /// Flat score sequence for the `PerInstance` and `Aggregate` variants
    pub fn as_slice(&self) -> Option<&[f64]> {
        match self {
            EvaluationScores::PerInstance(scores) | EvaluationScores::Aggregate(scores) => {
                Some(scores)
            }
            _ => None,
        }
    }

    /// The aggregated value, if this is an `Aggregate` result
    pub fn aggregate(&self) -> Option<f64> {
        match self {
            EvaluationScores::Aggregate(scores) => scores.first().copied(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_scores_keep_order() {
        let mut scores = LayerScores::new();
        scores.insert("dense_2", vec![0.1]);
        scores.insert("dense_0", vec![0.2]);
        scores.insert("dense_2", vec![0.3]);
        assert_eq!(scores.keys().collect::<Vec<_>>(), vec!["dense_2", "dense_0"]);
        assert_eq!(scores.get("dense_2"), Some(&[0.3][..]));
        assert_eq!(scores.get("missing"), None);
    }

    #[test]
    fn test_scores_serialize_tagged() {
        let scores = EvaluationScores::Aggregate(vec![0.5]);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"kind":"aggregate","scores":[0.5]}"#);
        let back: EvaluationScores = serde_json::from_str(&json).unwrap();
        assert_eq!(back.aggregate(), Some(0.5));
    }
}
