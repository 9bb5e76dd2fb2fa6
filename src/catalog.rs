//! Names of everything that can be selected by configuration

use crate::functions::{AggregateFunc, NormaliseFunc, PerturbFunc, SimilarityFunc};
use crate::metrics::{
    EvaluationCategory, MetricInfo, ModelParameterRandomisation, RandomLogit,
};
use std::collections::BTreeMap;

pub fn available_similarity_functions() -> Vec<&'static str> {
    SimilarityFunc::ALL.iter().map(|f| f.name()).collect()
}

pub fn available_normalisation_functions() -> Vec<&'static str> {
    NormaliseFunc::names()
}

pub fn available_perturbation_functions() -> Vec<&'static str> {
    PerturbFunc::ALL.iter().map(|f| f.name()).collect()
}

pub fn available_aggregate_functions() -> Vec<&'static str> {
    AggregateFunc::ALL.iter().map(|f| f.name()).collect()
}

/// Every metric category, including ones without implemented metrics
pub fn available_categories() -> Vec<&'static str> {
    EvaluationCategory::ALL.iter().map(|c| c.name()).collect()
}

/// Implemented metrics grouped by category
pub fn available_metrics() -> BTreeMap<&'static str, Vec<MetricInfo>> {
    let mut metrics: BTreeMap<&'static str, Vec<MetricInfo>> = BTreeMap::new();
    for info in [ModelParameterRandomisation::INFO, RandomLogit::INFO] {
        metrics
            .entry(info.evaluation_category.name())
            .or_default()
            .push(info);
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_functions() {
        let similarity = available_similarity_functions();
        assert!(similarity.contains(&"correlation_spearman"));
        assert!(similarity.contains(&"ssim"));
        assert_eq!(similarity.len(), SimilarityFunc::ALL.len());

        assert!(available_normalisation_functions().contains(&"normalise_by_max"));
        assert!(available_aggregate_functions().contains(&"median"));
        assert!(!available_perturbation_functions().is_empty());
    }

    #[test]
    fn test_available_metrics() {
        let metrics = available_metrics();
        let randomisation = &metrics["Randomisation"];
        let names: Vec<&str> = randomisation.iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Model Parameter Randomisation", "Random Logit"]);
        assert_eq!(available_categories().len(), 6);
    }
}
