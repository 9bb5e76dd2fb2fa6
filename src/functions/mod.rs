//! Stateless numeric functions used by the metrics
//!
//! - Similarity / distance between two attributions
//! - Attribution normalisation
//! - Input perturbation (noise injection, baseline replacement)
//! - Score aggregation

pub mod aggregate;
pub mod normalise;
pub mod perturb;
pub mod similarity;

pub use aggregate::AggregateFunc;
pub use normalise::{denormalise, normalise_by_max, normalise_by_negative, NormaliseFunc};
pub use perturb::{
    baseline_replacement_by_indices, gaussian_noise, no_perturbation, uniform_noise, BaselineValue,
    PerturbFunc,
};
pub use similarity::{
    abs_difference, correlation_concordance, correlation_kendall_tau, correlation_pearson,
    correlation_spearman, cosine, difference, distance_chebyshev, distance_euclidean,
    distance_manhattan, lipschitz_constant, mse, ssim, ssim_with_window, SimilarityFunc,
};
