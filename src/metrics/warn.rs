//! One-off user warnings emitted when a metric is constructed

use tracing::warn;

/// Warn that the metric's result depends on how it is parameterised
pub(crate) fn warn_parameterisation(metric_name: &str, sensitive_params: &str, citation: &str) {
    warn!(
        metric = metric_name,
        "The {} metric is likely to be sensitive to the choice of {}. \
         Go over and select each hyperparameter of the metric carefully to avoid \
         misinterpretation of scores. To view all relevant hyperparameters call \
         .config() on the metric instance. For further reading: {}",
        metric_name,
        sensitive_params,
        citation
    );
}
