//! Progress reporting through `tracing`

use tracing::{debug, info};

/// Counts scored instances across all steps of an evaluation.
///
/// Purely observational: nothing in the scoring path reads it back.
pub(crate) struct Progress {
    metric: &'static str,
    total: usize,
    done: usize,
    enabled: bool,
    step: Option<String>,
}

impl Progress {
    pub(crate) fn new(metric: &'static str, total: usize, enabled: bool) -> Self {
        if enabled {
            info!(metric, total, "Evaluation started");
        }
        Self {
            metric,
            total,
            done: 0,
            enabled,
            step: None,
        }
    }

    pub(crate) fn set_step(&mut self, step: &str) {
        if self.enabled {
            info!(metric = self.metric, step, done = self.done, total = self.total, "Evaluating step");
        }
        self.step = Some(step.to_string());
    }

    pub(crate) fn update(&mut self, n: usize) {
        self.done += n;
        if self.enabled {
            debug!(
                metric = self.metric,
                step = self.step.as_deref().unwrap_or(""),
                done = self.done,
                total = self.total,
                "Progress"
            );
        }
    }

    pub(crate) fn finish(self) {
        if self.enabled {
            info!(metric = self.metric, done = self.done, total = self.total, "Evaluation finished");
        }
    }
}
