//! Utility functions shared by the metrics and model backends

mod shapes;

pub use shapes::{
    assert_attributions, assert_segmentations, expand_attribution_channel, infer_channel_first,
    make_channel_first,
};

use crate::error::{EvalError, Result};
use ndarray::{Array2, ArrayViewD};
use std::ops::Range;

/// Contiguous index ranges covering `0..n` in chunks of `batch_size`
pub fn gen_batches(n: usize, batch_size: usize) -> impl Iterator<Item = Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..n)
        .step_by(batch_size)
        .map(move |start| start..(start + batch_size).min(n))
}

/// View each instance (leading axis) as one row of features
pub fn flatten_instances(x: &ArrayViewD<f64>) -> Result<Array2<f64>> {
    if x.ndim() == 0 {
        return Err(EvalError::shape("batched input", "scalar"));
    }
    let n = x.shape()[0];
    let n_features: usize = x.shape()[1..].iter().product();
    Ok(Array2::from_shape_vec((n, n_features), x.iter().copied().collect())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gen_batches() {
        let batches: Vec<Range<usize>> = gen_batches(7, 3).collect();
        assert_eq!(batches, vec![0..3, 3..6, 6..7]);
        assert_eq!(gen_batches(0, 3).count(), 0);
        assert_eq!(gen_batches(4, 64).collect::<Vec<_>>(), vec![0..4]);
    }

    #[test]
    fn test_flatten_instances() {
        let x = array![[[1.0, 2.0], [3.0, 4.0]]].into_dyn();
        let rows = flatten_instances(&x.view()).unwrap();
        assert_eq!(rows, array![[1.0, 2.0, 3.0, 4.0]]);
    }
}
