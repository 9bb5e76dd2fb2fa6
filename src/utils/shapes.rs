//! Shape inspection and validation for input, attribution and mask batches

use crate::error::{EvalError, Result};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

/// Guess whether a batch is laid out channel-first.
///
/// Tabular input (2-D) has no channel axis and counts as channel-first.
/// Series (3-D) put channels on the shorter of the two trailing axes. Images
/// (4-D) are channel-first when the trailing pair is square and channel-last
/// when the middle pair is square.
pub fn infer_channel_first(shape: &[usize]) -> Result<bool> {
    match shape.len() {
        2 => Ok(true),
        3 => {
            let (a, b) = (shape[1], shape[2]);
            if b > a {
                Ok(true)
            } else if b < a {
                Ok(false)
            } else {
                Err(EvalError::shape(
                    "distinguishable channel and time axes",
                    format!("{:?}; set channel_first explicitly", shape),
                ))
            }
        }
        4 => {
            if shape[2] == shape[3] {
                Ok(true)
            } else if shape[1] == shape[2] {
                Ok(false)
            } else {
                Err(EvalError::shape(
                    "square spatial axes",
                    format!("{:?}; set channel_first explicitly", shape),
                ))
            }
        }
        _ => Err(EvalError::shape(
            "batched 1-D, 2-D series or image input",
            format!("{}-D input {:?}", shape.len(), shape),
        )),
    }
}

/// Move a trailing channel axis to position 1
pub fn make_channel_first(x: ArrayD<f64>, channel_first: bool) -> ArrayD<f64> {
    if channel_first || x.ndim() <= 2 {
        return x;
    }
    let ndim = x.ndim();
    let mut axes: Vec<usize> = Vec::with_capacity(ndim);
    axes.push(0);
    axes.push(ndim - 1);
    axes.extend(1..ndim - 1);
    x.permuted_axes(IxDyn(&axes)).as_standard_layout().into_owned()
}

/// Insert a singleton channel axis into attributions that lack one
pub fn expand_attribution_channel(a: ArrayD<f64>, x_shape: &[usize]) -> Result<ArrayD<f64>> {
    if a.ndim() == 0 || a.shape()[0] != x_shape[0] {
        return Err(EvalError::shape(
            format!("{} attributions", x_shape[0]),
            format!("attribution shape {:?}", a.shape()),
        ));
    }
    if a.ndim() == x_shape.len() {
        return Ok(a);
    }
    if a.ndim() + 1 != x_shape.len() {
        return Err(EvalError::shape(
            format!("attributions with {} or {} axes", x_shape.len(), x_shape.len() - 1),
            format!("{} axes", a.ndim()),
        ));
    }
    Ok(a.insert_axis(Axis(1)))
}

/// Every non-leading attribution axis must match the input or be 1
pub fn assert_attributions(x_shape: &[usize], a_shape: &[usize]) -> Result<()> {
    let compatible = x_shape.len() == a_shape.len()
        && x_shape[0] == a_shape[0]
        && x_shape
            .iter()
            .zip(a_shape.iter())
            .skip(1)
            .all(|(&xs, &as_)| xs == as_ || as_ == 1);

    if compatible {
        Ok(())
    } else {
        Err(EvalError::shape(
            format!("attributions compatible with input {:?}", x_shape),
            format!("{:?}", a_shape),
        ))
    }
}

/// Masks share the instance count and contain only 0 and 1
pub fn assert_segmentations(x_shape: &[usize], s: &ArrayViewD<f64>) -> Result<()> {
    if s.ndim() == 0 || s.shape()[0] != x_shape[0] {
        return Err(EvalError::shape(
            format!("{} segmentation masks", x_shape[0]),
            format!("mask shape {:?}", s.shape()),
        ));
    }
    if s.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(EvalError::shape(
            "binary segmentation masks",
            "values other than 0 and 1",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_channel_first() {
        assert!(infer_channel_first(&[8, 10]).unwrap());
        assert!(infer_channel_first(&[8, 1, 100]).unwrap());
        assert!(!infer_channel_first(&[8, 100, 3]).unwrap());
        assert!(infer_channel_first(&[8, 3, 28, 28]).unwrap());
        assert!(!infer_channel_first(&[8, 28, 28, 3]).unwrap());
        assert!(infer_channel_first(&[8, 4, 4]).is_err());
        assert!(infer_channel_first(&[8, 3, 28, 30]).is_err());
        assert!(infer_channel_first(&[8]).is_err());
    }

    #[test]
    fn test_make_channel_first() {
        let x = ArrayD::from_shape_vec(IxDyn(&[1, 2, 2, 3]), (0..12).map(f64::from).collect())
            .unwrap();
        let moved = make_channel_first(x.clone(), false);
        assert_eq!(moved.shape(), &[1, 3, 2, 2]);
        assert_eq!(moved[&[0, 1, 0, 1][..]], x[&[0, 0, 1, 1][..]]);
        assert_eq!(make_channel_first(x.clone(), true), x);
    }

    #[test]
    fn test_expand_attribution_channel() {
        let a = ArrayD::<f64>::zeros(IxDyn(&[2, 4, 4]));
        let expanded = expand_attribution_channel(a, &[2, 3, 4, 4]).unwrap();
        assert_eq!(expanded.shape(), &[2, 1, 4, 4]);

        let wrong = ArrayD::<f64>::zeros(IxDyn(&[3, 4, 4]));
        assert!(expand_attribution_channel(wrong, &[2, 3, 4, 4]).is_err());

        let flat = ArrayD::<f64>::zeros(IxDyn(&[2, 16]));
        assert!(expand_attribution_channel(flat, &[2, 3, 4, 4]).is_err());
    }

    #[test]
    fn test_assert_attributions() {
        assert!(assert_attributions(&[2, 3, 4, 4], &[2, 1, 4, 4]).is_ok());
        assert!(assert_attributions(&[2, 3, 4, 4], &[2, 3, 4, 4]).is_ok());
        assert!(assert_attributions(&[2, 3, 4, 4], &[2, 2, 4, 4]).is_err());
    }

    #[test]
    fn test_assert_segmentations() {
        let s = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        assert!(assert_segmentations(&[2, 5], &s.view()).is_ok());
        assert!(assert_segmentations(&[3, 5], &s.view()).is_err());
        let soft = ArrayD::from_shape_vec(IxDyn(&[2, 1]), vec![0.5, 1.0]).unwrap();
        assert!(assert_segmentations(&[2, 5], &soft.view()).is_err());
    }
}
