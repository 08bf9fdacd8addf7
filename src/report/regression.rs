//! Exponentially weighted linear regression
//!
//! Fits `y = slope * x + intercept` by weighted least squares, solving the
//! 2x2 normal equations directly.

use crate::error::{ChainError, Result};
use num_traits::Float;
use serde::Serialize;

/// Fitted line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit<F> {
    pub slope: F,
    pub intercept: F,
}

impl<F: Float> LinearFit<F> {
    pub fn predict(&self, x: F) -> F {
        self.slope * x + self.intercept
    }
}

/// Weights `exp(-decay * i)` for `i` in `0..len`; the first observation
/// weighs most
pub fn exponential_weights<F: Float>(len: usize, decay: F) -> Vec<F> {
    (0..len)
        .map(|i| {
            let i = F::from(i).unwrap_or_else(F::nan);
            (-decay * i).exp()
        })
        .collect()
}

/// Weighted least squares fit of `y` against `x`
pub fn weighted_linear_regression<F: Float>(x: &[F], y: &[F], weights: &[F]) -> Result<LinearFit<F>> {
    if x.len() != y.len() || x.len() != weights.len() {
        return Err(ChainError::RegressionError(format!(
            "length mismatch: x={}, y={}, weights={}",
            x.len(),
            y.len(),
            weights.len()
        )));
    }

    // Entries of X^T W X and X^T W y with X = [1 x]
    let mut sw = F::zero();
    let mut swx = F::zero();
    let mut swxx = F::zero();
    let mut swy = F::zero();
    let mut swxy = F::zero();
    for ((&xi, &yi), &wi) in x.iter().zip(y).zip(weights) {
        sw = sw + wi;
        swx = swx + wi * xi;
        swxx = swxx + wi * xi * xi;
        swy = swy + wi * yi;
        swxy = swxy + wi * xi * yi;
    }

    let det = sw * swxx - swx * swx;
    let scale = (sw * swxx).abs().max(F::one());
    if !det.is_finite() || det.abs() <= F::epsilon() * scale {
        return Err(ChainError::RegressionError(
            "singular system: need at least two distinct weighted x values".to_string(),
        ));
    }

    let slope = (sw * swxy - swx * swy) / det;
    let intercept = (swxx * swy - swx * swxy) / det;
    Ok(LinearFit { slope, intercept })
}

/// Fit with exponentially decaying weights
pub fn decayed_linear_regression<F: Float>(x: &[F], y: &[F], decay: F) -> Result<LinearFit<F>> {
    let weights = exponential_weights(x.len(), decay);
    weighted_linear_regression(x, y, &weights)
}
