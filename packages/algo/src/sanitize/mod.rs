//! Data Sanitization
//!
//! Numerical stability utilities.
//!
//! Functions:
//! - Probability clamping (closed and open intervals)
//! - Non-finite value replacement
//! - Stabilized division

use crate::types::{MAX_FITTED_PROBABILITY, MIN_FITTED_PROBABILITY};

/// 将概率限制在 [0, 1]，NaN 视为 0
#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// 将概率限制在 [0, 1]，非有限值使用 fallback
#[inline]
pub fn sanitize_probability(p: f64, fallback: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        clamp_probability(fallback)
    }
}

/// 将 EM 重估的参数限制在 [1e-6, 1 - 1e-6]
#[inline]
pub fn clamp_fitted(p: f64) -> f64 {
    if p.is_nan() {
        MIN_FITTED_PROBABILITY
    } else {
        p.clamp(MIN_FITTED_PROBABILITY, MAX_FITTED_PROBABILITY)
    }
}

/// num / (den + eps)
#[inline]
pub fn stabilized_ratio(num: f64, den: f64, eps: f64) -> f64 {
    num / (den + eps)
}
