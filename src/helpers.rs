//! Shared rounding helpers for score and reading values.
//!
//! All reported values go through fixed decimal-place rounding so that
//! responses stay stable across sources with different native precision:
//!
//! - `round1`: 1 decimal place (scores, KP, percentages, elevations)
//! - `round3`: 3 decimal places (moon illumination fraction)
//!
//! Both return `0.0` for non-finite inputs (NaN, ±Inf).

/// Round an f64 to 1 decimal place.
pub(crate) fn round1(v: f64) -> f64 {
    if !v.is_finite() {
        tracing::warn!("round1 received non-finite value {}, defaulting to 0", v);
        return 0.0;
    }
    (v * 10.0).round() / 10.0
}

/// Round an f64 to 3 decimal places.
pub(crate) fn round3(v: f64) -> f64 {
    if !v.is_finite() {
        tracing::warn!("round3 received non-finite value {}, defaulting to 0", v);
        return 0.0;
    }
    (v * 1000.0).round() / 1000.0
}

/// Round an optional f64 to 1 decimal place, preserving `None`.
pub(crate) fn opt_round1(v: Option<f64>) -> Option<f64> {
    v.map(round1)
}
