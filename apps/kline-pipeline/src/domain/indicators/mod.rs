//! Indicator Engine
//!
//! Pure functions over an ordered bar history.
//!
//! ```text
//! k       = 2 / (period + 1)
//! ema[0]  = close[0]
//! ema[i]  = close[i] * k + ema[i-1] * (1 - k)
//!
//! vwap[i] = Σ(typical[0..=i] * volume[0..=i]) / Σ volume[0..=i]
//! ```
//!
//! Both series have exactly one value per input bar and are recomputed from
//! the full history on every call.

use super::streaming::Bar;

/// Indicator computation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    /// The smoothing period must be at least 1.
    #[error("invalid EMA period {0}: must be at least 1")]
    InvalidPeriod(usize),
}

/// Smoothing factor `2 / (period + 1)`.
#[allow(clippy::cast_precision_loss)]
fn smoothing_factor(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Compute the EMA of bar closes, seeded with the first close.
///
/// Returns an empty vector for an empty history.
///
/// # Errors
///
/// Returns [`IndicatorError::InvalidPeriod`] when `period` is zero.
pub fn compute_ema(bars: &[Bar], period: usize) -> Result<Vec<f64>, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(period));
    }

    let k = smoothing_factor(period);
    let mut ema = Vec::with_capacity(bars.len());
    let mut closes = bars.iter().map(|bar| bar.close);

    let Some(seed) = closes.next() else {
        return Ok(ema);
    };
    ema.push(seed);

    let mut prev = seed;
    for close in closes {
        prev = close.mul_add(k, prev * (1.0 - k));
        ema.push(prev);
    }

    Ok(ema)
}

/// Compute the cumulative VWAP using each bar's typical price.
///
/// A point is `None` while the cumulative volume is still zero, so the series
/// never contains NaN.
#[must_use]
pub fn compute_vwap(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut cumulative_price_volume = 0.0;
    let mut cumulative_volume = 0.0;

    bars.iter()
        .map(|bar| {
            cumulative_price_volume += bar.typical_price() * bar.volume;
            cumulative_volume += bar.volume;

            if cumulative_volume > 0.0 {
                Some(cumulative_price_volume / cumulative_volume)
            } else {
                None
            }
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
