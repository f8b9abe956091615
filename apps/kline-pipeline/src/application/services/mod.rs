//! Application Services
//!
//! - `IndicatorPipeline`: owns the closed-bar history and turns each newly
//!   closed bar into freshly computed indicator vectors.

use crate::domain::indicators::{IndicatorError, compute_ema, compute_vwap};
use crate::domain::streaming::{Bar, IndicatorKind, IndicatorVector};

/// Settings for [`IndicatorPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSettings {
    /// EMA smoothing period.
    pub ema_period: usize,
    /// Whether a VWAP vector is produced alongside the EMA.
    pub vwap_enabled: bool,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_period: 9,
            vwap_enabled: false,
        }
    }
}

/// Closed-bar history plus the indicator recomputation trigger.
///
/// The history is append-only and never evicted; every closed bar triggers a
/// full recomputation over it.
#[derive(Debug)]
pub struct IndicatorPipeline {
    settings: IndicatorSettings,
    history: Vec<Bar>,
    newest_vwap_undefined: bool,
}

impl IndicatorPipeline {
    /// Create a pipeline with an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorError::InvalidPeriod`] if the EMA period is zero.
    pub const fn new(settings: IndicatorSettings) -> Result<Self, IndicatorError> {
        if settings.ema_period == 0 {
            return Err(IndicatorError::InvalidPeriod(settings.ema_period));
        }
        Ok(Self {
            settings,
            history: Vec::new(),
            newest_vwap_undefined: false,
        })
    }

    /// Feed one bar update.
    ///
    /// Open (in-progress) bars are ignored and yield no vectors. A closed bar
    /// is appended to the history and yields the EMA vector, followed by the
    /// VWAP vector when enabled. Undefined VWAP points are sent as `0.0`.
    ///
    /// # Errors
    ///
    /// Propagates indicator errors; with a validated period none occur.
    pub fn on_bar(&mut self, bar: Bar) -> Result<Vec<IndicatorVector>, IndicatorError> {
        if !bar.is_closed {
            return Ok(Vec::new());
        }

        self.history.push(bar);

        let period = self.settings.ema_period;
        let ema = compute_ema(&self.history, period)?;
        let mut vectors = vec![IndicatorVector::new(IndicatorKind::Ema { period }, ema)];

        self.newest_vwap_undefined = false;
        if self.settings.vwap_enabled {
            let points = compute_vwap(&self.history);
            self.newest_vwap_undefined = matches!(points.last(), Some(None));
            let vwap = points.into_iter().map(|p| p.unwrap_or(0.0)).collect();
            vectors.push(IndicatorVector::new(IndicatorKind::Vwap, vwap));
        }

        Ok(vectors)
    }

    /// Closed bars accumulated so far.
    #[must_use]
    pub fn history(&self) -> &[Bar] {
        &self.history
    }

    /// Whether the point added by the last closed bar was undefined and sent
    /// as `0.0`. Earlier points are not reconsidered, so each undefined point
    /// is reported once.
    #[must_use]
    pub const fn newest_vwap_undefined(&self) -> bool {
        self.newest_vwap_undefined
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> IndicatorSettings {
        self.settings
    }
}
