use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

use crate::domain::chart::Color;

/// Simple moving average over every full window of `period` closes.
///
/// Yields `closes.len() - period + 1` values; nothing when the input is
/// shorter than the period or the period is zero.
pub fn simple_moving_average(closes: &[f64], period: usize) -> impl Iterator<Item = f64> + '_ {
    // `windows(0)` panics, so a zero period walks an empty slice instead.
    let source = if period == 0 { &closes[..0] } else { closes };
    source.windows(period.max(1)).map(move |window| window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average seeded with the SMA of the first `period`
/// closes, then `close * k + prev * (1 - k)` with `k = 2 / (period + 1)`.
pub fn exponential_moving_average(closes: &[f64], period: usize) -> Ema<'_> {
    let seeded = period > 0 && closes.len() >= period;
    Ema {
        rest: if seeded { &closes[period..] } else { &[] },
        prev: seeded.then(|| closes[..period].iter().sum::<f64>() / period as f64),
        pending_seed: seeded,
        k: 2.0 / (period as f64 + 1.0),
    }
}

/// Lazy EMA iterator; see [`exponential_moving_average`].
#[derive(Debug, Clone)]
pub struct Ema<'a> {
    rest: &'a [f64],
    prev: Option<f64>,
    pending_seed: bool,
    k: f64,
}

impl Iterator for Ema<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let prev = self.prev?;
        if self.pending_seed {
            self.pending_seed = false;
            return Some(prev);
        }
        let (close, rest) = self.rest.split_first()?;
        self.rest = rest;
        let value = close * self.k + prev * (1.0 - self.k);
        self.prev = Some(value);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = match self.prev {
            None => 0,
            Some(_) => self.rest.len() + usize::from(self.pending_seed),
        };
        (len, Some(len))
    }
}

impl ExactSizeIterator for Ema<'_> {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorKind {
    #[strum(serialize = "SMA")]
    Sma,
    #[strum(serialize = "EMA")]
    Ema,
}

/// One overlay line on the price pane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    pub period: usize,
    pub color: Color,
}

impl IndicatorSpec {
    pub const fn sma(period: usize, color: Color) -> Self {
        Self { kind: IndicatorKind::Sma, period, color }
    }

    pub const fn ema(period: usize, color: Color) -> Self {
        Self { kind: IndicatorKind::Ema, period, color }
    }

    /// `SMA20`, `EMA12`, ...
    pub fn label(&self) -> String {
        format!("{}{}", self.kind.as_ref(), self.period)
    }

    /// SMA 20, EMA 12 and EMA 26.
    pub fn default_set() -> Vec<IndicatorSpec> {
        vec![
            Self::sma(20, Color::from_hex(0xff6b6b)),
            Self::ema(12, Color::from_hex(0x4ecdc4)),
            Self::ema(26, Color::from_hex(0x45b7d1)),
        ]
    }
}

/// Indicator values aligned to series indices: `values[i]` belongs to the
/// candle at `first_index + i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorOverlay {
    pub spec: IndicatorSpec,
    pub first_index: usize,
    pub values: Vec<f64>,
}

impl IndicatorOverlay {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        index.checked_sub(self.first_index).and_then(|offset| self.values.get(offset).copied())
    }
}

/// Evaluate every indicator over the full close series. Indicators with no complete
/// window yet are omitted.
pub fn compute_overlays(closes: &[f64], specs: &[IndicatorSpec]) -> Vec<IndicatorOverlay> {
    specs
        .iter()
        .filter(|spec| spec.period > 0 && closes.len() >= spec.period)
        .map(|spec| {
            let values: Vec<f64> = match spec.kind {
                IndicatorKind::Sma => simple_moving_average(closes, spec.period).collect(),
                IndicatorKind::Ema => exponential_moving_average(closes, spec.period).collect(),
            };
            IndicatorOverlay { spec: *spec, first_index: spec.period - 1, values }
        })
        .collect()
}
