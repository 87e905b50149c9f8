use std::ops::Range;

use crate::domain::logging::LogComponent;
use crate::domain::market_data::Candle;
use crate::log_warn;

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 5.0;
const WHEEL_ZOOM_OUT: f64 = 0.9;
const WHEEL_ZOOM_IN: f64 = 1.1;
const PRICE_PADDING: f64 = 0.1;

/// Zoom/pan state selecting which candles are drawn.
///
/// The window is `floor(len / zoom)` candles starting at `floor(pan_offset)`.
/// While the window touches the newest candle it stays pinned there as
/// candles are appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartViewport {
    zoom: f64,
    pan_offset: f64,
    series_len: usize,
    follow_latest: bool,
}

impl Default for ChartViewport {
    fn default() -> Self {
        Self { zoom: 1.0, pan_offset: 0.0, series_len: 0, follow_latest: true }
    }
}

impl ChartViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan_offset(&self) -> f64 {
        self.pan_offset
    }

    pub fn follows_latest(&self) -> bool {
        self.follow_latest
    }

    /// Number of candles in the window for a series of `len` candles.
    pub fn visible_len(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((len as f64 / self.zoom).floor() as usize).clamp(1, len)
    }

    fn max_offset(&self) -> f64 {
        (self.series_len - self.visible_len(self.series_len)) as f64
    }

    pub fn set_zoom(&mut self, factor: f64) {
        if !factor.is_finite() {
            log_warn!(LogComponent::Domain("ChartViewport"), "ignored zoom factor {}", factor);
            return;
        }
        self.zoom = factor.clamp(MIN_ZOOM, MAX_ZOOM);
        self.settle();
    }

    /// Mouse-wheel zoom: scrolling down zooms out, anything else zooms in.
    pub fn wheel(&mut self, delta_y: f64) {
        let step = if delta_y > 0.0 { WHEEL_ZOOM_OUT } else { WHEEL_ZOOM_IN };
        self.set_zoom(self.zoom * step);
    }

    /// Shift the window by `delta` candles (positive moves toward newer data).
    pub fn pan(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        let max = self.max_offset();
        self.pan_offset = (self.pan_offset + delta).clamp(0.0, max);
        self.follow_latest = self.pan_offset >= max;
    }

    /// Pointer drag by `delta_px`; dragging right reveals older candles.
    pub fn drag(&mut self, delta_px: f64, spacing_px: f64) {
        if spacing_px > 0.0 {
            self.pan(-delta_px / spacing_px);
        }
    }

    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan_offset = 0.0;
        self.follow_latest = true;
        self.settle();
    }

    /// Tell the viewport the series now holds `len` candles.
    pub fn sync_len(&mut self, len: usize) {
        self.series_len = len;
        self.settle();
    }

    fn settle(&mut self) {
        let max = self.max_offset();
        self.pan_offset = if self.follow_latest { max } else { self.pan_offset.clamp(0.0, max) };
    }

    /// Index range of the window, always inside `0..len` and non-empty when
    /// `len > 0`.
    pub fn visible_range(&self, len: usize) -> Range<usize> {
        let visible = self.visible_len(len);
        let start = (self.pan_offset.max(0.0).floor() as usize).min(len - visible);
        start..start + visible
    }

    pub fn visible_slice<'a, T>(&self, series: &'a [T]) -> &'a [T] {
        &series[self.visible_range(series.len())]
    }
}

/// Vertical price range with padding applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    pub min: f64,
    pub max: f64,
}

impl PriceScale {
    /// Lowest low to highest high, padded by 10% of the range on both ends.
    /// A flat range is widened by 1% of the price (or by 1.0 at zero).
    pub fn from_candles(candles: &[Candle]) -> Option<Self> {
        let (low, high) = candles.iter().fold(None, |acc: Option<(f64, f64)>, candle| {
            let (lo, hi) = (candle.ohlcv.low.value(), candle.ohlcv.high.value());
            Some(match acc {
                Some((min, max)) => (min.min(lo), max.max(hi)),
                None => (lo, hi),
            })
        })?;
        Some(Self::padded(low, high))
    }

    pub fn padded(low: f64, high: f64) -> Self {
        let range = high - low;
        let pad = if range > 0.0 {
            range * PRICE_PADDING
        } else if high.abs() > 0.0 {
            high.abs() * 0.01
        } else {
            1.0
        };
        Self { min: low - pad, max: high + pad }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Price at `fraction` of the way from bottom (0.0) to top (1.0).
    pub fn lerp(&self, fraction: f64) -> f64 {
        self.min + self.range() * fraction
    }
}

/// Rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PlotArea {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Maps window indices and prices into a plot area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    pub plot: PlotArea,
    pub scale: PriceScale,
    pub count: usize,
}

impl CoordinateMapper {
    pub fn new(plot: PlotArea, scale: PriceScale, count: usize) -> Self {
        Self { plot, scale, count }
    }

    /// Horizontal slot width of one candle.
    pub fn spacing(&self) -> f64 {
        self.plot.width / self.count.max(1) as f64
    }

    pub fn candle_width(&self) -> f64 {
        (self.spacing() - 1.0).max(1.0)
    }

    /// Centre of slot `index`.
    pub fn index_to_x(&self, index: usize) -> f64 {
        let spacing = self.spacing();
        self.plot.left + index as f64 * spacing + spacing / 2.0
    }

    /// Higher prices map to smaller `y`.
    pub fn price_to_y(&self, price: f64) -> f64 {
        let normalized = (price - self.scale.min) / self.scale.range();
        self.plot.bottom() - normalized * self.plot.height
    }

    pub fn y_to_price(&self, y: f64) -> f64 {
        let normalized = (self.plot.bottom() - y) / self.plot.height;
        self.scale.lerp(normalized)
    }

    /// Slot under `x`, `None` outside the plot horizontally.
    pub fn x_to_slot(&self, x: f64) -> Option<usize> {
        if self.count == 0 || !x.is_finite() || x < self.plot.left || x >= self.plot.right() {
            return None;
        }
        let slot = ((x - self.plot.left) / self.spacing()).floor() as usize;
        Some(slot.min(self.count - 1))
    }
}
