use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{OHLCV, Price, Timestamp, Volume};

/// Domain entity - Candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: Timestamp,
    pub ohlcv: OHLCV,
}

impl Candle {
    pub fn new(open_time: Timestamp, ohlcv: OHLCV) -> Self {
        Self { open_time, ohlcv }
    }

    /// Candle opened by a single trade at `price`.
    pub fn opened_at(open_time: Timestamp, price: Price, volume: Volume) -> Self {
        Self::new(open_time, OHLCV::flat(price, volume))
    }

    /// Bullish when the close did not fall below the open.
    pub fn is_bullish(&self) -> bool {
        self.ohlcv.close >= self.ohlcv.open
    }

    pub fn change(&self) -> f64 {
        self.ohlcv.close.value() - self.ohlcv.open.value()
    }

    pub fn change_percent(&self) -> f64 {
        let open = self.ohlcv.open.value();
        if open == 0.0 { 0.0 } else { self.change() / open * 100.0 }
    }

    /// Fold one more trade into this candle.
    pub(crate) fn absorb(&mut self, price: Price, volume: Volume) {
        if price > self.ohlcv.high {
            self.ohlcv.high = price;
        }
        if price < self.ohlcv.low {
            self.ohlcv.low = price;
        }
        self.ohlcv.close = price;
        self.ohlcv.volume = self.ohlcv.volume + volume;
    }
}

/// Domain entity - bounded, time-ordered candle sequence (FIFO eviction)
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    max_size: usize,
}

impl CandleSeries {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self { candles: VecDeque::with_capacity(max_size), max_size }
    }

    /// Append a candle newer than the current last one and evict from the
    /// front until the bound holds. Returns how many candles were evicted.
    pub(crate) fn push(&mut self, candle: Candle) -> usize {
        debug_assert!(self.latest().is_none_or(|last| last.open_time < candle.open_time));
        self.candles.push_back(candle);
        self.evict_overflow()
    }

    /// Replace the whole series, keeping only the newest `max_size` candles.
    pub(crate) fn replace(&mut self, candles: impl IntoIterator<Item = Candle>) {
        self.candles.clear();
        self.candles.extend(candles);
        self.evict_overflow();
    }

    pub(crate) fn set_max_size(&mut self, max_size: usize) -> usize {
        self.max_size = max_size.max(1);
        self.evict_overflow()
    }

    pub(crate) fn clear(&mut self) {
        self.candles.clear();
    }

    fn evict_overflow(&mut self) -> usize {
        let overflow = self.candles.len().saturating_sub(self.max_size);
        self.candles.drain(..overflow);
        overflow
    }

    pub fn get_candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub(crate) fn latest_mut(&mut self) -> Option<&mut Candle> {
        self.candles.back_mut()
    }

    pub fn count(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}
