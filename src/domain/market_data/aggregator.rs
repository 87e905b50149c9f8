//! Folds a stream of ticks into a bounded series of time-bucketed candles.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Candle, CandleSeries, Price, TimeInterval, Timestamp, Volume};
use crate::domain::logging::LogComponent;
use crate::{log_debug, log_trace, log_warn};

/// Hard bounds for the retained candle count.
pub const MIN_CANDLES: usize = 1;
pub const MAX_CANDLES: usize = 1000;
pub const DEFAULT_MAX_CANDLES: usize = 200;

/// Where per-candle volume comes from. The price feed carries no trade size,
/// so `Synthetic` fills the volume pane with seeded random values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum VolumeModel {
    #[default]
    Zero,
    Synthetic { seed: u64 },
}

/// Open time of a new candle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketAlignment {
    /// Opened at the timestamp of the tick that starts it.
    #[default]
    TickTime,
    /// Floored to a multiple of the bucket width.
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorConfig {
    pub timeframe: TimeInterval,
    pub max_candles: usize,
    pub volume_model: VolumeModel,
    pub alignment: BucketAlignment,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            timeframe: TimeInterval::default(),
            max_candles: DEFAULT_MAX_CANDLES,
            volume_model: VolumeModel::default(),
            alignment: BucketAlignment::default(),
        }
    }
}

/// What a single `ingest` call did to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First candle of an empty series.
    Started,
    /// The open candle absorbed the tick.
    Updated,
    /// The previous candle was sealed and a new one appended.
    Appended { evicted: usize },
    /// The price was not positive and finite; nothing changed.
    Rejected,
}

enum VolumeSource {
    Zero,
    Synthetic(StdRng),
}

impl VolumeSource {
    fn from_model(model: VolumeModel) -> Self {
        match model {
            VolumeModel::Zero => Self::Zero,
            VolumeModel::Synthetic { seed } => Self::Synthetic(StdRng::seed_from_u64(seed)),
        }
    }

    fn opening(&mut self) -> Volume {
        match self {
            Self::Zero => Volume::ZERO,
            Self::Synthetic(rng) => Volume::from(rng.gen_range(500.0..1500.0)),
        }
    }

    fn increment(&mut self) -> Volume {
        match self {
            Self::Zero => Volume::ZERO,
            Self::Synthetic(rng) => Volume::from(rng.gen_range(50.0..150.0)),
        }
    }
}

pub struct CandleAggregator {
    config: AggregatorConfig,
    series: CandleSeries,
    volume: VolumeSource,
}

impl CandleAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let config = AggregatorConfig { max_candles: clamp_max_candles(config.max_candles), ..config };
        Self {
            series: CandleSeries::new(config.max_candles),
            volume: VolumeSource::from_model(config.volume_model),
            config,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn timeframe(&self) -> TimeInterval {
        self.config.timeframe
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.count()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Fold one tick into the series.
    ///
    /// A tick at least one bucket width after the open candle's start seals
    /// it and opens a new candle. Anything earlier, including a tick older
    /// than the open candle itself, updates the open candle; sealed candles
    /// are never rewritten.
    pub fn ingest(&mut self, price: Price, timestamp: Timestamp) -> IngestOutcome {
        if !price.is_usable() {
            log_warn!(
                LogComponent::Domain("CandleAggregator"),
                "rejected tick with price {} at {}",
                price,
                timestamp
            );
            return IngestOutcome::Rejected;
        }

        let width = self.config.timeframe.duration_ms();
        let Some(open_time) = self.series.latest().map(|candle| candle.open_time) else {
            let volume = self.volume.opening();
            self.series.push(Candle::opened_at(self.open_time_for(timestamp), price, volume));
            return IngestOutcome::Started;
        };

        match timestamp.millis_since(open_time) {
            Some(elapsed) if elapsed >= width => {
                let volume = self.volume.opening();
                let start = self.open_time_for(timestamp);
                let evicted = self.series.push(Candle::opened_at(start, price, volume));
                log_trace!(
                    LogComponent::Domain("CandleAggregator"),
                    "sealed candle {}, opened {} (evicted {})",
                    open_time,
                    start,
                    evicted
                );
                IngestOutcome::Appended { evicted }
            }
            _ => {
                let volume = self.volume.increment();
                if let Some(candle) = self.series.latest_mut() {
                    candle.absorb(price, volume);
                }
                IngestOutcome::Updated
            }
        }
    }

    fn open_time_for(&self, timestamp: Timestamp) -> Timestamp {
        match self.config.alignment {
            BucketAlignment::TickTime => timestamp,
            BucketAlignment::Grid => timestamp.floor_to(self.config.timeframe.duration_ms()),
        }
    }

    /// Owned copy of the current series, oldest first.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.series.get_candles().iter().cloned().collect()
    }

    /// Load historical candles under the live ones. History is ordered by
    /// open time, duplicate open times collapse to the last one given and
    /// invalid candles are dropped. Live candles opened after the newest
    /// history candle are kept after it; the rest are superseded. Returns the
    /// resulting series length.
    pub fn seed(&mut self, mut candles: Vec<Candle>) -> usize {
        let before = candles.len();
        candles.retain(|candle| candle.ohlcv.is_valid());
        candles.sort_by_key(|candle| candle.open_time);
        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.open_time == candle.open_time => *last = candle,
                _ => deduped.push(candle),
            }
        }
        if deduped.len() < before {
            log_warn!(
                LogComponent::Domain("CandleAggregator"),
                "dropped {} invalid or duplicate history candles",
                before - deduped.len()
            );
        }
        let newest = deduped.last().map(|candle| candle.open_time);
        let live: Vec<Candle> = self
            .series
            .get_candles()
            .iter()
            .filter(|candle| newest.is_none_or(|newest| candle.open_time > newest))
            .cloned()
            .collect();
        log_debug!(
            LogComponent::Domain("CandleAggregator"),
            "seeded {} history candles, kept {} live",
            deduped.len(),
            live.len()
        );
        self.series.replace(deduped.into_iter().chain(live));
        self.series.count()
    }

    /// Switch the bucket width. Existing candles were built for the old width
    /// and are discarded.
    pub fn set_timeframe(&mut self, timeframe: TimeInterval) {
        if timeframe != self.config.timeframe {
            self.config.timeframe = timeframe;
            self.series.clear();
        }
    }

    /// Change the retained candle count, trimming the oldest candles.
    pub fn set_max_candles(&mut self, max_candles: usize) -> usize {
        self.config.max_candles = clamp_max_candles(max_candles);
        self.series.set_max_size(self.config.max_candles)
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}

pub fn clamp_max_candles(requested: usize) -> usize {
    requested.clamp(MIN_CANDLES, MAX_CANDLES)
}
