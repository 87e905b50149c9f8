use derive_more::{Constructor, Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};

use crate::domain::logging::{LogComponent, get_logger};

/// Value Object - price quoted by the feed
#[derive(
    Debug, Clone, Copy, PartialEq, From, Into, Deref, Constructor, Display, Serialize, Deserialize,
)]
pub struct Price(f64);

impl Price {
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Positive and finite; anything else cannot take part in a candle.
    pub fn is_usable(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

/// Value Object - traded volume
#[derive(
    Debug, Clone, Copy, PartialEq, From, Into, Deref, Constructor, Display, Serialize, Deserialize,
)]
pub struct Volume(f64);

impl Volume {
    pub const ZERO: Volume = Volume(0.0);

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::ops::Add for Volume {
    type Output = Volume;

    fn add(self, rhs: Volume) -> Volume {
        Volume(self.0 + rhs.0)
    }
}

/// Value Object - milliseconds since the Unix epoch
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    Deref,
    Constructor,
    Display,
    Serialize,
    Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn from_millis(value: u64) -> Self {
        Self(value)
    }

    /// Milliseconds elapsed since `earlier`, `None` when `earlier` is later.
    pub fn millis_since(&self, earlier: Timestamp) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    /// Start of the grid bucket of width `width_ms` containing this instant.
    pub fn floor_to(&self, width_ms: u64) -> Timestamp {
        if width_ms == 0 { *self } else { Timestamp(self.0 - self.0 % width_ms) }
    }
}

/// Value Object - OHLCV data of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Constructor, Serialize, Deserialize)]
pub struct OHLCV {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Volume,
}

impl OHLCV {
    /// A flat candle where every price equals `price`.
    pub fn flat(price: Price, volume: Volume) -> Self {
        Self::new(price, price, price, price, volume)
    }

    /// `low <= min(open, close) <= max(open, close) <= high`, volume non-negative
    pub fn is_valid(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.high >= self.open
            && self.high >= self.close
            && self.open.is_usable()
            && self.close.is_usable()
            && self.volume.value() >= 0.0
            && self.volume.value().is_finite()
    }
}

/// Chart timeframe; fixes the bucket width of the aggregator.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    EnumIter,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
pub enum TimeInterval {
    #[default]
    #[strum(serialize = "1m")]
    #[serde(rename = "1m")]
    OneMinute,

    #[strum(serialize = "5m")]
    #[serde(rename = "5m")]
    FiveMinutes,

    #[strum(serialize = "15m")]
    #[serde(rename = "15m")]
    FifteenMinutes,

    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    OneHour,

    #[strum(serialize = "4h")]
    #[serde(rename = "4h")]
    FourHours,

    #[strum(serialize = "1d")]
    #[serde(rename = "1d")]
    OneDay,
}

impl TimeInterval {
    /// Looks up a timeframe identifier; unknown identifiers fall back to `1m`.
    pub fn from_id(id: &str) -> Self {
        id.parse().unwrap_or_else(|_| {
            get_logger().warn(
                LogComponent::Domain("TimeInterval"),
                &format!("unknown timeframe `{id}`, using 1m"),
            );
            TimeInterval::OneMinute
        })
    }

    pub fn id(&self) -> &str {
        self.as_ref()
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::OneMinute => 60 * 1000,
            Self::FiveMinutes => 5 * 60 * 1000,
            Self::FifteenMinutes => 15 * 60 * 1000,
            Self::OneHour => 60 * 60 * 1000,
            Self::FourHours => 4 * 60 * 60 * 1000,
            Self::OneDay => 24 * 60 * 60 * 1000,
        }
    }
}
