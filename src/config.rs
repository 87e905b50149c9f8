//! Runtime configuration. Every struct deserializes from JSON with defaults
//! for missing fields; out-of-range values are clamped, never rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::logging::LogComponent;
use crate::domain::market_data::{
    BucketAlignment, IndicatorSpec, TimeInterval, VolumeModel, aggregator,
};
use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub backend_uri: String,
    pub ws_uri: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_uri: "http://localhost:4000".to_string(),
            ws_uri: "ws://localhost:4000".to_string(),
        }
    }
}

/// Logical streams requested from the backend once the socket opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStream {
    Price,
    Balance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub max_reconnect_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub streams: Vec<FeedStream>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: BackendConfig::default().ws_uri,
            max_reconnect_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            streams: vec![FeedStream::Price, FeedStream::Balance],
        }
    }
}

impl FeedConfig {
    pub fn for_backend(backend: &BackendConfig) -> Self {
        Self { url: backend.ws_uri.clone(), ..Self::default() }
    }

    /// `min(base * 2^attempt, max)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub timeframe: TimeInterval,
    pub max_candles: usize,
    pub show_volume: bool,
    pub show_indicators: bool,
    pub volume_model: VolumeModel,
    pub alignment: BucketAlignment,
    pub indicators: Vec<IndicatorSpec>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            timeframe: TimeInterval::default(),
            max_candles: aggregator::DEFAULT_MAX_CANDLES,
            show_volume: true,
            show_indicators: true,
            volume_model: VolumeModel::Synthetic { seed: 0x5eed },
            alignment: BucketAlignment::default(),
            indicators: IndicatorSpec::default_set(),
        }
    }
}

impl ChartConfig {
    /// Copy with every value pulled into its valid range.
    pub fn normalized(&self) -> Self {
        let max_candles = aggregator::clamp_max_candles(self.max_candles);
        if max_candles != self.max_candles {
            log_warn!(
                LogComponent::Application("ChartConfig"),
                "max_candles {} clamped to {}",
                self.max_candles,
                max_candles
            );
        }
        let indicators = self.indicators.iter().filter(|spec| spec.period > 0).copied().collect();
        Self { max_candles, indicators, ..self.clone() }
    }

    pub fn aggregator_config(&self) -> aggregator::AggregatorConfig {
        aggregator::AggregatorConfig {
            timeframe: self.timeframe,
            max_candles: self.max_candles,
            volume_model: self.volume_model,
            alignment: self.alignment,
        }
    }
}

/// Everything the dashboard host needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub feed: Option<FeedConfig>,
    pub chart: ChartConfig,
}

impl AppConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Explicit feed settings, or defaults pointed at the backend socket.
    pub fn feed(&self) -> FeedConfig {
        self.feed.clone().unwrap_or_else(|| FeedConfig::for_backend(&self.backend))
    }
}
