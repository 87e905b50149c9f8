//! Candle history from the dashboard backend, used to seed a chart before
//! live ticks arrive.

use serde::Deserialize;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::domain::errors::{HttpError, ValidationError};
use crate::domain::logging::LogComponent;
use crate::domain::market_data::{Candle, OHLCV, Price, TimeInterval, Timestamp, Volume};
use crate::log_warn;
use crate::time_utils::parse_feed_timestamp;

pub fn candle_history_url(backend: &BackendConfig, timeframe: TimeInterval, limit: usize) -> String {
    format!(
        "{}/api/okx/price-movement?timeframe={}&limit={}",
        backend.backend_uri.trim_end_matches('/'),
        timeframe.id(),
        limit
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    #[serde(default)]
    recent_candles: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CandleDto {
    timestamp: TimestampDto,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimestampDto {
    Millis(u64),
    Text(String),
}

impl CandleDto {
    fn into_candle(self) -> Result<Candle, ValidationError> {
        let open_time = match self.timestamp {
            TimestampDto::Millis(millis) => Timestamp::from_millis(millis),
            TimestampDto::Text(raw) => parse_feed_timestamp(&raw)?,
        };
        let ohlcv = OHLCV::new(
            Price::from(self.open),
            Price::from(self.high),
            Price::from(self.low),
            Price::from(self.close),
            Volume::from(self.volume),
        );
        if !ohlcv.is_valid() {
            return Err(ValidationError::InvalidCandle(format!("{ohlcv:?} at {open_time}")));
        }
        Ok(Candle::new(open_time, ohlcv))
    }
}

/// Decode a `{ "recentCandles": [...] }` body. Entries that do not decode or
/// break the OHLC rules are skipped.
pub fn parse_history(body: &str) -> Result<Vec<Candle>, HttpError> {
    let response: HistoryResponse =
        serde_json::from_str(body).map_err(|e| HttpError::InvalidBody(e.to_string()))?;

    let mut candles = Vec::with_capacity(response.recent_candles.len());
    for entry in response.recent_candles {
        let candle = serde_json::from_value::<CandleDto>(entry)
            .map_err(|e| ValidationError::InvalidCandle(e.to_string()))
            .and_then(CandleDto::into_candle);
        match candle {
            Ok(candle) => candles.push(candle),
            Err(error) => {
                log_warn!(LogComponent::Infrastructure("HistoryClient"), "skipped candle: {}", error);
            }
        }
    }
    Ok(candles)
}

#[cfg(target_arch = "wasm32")]
pub use client::HistoryClient;

#[cfg(target_arch = "wasm32")]
mod client {
    use gloo_net::http::Request;

    use super::{candle_history_url, parse_history};
    use crate::config::BackendConfig;
    use crate::domain::errors::HttpError;
    use crate::domain::logging::LogComponent;
    use crate::domain::market_data::{Candle, TimeInterval};
    use crate::log_info;

    #[derive(Clone)]
    pub struct HistoryClient {
        backend: BackendConfig,
    }

    impl HistoryClient {
        pub fn new(backend: BackendConfig) -> Self {
            Self { backend }
        }

        pub async fn fetch_recent(
            &self,
            timeframe: TimeInterval,
            limit: usize,
        ) -> Result<Vec<Candle>, HttpError> {
            let url = candle_history_url(&self.backend, timeframe, limit);
            log_info!(LogComponent::Infrastructure("HistoryClient"), "GET {}", url);

            let response = Request::get(&url)
                .send()
                .await
                .map_err(|e| HttpError::RequestFailed(e.to_string()))?;
            if !response.ok() {
                return Err(HttpError::Status {
                    status: response.status(),
                    text: response.status_text(),
                });
            }
            let body = response.text().await.map_err(|e| HttpError::InvalidBody(e.to_string()))?;
            let candles = parse_history(&body)?;
            log_info!(
                LogComponent::Infrastructure("HistoryClient"),
                "loaded {} candles for {}",
                candles.len(),
                timeframe
            );
            Ok(candles)
        }
    }
}
