//! Wire format of the dashboard socket: JSON text frames discriminated by a
//! string `type` field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::FeedStream;
use crate::domain::errors::ProtocolError;
use crate::domain::market_data::{Price, Timestamp};
use crate::time_utils::parse_feed_timestamp;

/// Parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    PriceUpdate(PriceUpdate),
    BalanceUpdate(Value),
    OrderUpdate(OrderUpdate),
    TradingLog(TradingLog),
    MarketData(Value),
    /// Unrecognized `type`; the whole frame is passed through as received.
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUpdate {
    pub price: Price,
    /// `None` when the frame carried no timestamp or one that did not parse.
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub side: String,
    pub amount: NumberOrText,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingLog {
    pub message: String,
    #[serde(rename = "type", default)]
    pub level: Option<String>,
}

/// Backends disagree on whether amounts are numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for NumberOrText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Deserialize)]
struct PricePayload {
    price: NumberOrText,
}

impl FeedMessage {
    /// The `type` tag this message arrived with.
    pub fn kind(&self) -> &str {
        match self {
            Self::PriceUpdate(_) => "price_update",
            Self::BalanceUpdate(_) => "balance_update",
            Self::OrderUpdate(_) => "order_update",
            Self::TradingLog(_) => "trading_log",
            Self::MarketData(_) => "market_data",
            Self::Other(frame) => frame.get("type").and_then(Value::as_str).unwrap_or_default(),
        }
    }

    /// One-line activity entry for order and log frames.
    pub fn activity_line(&self) -> Option<String> {
        match self {
            Self::OrderUpdate(order) => Some(format!(
                "Order: {} {}{}",
                order.side.to_uppercase(),
                order.amount,
                order.status.as_deref().map(|s| format!(" ({s})")).unwrap_or_default()
            )),
            Self::TradingLog(log) => Some(log.message.clone()),
            Self::BalanceUpdate(_) => Some("Balance updated".to_string()),
            _ => None,
        }
    }
}

fn invalid(kind: &str, reason: impl ToString) -> ProtocolError {
    ProtocolError::InvalidPayload { kind: kind.to_string(), reason: reason.to_string() }
}

fn payload<T>(kind: &str, data: Option<Value>) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    let data = data.ok_or_else(|| invalid(kind, "missing `data`"))?;
    serde_json::from_value(data).map_err(|e| invalid(kind, e))
}

/// Parse one text frame.
pub fn parse_frame(text: &str) -> Result<FeedMessage, ProtocolError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let Value::Object(mut fields) = frame else {
        return Err(ProtocolError::MissingType);
    };
    let kind = match fields.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        _ => return Err(ProtocolError::MissingType),
    };

    match kind.as_str() {
        "price_update" => {
            let PricePayload { price } = payload(&kind, fields.remove("data"))?;
            let price = match price {
                NumberOrText::Number(n) => n,
                NumberOrText::Text(s) => {
                    s.trim().parse().map_err(|_| invalid(&kind, "price is not numeric"))?
                }
            };
            let timestamp = match fields.get("timestamp") {
                Some(Value::String(raw)) => parse_feed_timestamp(raw).ok(),
                Some(Value::Number(n)) => n.as_u64().map(Timestamp::from_millis),
                _ => None,
            };
            Ok(FeedMessage::PriceUpdate(PriceUpdate { price: Price::from(price), timestamp }))
        }
        "balance_update" => {
            Ok(FeedMessage::BalanceUpdate(fields.remove("data").unwrap_or(Value::Null)))
        }
        "order_update" => Ok(FeedMessage::OrderUpdate(payload(&kind, fields.remove("data"))?)),
        "trading_log" => Ok(FeedMessage::TradingLog(payload(&kind, fields.remove("data"))?)),
        "market_data" => Ok(FeedMessage::MarketData(fields.remove("data").unwrap_or(Value::Null))),
        _ => Ok(FeedMessage::Other(Value::Object(fields))),
    }
}

/// Control frames sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    SubscribePrice,
    SubscribeBalance,
}

impl From<FeedStream> for OutboundFrame {
    fn from(stream: FeedStream) -> Self {
        match stream {
            FeedStream::Price => Self::SubscribePrice,
            FeedStream::Balance => Self::SubscribeBalance,
        }
    }
}
