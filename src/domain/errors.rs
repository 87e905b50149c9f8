use derive_more::Display;

/// Socket-level failures. Never fatal: they feed the reconnect path.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum TransportError {
    #[display(fmt = "failed to open socket: {}", _0)]
    Open(String),
    #[display(fmt = "failed to send frame: {}", _0)]
    Send(String),
    #[display(fmt = "socket error: {}", _0)]
    Socket(String),
    #[display(fmt = "connection closed abnormally (code {}): {}", code, reason)]
    AbnormalClosure { code: u16, reason: String },
    #[display(fmt = "gave up after {} reconnect attempts", attempts)]
    RetriesExhausted { attempts: u32 },
}

/// A frame that could not be understood. Logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ProtocolError {
    #[display(fmt = "frame is not valid JSON: {}", _0)]
    InvalidJson(String),
    #[display(fmt = "frame has no string `type` field")]
    MissingType,
    #[display(fmt = "`{}` frame has an unexpected payload: {}", kind, reason)]
    InvalidPayload { kind: String, reason: String },
}

/// Raised by a subscriber callback while handling a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SubscriberError {
    #[display(fmt = "subscriber failed: {}", _0)]
    Failed(String),
    #[display(fmt = "subscriber channel closed")]
    ChannelClosed,
}

/// Market data that violates the OHLC rules or carries an unusable price.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ValidationError {
    #[display(fmt = "price {} is not a positive finite number", _0)]
    InvalidPrice(f64),
    #[display(fmt = "invalid candle: {}", _0)]
    InvalidCandle(String),
    #[display(fmt = "invalid timestamp: {}", _0)]
    InvalidTimestamp(String),
}

/// Failures of REST snapshot calls (candle history).
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum HttpError {
    #[display(fmt = "request failed: {}", _0)]
    RequestFailed(String),
    #[display(fmt = "HTTP {}: {}", status, text)]
    Status { status: u16, text: String },
    #[display(fmt = "unexpected response body: {}", _0)]
    InvalidBody(String),
}

/// Root error for host-level code.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum AppError {
    #[display(fmt = "Transport Error: {}", _0)]
    Transport(TransportError),
    #[display(fmt = "Protocol Error: {}", _0)]
    Protocol(ProtocolError),
    #[display(fmt = "Subscriber Error: {}", _0)]
    Subscriber(SubscriberError),
    #[display(fmt = "Validation Error: {}", _0)]
    Validation(ValidationError),
    #[display(fmt = "Http Error: {}", _0)]
    Http(HttpError),
    #[display(fmt = "Rendering Error: {}", _0)]
    Rendering(String),
}

impl std::error::Error for TransportError {}
impl std::error::Error for ProtocolError {}
impl std::error::Error for SubscriberError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for HttpError {}
impl std::error::Error for AppError {}

impl From<TransportError> for AppError {
    fn from(error: TransportError) -> Self {
        AppError::Transport(error)
    }
}

impl From<ProtocolError> for AppError {
    fn from(error: ProtocolError) -> Self {
        AppError::Protocol(error)
    }
}

impl From<SubscriberError> for AppError {
    fn from(error: SubscriberError) -> Self {
        AppError::Subscriber(error)
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::Validation(error)
    }
}

impl From<HttpError> for AppError {
    fn from(error: HttpError) -> Self {
        AppError::Http(error)
    }
}

pub type FeedResult<T> = Result<T, TransportError>;
pub type SubscriberResult = Result<(), SubscriberError>;
