#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use live_candles_wasm::config::FeedConfig;
use live_candles_wasm::domain::errors::TransportError;
use live_candles_wasm::domain::market_data::{Candle, OHLCV, Price, Timestamp, Volume};
use live_candles_wasm::infrastructure::websocket::{
    Connector, FeedConnection, PendingTimer, ReconnectTimer, Socket, TransportEvents,
};

/// One socket handed out by [`MockConnector`].
pub struct OpenedSocket {
    pub url: String,
    pub events: TransportEvents,
    pub sent: Rc<RefCell<Vec<String>>>,
    pub closed: Rc<RefCell<Option<(u16, String)>>>,
}

struct MockSocket {
    sent: Rc<RefCell<Vec<String>>>,
    closed: Rc<RefCell<Option<(u16, String)>>>,
}

impl Socket for MockSocket {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.sent.borrow_mut().push(text.to_string());
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        *self.closed.borrow_mut() = Some((code, reason.to_string()));
    }
}

/// Records every socket the connection opens; `fail_next` makes the next
/// open return an error.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub opened: Rc<RefCell<Vec<OpenedSocket>>>,
    pub fail_next: Rc<Cell<bool>>,
}

impl MockConnector {
    pub fn count(&self) -> usize {
        self.opened.borrow().len()
    }

    pub fn last_events(&self) -> TransportEvents {
        self.opened.borrow().last().map(|s| s.events.clone()).expect("no socket opened")
    }

    pub fn events(&self, index: usize) -> TransportEvents {
        self.opened.borrow()[index].events.clone()
    }

    pub fn sent(&self, index: usize) -> Vec<String> {
        self.opened.borrow()[index].sent.borrow().clone()
    }

    pub fn closed(&self, index: usize) -> Option<(u16, String)> {
        self.opened.borrow()[index].closed.borrow().clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &str, events: TransportEvents) -> Result<Box<dyn Socket>, TransportError> {
        if self.fail_next.replace(false) {
            return Err(TransportError::Open("refused".to_string()));
        }
        let sent = Rc::new(RefCell::new(Vec::new()));
        let closed = Rc::new(RefCell::new(None));
        self.opened.borrow_mut().push(OpenedSocket {
            url: url.to_string(),
            events,
            sent: sent.clone(),
            closed: closed.clone(),
        });
        Ok(Box::new(MockSocket { sent, closed }))
    }
}

struct ScheduledTimer {
    delay: Duration,
    on_fire: Option<Box<dyn FnOnce()>>,
    cancelled: Rc<Cell<bool>>,
}

/// Timers that only fire when the test says so.
#[derive(Clone, Default)]
pub struct ManualTimer {
    scheduled: Rc<RefCell<Vec<ScheduledTimer>>>,
}

impl ManualTimer {
    pub fn delays(&self) -> Vec<Duration> {
        self.scheduled.borrow().iter().map(|t| t.delay).collect()
    }

    pub fn pending(&self) -> usize {
        self.scheduled
            .borrow()
            .iter()
            .filter(|t| t.on_fire.is_some() && !t.cancelled.get())
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.scheduled.borrow().iter().filter(|t| t.cancelled.get()).count()
    }

    /// Fire the most recently scheduled live timer. Returns whether one fired.
    pub fn fire_last(&self) -> bool {
        let on_fire = self
            .scheduled
            .borrow_mut()
            .iter_mut()
            .rev()
            .find(|t| !t.cancelled.get() && t.on_fire.is_some())
            .and_then(|t| t.on_fire.take());
        match on_fire {
            Some(on_fire) => {
                on_fire();
                true
            }
            None => false,
        }
    }
}

struct ManualPending {
    cancelled: Rc<Cell<bool>>,
}

impl PendingTimer for ManualPending {
    fn cancel(self: Box<Self>) {
        self.cancelled.set(true);
    }
}

impl ReconnectTimer for ManualTimer {
    fn schedule(&self, delay: Duration, on_fire: Box<dyn FnOnce()>) -> Box<dyn PendingTimer> {
        let cancelled = Rc::new(Cell::new(false));
        self.scheduled.borrow_mut().push(ScheduledTimer {
            delay,
            on_fire: Some(on_fire),
            cancelled: cancelled.clone(),
        });
        Box::new(ManualPending { cancelled })
    }
}

pub fn feed_config() -> FeedConfig {
    FeedConfig { url: "ws://test.invalid/feed".to_string(), ..FeedConfig::default() }
}

pub fn connection(config: FeedConfig) -> (FeedConnection, MockConnector, ManualTimer) {
    let connector = MockConnector::default();
    let timer = ManualTimer::default();
    let feed = FeedConnection::new(config, connector.clone(), timer.clone());
    (feed, connector, timer)
}

/// Connect and bring the first socket to the open state.
pub fn open_connection() -> (FeedConnection, MockConnector, ManualTimer) {
    let (feed, connector, timer) = connection(feed_config());
    feed.connect();
    connector.last_events().opened();
    feed.drain_events();
    (feed, connector, timer)
}

pub fn candle(open_time: u64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(
        Timestamp::from_millis(open_time),
        OHLCV::new(
            Price::from(open),
            Price::from(high),
            Price::from(low),
            Price::from(close),
            Volume::from(10.0),
        ),
    )
}

/// `count` one-minute candles with closes `base, base + 1, ...`.
pub fn rising_candles(count: usize, base: f64) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let close = base + i as f64;
            candle(i as u64 * 60_000, close - 0.5, close + 1.0, close - 1.0, close)
        })
        .collect()
}

pub fn price_frame(price: f64, timestamp: u64) -> String {
    format!(r#"{{"type":"price_update","data":{{"price":{price}}},"timestamp":{timestamp}}}"#)
}
