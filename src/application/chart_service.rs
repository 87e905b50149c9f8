use std::cell::RefCell;
use std::rc::Rc;

use crate::config::ChartConfig;
use crate::domain::chart::{ChartViewport, SurfaceSize};
use crate::domain::errors::SubscriberError;
use crate::domain::logging::{LogComponent, get_time_provider};
use crate::domain::market_data::{
    Candle, CandleAggregator, IndicatorOverlay, IngestOutcome, TimeInterval, Timestamp,
    compute_overlays,
};
use crate::infrastructure::rendering::{ChartLayout, Frame, FrameInput, RenderPipeline, Tooltip};
use crate::infrastructure::websocket::{ConnectionLease, FeedConnection, FeedMessage, Subscription};
use crate::{log_debug, log_info};

/// Per-chart controller: folds feed ticks into candles and answers the
/// host's paint and pointer requests.
pub struct ChartSession {
    config: ChartConfig,
    aggregator: CandleAggregator,
    viewport: ChartViewport,
    pipeline: RenderPipeline,
    current_price: Option<f64>,
    playing: bool,
    revision: u64,
}

impl ChartSession {
    pub fn new(config: ChartConfig) -> Self {
        let config = config.normalized();
        Self {
            aggregator: CandleAggregator::new(config.aggregator_config()),
            viewport: ChartViewport::new(),
            pipeline: RenderPipeline::default(),
            current_price: None,
            playing: true,
            revision: 0,
            config,
        }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn candles(&self) -> Vec<Candle> {
        self.aggregator.snapshot()
    }

    pub fn viewport(&self) -> &ChartViewport {
        &self.viewport
    }

    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn timeframe(&self) -> TimeInterval {
        self.aggregator.timeframe()
    }

    /// Bumped on every visible change; hosts repaint when it moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.viewport.sync_len(self.aggregator.len());
        self.revision += 1;
    }

    /// Fold a `price_update` into the candles while playing; every other
    /// message is ignored.
    pub fn handle_message(&mut self, message: &FeedMessage) -> Option<IngestOutcome> {
        let FeedMessage::PriceUpdate(update) = message else {
            return None;
        };
        if !self.playing {
            return None;
        }
        let timestamp = update
            .timestamp
            .unwrap_or_else(|| Timestamp::from_millis(get_time_provider().current_timestamp()));
        let outcome = self.aggregator.ingest(update.price, timestamp);
        if outcome != IngestOutcome::Rejected {
            self.current_price = Some(update.price.value());
            self.touch();
        }
        Some(outcome)
    }

    /// Load fetched history beneath the live candles. Returns the series
    /// length afterwards.
    pub fn seed_history(&mut self, candles: Vec<Candle>) -> usize {
        let live_open = self.aggregator.series().latest().map(|c| c.open_time);
        let kept = self.aggregator.seed(candles);
        let latest = self.aggregator.series().latest();
        // History newer than every live candle replaces the last live price.
        if self.current_price.is_none() || latest.map(|c| c.open_time) != live_open {
            self.current_price = latest.map(|c| c.ohlcv.close.value());
        }
        log_info!(LogComponent::Application("ChartSession"), "seeded {} candles", kept);
        self.touch();
        kept
    }

    pub fn set_timeframe(&mut self, timeframe: TimeInterval) {
        if timeframe == self.config.timeframe {
            return;
        }
        self.config.timeframe = timeframe;
        self.aggregator.set_timeframe(timeframe);
        self.viewport.reset();
        self.touch();
    }

    /// Returns the count actually applied after clamping.
    pub fn set_max_candles(&mut self, max_candles: usize) -> usize {
        let evicted = self.aggregator.set_max_candles(max_candles);
        self.config.max_candles = self.aggregator.config().max_candles;
        log_debug!(
            LogComponent::Application("ChartSession"),
            "max candles {} (evicted {})",
            self.config.max_candles,
            evicted
        );
        self.touch();
        self.config.max_candles
    }

    pub fn toggle_playing(&mut self) -> bool {
        self.playing = !self.playing;
        self.revision += 1;
        self.playing
    }

    pub fn set_show_volume(&mut self, show: bool) {
        self.config.show_volume = show;
        self.revision += 1;
    }

    pub fn set_show_indicators(&mut self, show: bool) {
        self.config.show_indicators = show;
        self.revision += 1;
    }

    pub fn wheel(&mut self, delta_y: f64) {
        self.viewport.wheel(delta_y);
        self.revision += 1;
    }

    /// Pointer drag by `delta_px` on a surface of `size`.
    pub fn drag(&mut self, delta_px: f64, size: SurfaceSize) {
        let visible = self.viewport.visible_len(self.aggregator.len());
        if visible == 0 {
            return;
        }
        let layout = ChartLayout::new(size, self.config.show_volume);
        self.viewport.drag(delta_px, layout.price_pane.width / visible as f64);
        self.revision += 1;
    }

    pub fn reset_view(&mut self) {
        self.viewport.reset();
        self.viewport.sync_len(self.aggregator.len());
        self.revision += 1;
    }

    pub fn overlays(&self, candles: &[Candle]) -> Vec<IndicatorOverlay> {
        if !self.config.show_indicators {
            return Vec::new();
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.ohlcv.close.value()).collect();
        compute_overlays(&closes, &self.config.indicators)
    }

    fn with_input<R>(&self, size: SurfaceSize, f: impl FnOnce(&RenderPipeline, &FrameInput) -> R) -> R {
        let candles = self.candles();
        let overlays = self.overlays(&candles);
        let input = FrameInput {
            candles: &candles,
            viewport: &self.viewport,
            overlays: &overlays,
            current_price: self.current_price,
            size,
            show_volume: self.config.show_volume,
            timeframe: self.aggregator.timeframe(),
        };
        f(&self.pipeline, &input)
    }

    pub fn frame(&self, size: SurfaceSize) -> Frame {
        self.with_input(size, |pipeline, input| pipeline.build(input))
    }

    pub fn hover(&self, x: f64, y: f64, size: SurfaceSize) -> Option<Tooltip> {
        self.with_input(size, |pipeline, input| pipeline.hit_test(input, x, y))
    }
}

/// A session wired to the shared feed. Dropping it unsubscribes and releases
/// the connection lease.
pub struct ChartMount {
    subscription: Subscription,
    _lease: ConnectionLease,
}

impl ChartMount {
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }
}

pub fn attach(session: Rc<RefCell<ChartSession>>, feed: &FeedConnection) -> ChartMount {
    attach_with(session, feed, || {})
}

/// Like [`attach`], calling `on_update` after each message that changed the
/// session.
pub fn attach_with(
    session: Rc<RefCell<ChartSession>>,
    feed: &FeedConnection,
    on_update: impl Fn() + 'static,
) -> ChartMount {
    let weak = Rc::downgrade(&session);
    let subscription = feed.subscribe(move |message| {
        let Some(session) = weak.upgrade() else {
            return Err(SubscriberError::ChannelClosed);
        };
        let outcome = session
            .try_borrow_mut()
            .map_err(|_| SubscriberError::Failed("chart session is busy".to_string()))?
            .handle_message(message);
        if matches!(outcome, Some(outcome) if outcome != IngestOutcome::Rejected) {
            on_update();
        }
        Ok(())
    });
    ChartMount { subscription, _lease: feed.lease() }
}
