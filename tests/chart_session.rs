mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::*;
use live_candles_wasm::application::{ChartSession, attach, attach_with};
use live_candles_wasm::config::ChartConfig;
use live_candles_wasm::domain::chart::SurfaceSize;
use live_candles_wasm::domain::logging::get_time_provider;
use live_candles_wasm::domain::market_data::{
    IngestOutcome, MAX_CANDLES, Price, TimeInterval, Timestamp, VolumeModel,
};
use live_candles_wasm::infrastructure::rendering::WAITING_MESSAGE;
use live_candles_wasm::infrastructure::websocket::{ConnectionState, FeedMessage, PriceUpdate};

const T0: u64 = 1_704_164_580_000;

fn session() -> ChartSession {
    ChartSession::new(ChartConfig { volume_model: VolumeModel::Zero, ..ChartConfig::default() })
}

fn price(value: f64, at: Option<u64>) -> FeedMessage {
    FeedMessage::PriceUpdate(PriceUpdate {
        price: Price::from(value),
        timestamp: at.map(Timestamp::from_millis),
    })
}

#[test]
fn price_updates_build_candles() {
    let mut chart = session();
    assert_eq!(chart.handle_message(&price(100.0, Some(T0))), Some(IngestOutcome::Started));
    chart.handle_message(&price(105.0, Some(T0 + 10_000)));
    chart.handle_message(&price(98.0, Some(T0 + 70_000)));

    let candles = chart.candles();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].ohlcv.high.value(), 105.0);
    assert_eq!(chart.current_price(), Some(98.0));
    assert_eq!(chart.viewport().visible_range(2), 0..2);
}

#[test]
fn other_messages_and_bad_prices_change_nothing() {
    let mut chart = session();
    let balance = FeedMessage::BalanceUpdate(serde_json::json!({"USDT": 1}));
    assert_eq!(chart.handle_message(&balance), None);
    assert_eq!(chart.handle_message(&price(-3.0, Some(T0))), Some(IngestOutcome::Rejected));
    assert_eq!(chart.revision(), 0);
    assert_eq!(chart.current_price(), None);
}

#[test]
fn missing_timestamp_uses_the_clock() {
    let mut chart = session();
    let before = get_time_provider().current_timestamp();
    chart.handle_message(&price(100.0, None));
    let after = get_time_provider().current_timestamp();

    let open_time = chart.candles()[0].open_time.value();
    assert!((before..=after).contains(&open_time));
}

#[test]
fn pause_drops_ticks_until_resumed() {
    let mut chart = session();
    assert!(!chart.toggle_playing());
    assert_eq!(chart.handle_message(&price(100.0, Some(T0))), None);
    assert!(chart.candles().is_empty());

    assert!(chart.toggle_playing());
    chart.handle_message(&price(100.0, Some(T0)));
    assert_eq!(chart.candles().len(), 1);
}

#[test]
fn controls_reconfigure_the_series() {
    let mut chart = session();
    for i in 0..5 {
        chart.handle_message(&price(100.0 + i as f64, Some(T0 + i * 60_000)));
    }

    assert_eq!(chart.set_max_candles(3), 3);
    assert_eq!(chart.candles().len(), 3);
    assert_eq!(chart.set_max_candles(5_000), MAX_CANDLES);

    chart.set_timeframe(TimeInterval::FifteenMinutes);
    assert!(chart.candles().is_empty());
    assert_eq!(chart.timeframe(), TimeInterval::FifteenMinutes);
    assert_eq!(chart.config().timeframe, TimeInterval::FifteenMinutes);
}

#[test]
fn wheel_drag_and_reset_move_the_window() {
    let mut chart = session();
    chart.seed_history(rising_candles(100, 50.0));
    let size = SurfaceSize::default();

    chart.wheel(-1.0);
    chart.wheel(-1.0);
    let zoomed = chart.viewport().visible_range(100);
    assert_eq!(zoomed.end, 100);
    assert!(zoomed.len() < 100);

    chart.drag(200.0, size);
    assert!(chart.viewport().visible_range(100).end < 100);
    assert!(!chart.viewport().follows_latest());

    chart.reset_view();
    assert_eq!(chart.viewport().visible_range(100), 0..100);
}

#[test]
fn seeding_sets_price_and_frames_render() {
    let mut chart = session();
    let size = SurfaceSize::default();
    assert_eq!(chart.frame(size).texts().collect::<Vec<_>>(), vec![WAITING_MESSAGE]);
    assert!(chart.hover(200.0, 200.0, size).is_none());

    assert_eq!(chart.seed_history(rising_candles(30, 50.0)), 30);
    assert_eq!(chart.current_price(), Some(79.0));
    assert!(chart.frame(size).texts().any(|text| text == "$79.00"));
    assert_eq!(chart.hover(61.0, 200.0, size).map(|tip| tip.index), Some(0));
}

#[test]
fn late_history_slots_in_under_live_candles() {
    let mut chart = session();
    for (i, value) in [200.0, 201.0, 202.0].into_iter().enumerate() {
        chart.handle_message(&price(value, Some(T0 + i as u64 * 60_000)));
    }

    let history = vec![
        candle(T0 - 120_000, 190.0, 195.0, 189.0, 194.0),
        candle(T0 - 60_000, 194.0, 199.0, 193.0, 198.0),
    ];
    assert_eq!(chart.seed_history(history), 5);

    let opens: Vec<u64> = chart.candles().iter().map(|c| c.open_time.value()).collect();
    assert_eq!(opens, vec![T0 - 120_000, T0 - 60_000, T0, T0 + 60_000, T0 + 120_000]);
    assert_eq!(chart.current_price(), Some(202.0));
    assert_eq!(chart.viewport().visible_range(5), 0..5);

    chart.handle_message(&price(203.0, Some(T0 + 130_000)));
    assert_eq!(chart.candles()[4].ohlcv.close.value(), 203.0);
}

#[test]
fn newer_history_supersedes_live_candles() {
    let mut chart = session();
    chart.handle_message(&price(200.0, Some(T0)));

    let history = vec![
        candle(T0, 150.0, 155.0, 149.0, 151.0),
        candle(T0 + 60_000, 151.0, 160.0, 150.0, 158.0),
    ];
    assert_eq!(chart.seed_history(history), 2);
    assert_eq!(chart.candles()[0].ohlcv.close.value(), 151.0);
    assert_eq!(chart.current_price(), Some(158.0));
}

#[test]
fn seeding_respects_the_candle_limit() {
    let mut chart = session();
    chart.set_max_candles(3);
    chart.handle_message(&price(200.0, Some(T0)));
    chart.handle_message(&price(201.0, Some(T0 + 60_000)));

    let history = rising_candles(4, 10.0)
        .into_iter()
        .map(|c| candle(T0 - 240_000 + c.open_time.value(), 10.0, 11.0, 9.0, 10.5))
        .collect();
    assert_eq!(chart.seed_history(history), 3);

    let opens: Vec<u64> = chart.candles().iter().map(|c| c.open_time.value()).collect();
    assert_eq!(opens, vec![T0 - 60_000, T0, T0 + 60_000]);
}

#[test]
fn indicator_toggle_controls_overlays() {
    let mut chart = session();
    chart.seed_history(rising_candles(30, 50.0));
    assert_eq!(chart.overlays(&chart.candles()).len(), 3);

    chart.set_show_indicators(false);
    assert!(chart.overlays(&chart.candles()).is_empty());
}

#[test]
fn attached_session_follows_the_feed() {
    let (feed, connector, _timer) = open_connection();
    let chart = Rc::new(RefCell::new(session()));
    let updates = Rc::new(Cell::new(0));
    let counter = updates.clone();
    let mount = attach_with(chart.clone(), &feed, move || counter.set(counter.get() + 1));
    assert!(mount.is_subscribed());
    assert_eq!(feed.lease_count(), 1);

    let events = connector.last_events();
    events.message(price_frame(100.0, T0));
    events.message(price_frame(101.0, T0 + 1_000));
    events.message(r#"{"type":"balance_update","data":{}}"#);
    feed.drain_events();

    assert_eq!(chart.borrow().candles().len(), 1);
    assert_eq!(chart.borrow().current_price(), Some(101.0));
    assert_eq!(updates.get(), 2);

    drop(mount);
    assert_eq!(feed.lease_count(), 0);
    assert_eq!(feed.state(), ConnectionState::Closed);
}

#[test]
fn busy_session_is_isolated_from_the_feed() {
    let (feed, connector, _timer) = open_connection();
    let chart = Rc::new(RefCell::new(session()));
    let _mount = attach(chart.clone(), &feed);

    let guard = chart.borrow_mut();
    connector.last_events().message(price_frame(100.0, T0));
    feed.drain_events();
    drop(guard);

    assert!(chart.borrow().candles().is_empty());
    assert_eq!(feed.state(), ConnectionState::Open);
}

#[test]
fn two_charts_share_one_connection() {
    let (feed, connector, _timer) = connection(feed_config());
    let first = Rc::new(RefCell::new(session()));
    let second = Rc::new(RefCell::new(session()));
    let first_mount = attach(first.clone(), &feed);
    let _second_mount = attach(second.clone(), &feed);
    assert_eq!(connector.count(), 1);

    connector.last_events().opened();
    connector.last_events().message(price_frame(100.0, T0));
    feed.drain_events();
    assert_eq!(first.borrow().candles().len(), 1);
    assert_eq!(second.borrow().candles().len(), 1);

    drop(first_mount);
    assert_eq!(feed.state(), ConnectionState::Open);
    connector.last_events().message(price_frame(100.0, T0 + 60_000));
    feed.drain_events();
    assert_eq!(first.borrow().candles().len(), 1);
    assert_eq!(second.borrow().candles().len(), 2);
}
