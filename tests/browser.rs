#![cfg(target_arch = "wasm32")]

use live_candles_wasm::domain::chart::{ChartViewport, SurfaceSize};
use live_candles_wasm::domain::market_data::{
    Candle, OHLCV, Price, TimeInterval, Timestamp, Volume,
};
use gloo_timers::future::TimeoutFuture;
use live_candles_wasm::config::FeedConfig;
use live_candles_wasm::domain::errors::TransportError;
use live_candles_wasm::infrastructure::rendering::{CanvasRenderer, FrameInput, RenderPipeline};
use live_candles_wasm::infrastructure::websocket::{ConnectionState, FeedConnection};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlCanvasElement;

wasm_bindgen_test_configure!(run_in_browser);

fn canvas(size: SurfaceSize) -> HtmlCanvasElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let canvas: HtmlCanvasElement = document.create_element("canvas").unwrap().dyn_into().unwrap();
    canvas.set_width(size.width as u32);
    canvas.set_height(size.height as u32);
    canvas
}

fn candles() -> Vec<Candle> {
    (0..30u64)
        .map(|i| {
            let close = 100.0 + (i % 7) as f64;
            Candle::new(
                Timestamp::from_millis(i * 60_000),
                OHLCV::new(
                    Price::from(close - 1.0),
                    Price::from(close + 2.0),
                    Price::from(close - 2.0),
                    Price::from(close),
                    Volume::from(500.0 + i as f64),
                ),
            )
        })
        .collect()
}

#[wasm_bindgen_test]
fn paints_a_full_frame_on_a_canvas() {
    let size = SurfaceSize::default();
    let candles = candles();
    let mut viewport = ChartViewport::new();
    viewport.sync_len(candles.len());
    let frame = RenderPipeline::default().build(&FrameInput {
        candles: &candles,
        viewport: &viewport,
        overlays: &[],
        current_price: Some(103.0),
        size,
        show_volume: true,
        timeframe: TimeInterval::OneMinute,
    });

    let renderer = CanvasRenderer::from_canvas(&canvas(size)).unwrap();
    assert!(renderer.render(&frame).is_ok());
}

#[wasm_bindgen_test]
fn paints_the_waiting_frame() {
    let size = SurfaceSize::new(320.0, 200.0);
    let viewport = ChartViewport::new();
    let frame = RenderPipeline::default().build(&FrameInput {
        candles: &[],
        viewport: &viewport,
        overlays: &[],
        current_price: None,
        size,
        show_volume: false,
        timeframe: TimeInterval::OneMinute,
    });
    let renderer = CanvasRenderer::from_canvas(&canvas(size)).unwrap();
    assert!(renderer.render(&frame).is_ok());
}

fn browser_feed(url: &str) -> FeedConnection {
    FeedConnection::browser(FeedConfig { url: url.to_string(), ..FeedConfig::default() })
}

#[wasm_bindgen_test]
fn malformed_url_fails_to_open_and_schedules_retry() {
    let feed = browser_feed("not a websocket url");
    feed.connect();

    let status = feed.status();
    assert_eq!(status.state, ConnectionState::Reconnecting);
    assert!(matches!(status.last_error, Some(TransportError::Open(_))));
    feed.shutdown();
}

#[wasm_bindgen_test]
async fn refused_socket_reports_abnormal_closure() {
    let feed = browser_feed("ws://127.0.0.1:9/");
    let driver = feed.clone();
    wasm_bindgen_futures::spawn_local(async move { driver.run().await });
    feed.connect();

    TimeoutFuture::new(500).await;
    let status = feed.status();
    assert_ne!(status.state, ConnectionState::Open);
    assert!(status.last_error.is_some());
    feed.shutdown();
}
