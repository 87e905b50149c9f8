use live_candles_wasm::config::FeedConfig;
use live_candles_wasm::domain::chart::ChartViewport;
use live_candles_wasm::domain::market_data::{
    AggregatorConfig, CandleAggregator, Price, Timestamp, VolumeModel, simple_moving_average,
};
use quickcheck_macros::quickcheck;

fn aggregator(max_candles: usize) -> CandleAggregator {
    CandleAggregator::new(AggregatorConfig {
        max_candles,
        volume_model: VolumeModel::Synthetic { seed: 11 },
        ..AggregatorConfig::default()
    })
}

#[quickcheck]
fn candles_keep_ohlc_ordering(ticks: Vec<(u16, u32)>) -> bool {
    let mut agg = aggregator(50);
    for (price, offset) in ticks {
        agg.ingest(Price::from(price as f64 / 10.0), Timestamp::from_millis(offset as u64));
    }
    agg.snapshot().iter().all(|c| {
        let o = &c.ohlcv;
        o.low.value() <= o.open.value().min(o.close.value())
            && o.high.value() >= o.open.value().max(o.close.value())
            && o.low.value() > 0.0
    })
}

#[quickcheck]
fn series_never_exceeds_capacity(max: u8, ticks: Vec<u32>) -> bool {
    let max = max as usize % 20 + 1;
    let mut agg = aggregator(max);
    ticks.into_iter().all(|at| {
        agg.ingest(Price::from(1.0), Timestamp::from_millis(at as u64 * 1_000));
        agg.len() <= max
    })
}

#[quickcheck]
fn open_times_stay_ascending(ticks: Vec<u32>) -> bool {
    let mut agg = aggregator(100);
    for at in ticks {
        agg.ingest(Price::from(2.0), Timestamp::from_millis(at as u64));
    }
    agg.snapshot().windows(2).all(|pair| pair[0].open_time < pair[1].open_time)
}

#[quickcheck]
fn visible_range_stays_in_bounds(len: u16, zoom: f64, pans: Vec<i8>) -> bool {
    let len = len as usize % 2_000;
    let mut viewport = ChartViewport::new();
    viewport.sync_len(len);
    viewport.set_zoom(zoom);
    for pan in pans {
        viewport.pan(pan as f64);
    }
    let range = viewport.visible_range(len);
    range.end <= len && (len == 0 || !range.is_empty())
}

#[quickcheck]
fn sma_length_matches_window_count(closes: Vec<u8>, period: u8) -> bool {
    let closes: Vec<f64> = closes.into_iter().map(f64::from).collect();
    let period = period as usize % 30;
    let expected = if period == 0 || closes.len() < period { 0 } else { closes.len() - period + 1 };
    simple_moving_average(&closes, period).count() == expected
}

#[quickcheck]
fn backoff_is_monotonic_and_capped(attempt: u8) -> bool {
    let config = FeedConfig::default();
    let attempt = attempt as u32;
    let delay = config.backoff_delay(attempt);
    delay.as_millis() <= config.max_delay_ms as u128 && delay >= config.backoff_delay(attempt.saturating_sub(1))
}
