mod common;

use common::candle;
use live_candles_wasm::domain::market_data::{
    AggregatorConfig, BucketAlignment, CandleAggregator, IngestOutcome, MAX_CANDLES, Price,
    TimeInterval, Timestamp, VolumeModel,
};

const T0: u64 = 1_700_000_000_000;

fn aggregator(max_candles: usize) -> CandleAggregator {
    CandleAggregator::new(AggregatorConfig { max_candles, ..AggregatorConfig::default() })
}

fn tick(agg: &mut CandleAggregator, price: f64, at: u64) -> IngestOutcome {
    agg.ingest(Price::from(price), Timestamp::from_millis(at))
}

fn ohlc(agg: &CandleAggregator) -> Vec<(u64, f64, f64, f64, f64)> {
    agg.snapshot()
        .iter()
        .map(|c| {
            (
                c.open_time.value(),
                c.ohlcv.open.value(),
                c.ohlcv.high.value(),
                c.ohlcv.low.value(),
                c.ohlcv.close.value(),
            )
        })
        .collect()
}

#[test]
fn three_ticks_cross_one_bucket_boundary() {
    let mut agg = aggregator(200);
    assert_eq!(tick(&mut agg, 100.0, T0), IngestOutcome::Started);
    assert_eq!(tick(&mut agg, 105.0, T0 + 10_000), IngestOutcome::Updated);
    assert_eq!(tick(&mut agg, 98.0, T0 + 70_000), IngestOutcome::Appended { evicted: 0 });

    assert_eq!(
        ohlc(&agg),
        vec![(T0, 100.0, 105.0, 100.0, 105.0), (T0 + 70_000, 98.0, 98.0, 98.0, 98.0)]
    );
}

#[test]
fn tick_exactly_one_width_later_opens_new_candle() {
    let mut agg = aggregator(200);
    tick(&mut agg, 100.0, T0);
    tick(&mut agg, 101.0, T0 + 59_999);
    assert_eq!(agg.len(), 1);
    tick(&mut agg, 102.0, T0 + 60_000);
    assert_eq!(agg.len(), 2);
}

#[test]
fn oldest_candles_are_evicted_first() {
    let mut agg = aggregator(3);
    for i in 0..3 {
        tick(&mut agg, 100.0 + i as f64, T0 + i * 60_000);
    }
    assert_eq!(tick(&mut agg, 200.0, T0 + 3 * 60_000), IngestOutcome::Appended { evicted: 1 });

    let opens: Vec<u64> = agg.snapshot().iter().map(|c| c.open_time.value()).collect();
    assert_eq!(opens, vec![T0 + 60_000, T0 + 120_000, T0 + 180_000]);
}

#[test]
fn late_tick_is_folded_into_open_candle() {
    let mut agg = aggregator(200);
    tick(&mut agg, 100.0, T0);
    tick(&mut agg, 101.0, T0 + 60_000);
    assert_eq!(tick(&mut agg, 90.0, T0 + 5_000), IngestOutcome::Updated);

    let candles = ohlc(&agg);
    assert_eq!(candles[0], (T0, 100.0, 100.0, 100.0, 100.0), "sealed candle is untouched");
    assert_eq!(candles[1], (T0 + 60_000, 101.0, 101.0, 90.0, 90.0));
}

#[test]
fn unusable_prices_are_rejected() {
    let mut agg = aggregator(200);
    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert_eq!(tick(&mut agg, bad, T0), IngestOutcome::Rejected);
    }
    assert!(agg.is_empty());

    tick(&mut agg, 100.0, T0);
    assert_eq!(tick(&mut agg, f64::NAN, T0 + 1), IngestOutcome::Rejected);
    assert_eq!(ohlc(&agg), vec![(T0, 100.0, 100.0, 100.0, 100.0)]);
}

#[test]
fn zero_volume_model_keeps_volume_at_zero() {
    let mut agg = aggregator(200);
    tick(&mut agg, 100.0, T0);
    tick(&mut agg, 101.0, T0 + 1_000);
    assert_eq!(agg.snapshot()[0].ohlcv.volume.value(), 0.0);
}

#[test]
fn synthetic_volume_stays_in_range() {
    let mut agg = CandleAggregator::new(AggregatorConfig {
        volume_model: VolumeModel::Synthetic { seed: 7 },
        ..AggregatorConfig::default()
    });
    tick(&mut agg, 100.0, T0);
    let opening = agg.snapshot()[0].ohlcv.volume.value();
    assert!((500.0..1500.0).contains(&opening));

    tick(&mut agg, 100.5, T0 + 1_000);
    let grown = agg.snapshot()[0].ohlcv.volume.value() - opening;
    assert!((50.0..150.0).contains(&grown));
}

#[test]
fn grid_alignment_opens_on_bucket_boundaries() {
    let mut agg = CandleAggregator::new(AggregatorConfig {
        timeframe: TimeInterval::FiveMinutes,
        alignment: BucketAlignment::Grid,
        ..AggregatorConfig::default()
    });
    tick(&mut agg, 100.0, 301_000);
    tick(&mut agg, 100.0, 650_000);
    let opens: Vec<u64> = agg.snapshot().iter().map(|c| c.open_time.value()).collect();
    assert_eq!(opens, vec![300_000, 600_000]);
}

#[test]
fn seed_sorts_dedups_and_drops_invalid_history() {
    let mut agg = aggregator(3);
    let kept = agg.seed(vec![
        candle(180_000, 4.0, 5.0, 3.0, 4.5),
        candle(0, 1.0, 2.0, 0.5, 1.5),
        candle(60_000, 2.0, 3.0, 1.0, 2.5),
        candle(60_000, 2.0, 3.5, 1.0, 3.0),
        candle(120_000, 3.0, 1.0, 4.0, 3.0),
        candle(240_000, 5.0, 6.0, 4.0, 5.5),
    ]);

    assert_eq!(kept, 3);
    assert_eq!(
        ohlc(&agg),
        vec![
            (60_000, 2.0, 3.5, 1.0, 3.0),
            (180_000, 4.0, 5.0, 3.0, 4.5),
            (240_000, 5.0, 6.0, 4.0, 5.5),
        ]
    );

    // Live ticks continue from the newest seeded candle.
    tick(&mut agg, 5.8, 250_000);
    assert_eq!(agg.snapshot()[2].ohlcv.high.value(), 6.0);
    assert_eq!(agg.snapshot()[2].ohlcv.close.value(), 5.8);
}

#[test]
fn seed_keeps_live_candles_newer_than_history() {
    let mut agg = aggregator(200);
    tick(&mut agg, 300.0, T0);
    tick(&mut agg, 301.0, T0 + 60_000);

    let kept = agg.seed(vec![
        candle(T0 - 60_000, 1.0, 2.0, 0.5, 1.5),
        candle(T0, 2.0, 3.0, 1.5, 2.5),
    ]);
    assert_eq!(kept, 3);
    assert_eq!(
        ohlc(&agg),
        vec![
            (T0 - 60_000, 1.0, 2.0, 0.5, 1.5),
            (T0, 2.0, 3.0, 1.5, 2.5),
            (T0 + 60_000, 301.0, 301.0, 301.0, 301.0),
        ]
    );
}

#[test]
fn timeframe_switch_clears_series() {
    let mut agg = aggregator(200);
    tick(&mut agg, 100.0, T0);
    agg.set_timeframe(TimeInterval::OneMinute);
    assert_eq!(agg.len(), 1);

    agg.set_timeframe(TimeInterval::OneHour);
    assert!(agg.is_empty());
    assert_eq!(agg.timeframe(), TimeInterval::OneHour);
    tick(&mut agg, 100.0, T0);
    tick(&mut agg, 100.0, T0 + 59 * 60_000);
    assert_eq!(agg.len(), 1);
}

#[test]
fn shrinking_capacity_trims_from_the_front() {
    let mut agg = aggregator(10);
    for i in 0..10 {
        tick(&mut agg, 100.0, T0 + i * 60_000);
    }
    assert_eq!(agg.set_max_candles(4), 6);
    assert_eq!(agg.snapshot()[0].open_time.value(), T0 + 6 * 60_000);

    assert_eq!(agg.set_max_candles(0), 3, "capacity is clamped to at least one");
    assert_eq!(agg.len(), 1);
    agg.set_max_candles(50_000);
    assert_eq!(agg.config().max_candles, MAX_CANDLES);
}

#[test]
fn unknown_timeframe_ids_fall_back_to_one_minute() {
    assert_eq!(TimeInterval::from_id("4h"), TimeInterval::FourHours);
    assert_eq!(TimeInterval::from_id("7m"), TimeInterval::OneMinute);
    assert_eq!(TimeInterval::FifteenMinutes.duration_ms(), 900_000);
}
