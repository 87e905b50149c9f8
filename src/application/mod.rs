//! Application layer: wires the feed, the candle aggregator and the render
//! pipeline into one chart session.

pub mod chart_service;

pub use chart_service::*;
