//! Domain layer: market data, chart geometry, errors and the logging façade.

pub mod chart;
pub mod errors;
pub mod logging;
pub mod market_data;
