//! Market data aggregate: ticks, candles, the aggregator and indicators.

pub mod aggregator;
pub mod entities;
pub mod indicator_engine;
pub mod value_objects;

pub use aggregator::*;
pub use entities::*;
pub use indicator_engine::*;
pub use value_objects::*;
