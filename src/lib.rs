//! Live candlestick dashboard: a reconnecting market-data feed, tick-to-candle
//! aggregation and a Canvas chart hosted by Leptos.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod time_utils;

#[cfg(target_arch = "wasm32")]
mod app;

#[cfg(target_arch = "wasm32")]
pub use app::App;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Browser entry point: install logging and the clock, then mount the app.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn initialize() {
    use domain::logging::{LogComponent, init_logger, init_time_provider};
    use infrastructure::services::{BrowserTimeProvider, ConsoleLogger};

    console_error_panic_hook::set_once();
    init_logger(Box::new(ConsoleLogger::new_development()));
    init_time_provider(Box::new(BrowserTimeProvider::new()));
    crate::log_info!(LogComponent::Presentation("Initialize"), "mounting dashboard");

    leptos::mount_to_body(App);
}
