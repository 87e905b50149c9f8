//! Infrastructure layer: the feed socket, candle history over HTTP, rendering
//! and browser services.

pub mod http;
pub mod rendering;
#[cfg(target_arch = "wasm32")]
pub mod services;
pub mod websocket;
