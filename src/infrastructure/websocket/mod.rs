//! Streaming connection to the dashboard backend and its wire format.

#[cfg(target_arch = "wasm32")]
pub mod browser_transport;
pub mod dto;
pub mod feed_connection;
pub mod transport;

#[cfg(target_arch = "wasm32")]
pub use browser_transport::*;
pub use dto::*;
pub use feed_connection::*;
pub use transport::*;
