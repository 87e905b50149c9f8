//! Chart rendering: a pure pipeline producing draw commands, and the Canvas
//! backend that executes them in the browser.

#[cfg(target_arch = "wasm32")]
pub mod canvas_renderer;
pub mod draw_commands;
pub mod render_pipeline;

#[cfg(target_arch = "wasm32")]
pub use canvas_renderer::CanvasRenderer;
pub use draw_commands::*;
pub use render_pipeline::*;
