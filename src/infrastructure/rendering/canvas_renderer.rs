use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::draw_commands::{DrawCommand, Frame};
use crate::domain::errors::AppError;
use crate::domain::logging::LogComponent;
use crate::log_trace;

/// Executes frames on a Canvas 2D context.
pub struct CanvasRenderer {
    context: CanvasRenderingContext2d,
}

impl CanvasRenderer {
    pub fn from_canvas(canvas: &HtmlCanvasElement) -> Result<Self, AppError> {
        let context = canvas
            .get_context("2d")
            .map_err(|e| AppError::Rendering(format!("getContext failed: {e:?}")))?
            .ok_or_else(|| AppError::Rendering("2d context unavailable".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| AppError::Rendering("not a 2d context".to_string()))?;
        Ok(Self { context })
    }

    pub fn render(&self, frame: &Frame) -> Result<(), AppError> {
        let ctx = &self.context;
        ctx.clear_rect(0.0, 0.0, frame.size.width, frame.size.height);
        for command in &frame.commands {
            self.execute(command)?;
        }
        log_trace!(
            LogComponent::Infrastructure("CanvasRenderer"),
            "painted {} commands",
            frame.len()
        );
        Ok(())
    }

    fn set_line_dash(&self, dash: Option<[f64; 2]>) -> Result<(), AppError> {
        let segments = js_sys::Array::new();
        if let Some([on, off]) = dash {
            segments.push(&JsValue::from_f64(on));
            segments.push(&JsValue::from_f64(off));
        }
        self.context
            .set_line_dash(&segments)
            .map_err(|e| AppError::Rendering(format!("setLineDash failed: {e:?}")))
    }

    fn execute(&self, command: &DrawCommand) -> Result<(), AppError> {
        let ctx = &self.context;
        match command {
            DrawCommand::FillRect { x, y, width, height, color } => {
                ctx.set_fill_style(&JsValue::from(color.to_css()));
                ctx.fill_rect(*x, *y, *width, *height);
            }
            DrawCommand::StrokeRect { x, y, width, height, color, line_width } => {
                ctx.set_stroke_style(&JsValue::from(color.to_css()));
                ctx.set_line_width(*line_width);
                ctx.stroke_rect(*x, *y, *width, *height);
            }
            DrawCommand::Line { from, to, color, line_width, dash } => {
                ctx.set_stroke_style(&JsValue::from(color.to_css()));
                ctx.set_line_width(*line_width);
                self.set_line_dash(*dash)?;
                ctx.begin_path();
                ctx.move_to(from.x, from.y);
                ctx.line_to(to.x, to.y);
                ctx.stroke();
                if dash.is_some() {
                    self.set_line_dash(None)?;
                }
            }
            DrawCommand::Polyline { points, color, line_width } => {
                let Some((first, rest)) = points.split_first() else {
                    return Ok(());
                };
                ctx.set_stroke_style(&JsValue::from(color.to_css()));
                ctx.set_line_width(*line_width);
                ctx.begin_path();
                ctx.move_to(first.x, first.y);
                for point in rest {
                    ctx.line_to(point.x, point.y);
                }
                ctx.stroke();
            }
            DrawCommand::Text { text, at, color, font, align } => {
                ctx.set_fill_style(&JsValue::from(color.to_css()));
                ctx.set_font(font);
                ctx.set_text_align(align.as_css());
                ctx.fill_text(text, at.x, at.y)
                    .map_err(|e| AppError::Rendering(format!("fillText failed: {e:?}")))?;
            }
        }
        Ok(())
    }
}
