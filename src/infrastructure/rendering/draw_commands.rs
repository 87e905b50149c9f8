use serde::Serialize;

use crate::domain::chart::{Color, SurfaceSize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_css(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// One drawing primitive, in surface pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    FillRect { x: f64, y: f64, width: f64, height: f64, color: Color },
    StrokeRect { x: f64, y: f64, width: f64, height: f64, color: Color, line_width: f64 },
    Line { from: Point, to: Point, color: Color, line_width: f64, dash: Option<[f64; 2]> },
    Polyline { points: Vec<Point>, color: Color, line_width: f64 },
    Text { text: String, at: Point, color: Color, font: &'static str, align: TextAlign },
}

/// Ordered commands for one full repaint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub size: SurfaceSize,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    pub fn new(size: SurfaceSize) -> Self {
        Self { size, commands: Vec::new() }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every text label in draw order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
