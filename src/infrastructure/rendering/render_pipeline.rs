//! Turns a candle series plus view state into draw commands. Pure: the same
//! input always yields the same frame, and every frame is a full repaint.

use std::ops::Range;

use super::draw_commands::{DrawCommand, Frame, Point, TextAlign};
use crate::domain::chart::{
    ChartViewport, Color, CoordinateMapper, PlotArea, PriceScale, SurfaceSize, Theme,
};
use crate::domain::market_data::{Candle, IndicatorOverlay, Price, TimeInterval};
use crate::time_utils::{format_date_time, format_time_label};

/// Gap between the surface edge and the price plot, in pixels.
pub const MARGIN: f64 = 60.0;
const PRICE_GRID_STEPS: usize = 8;
const TIME_GRID_STEPS: usize = 10;
const MAX_TIME_LABELS: usize = 6;
const VOLUME_GAP: f64 = 20.0;
const LABEL_FONT: &str = "11px Arial";
const PRICE_TAG_FONT: &str = "bold 12px Arial";
const MESSAGE_FONT: &str = "14px Arial";
pub const WAITING_MESSAGE: &str = "Waiting for market data...";

/// Pixel regions of the price pane and the optional volume pane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    pub size: SurfaceSize,
    pub price_pane: PlotArea,
    pub volume_pane: Option<PlotArea>,
}

impl ChartLayout {
    /// The price pane takes 70% of the height when volume is shown and the
    /// volume pane 20%, starting just below it.
    pub fn new(size: SurfaceSize, show_volume: bool) -> Self {
        let chart_height = if show_volume { size.height * 0.7 } else { size.height };
        let width = (size.width - MARGIN * 2.0).max(1.0);
        let price_pane = PlotArea {
            left: MARGIN,
            top: MARGIN,
            width,
            height: (chart_height - MARGIN * 2.0).max(1.0),
        };
        let volume_pane = show_volume.then(|| PlotArea {
            left: MARGIN,
            top: chart_height + VOLUME_GAP,
            width,
            height: size.height * 0.2,
        });
        Self { size, price_pane, volume_pane }
    }
}

/// Everything one frame depends on.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// The full series; the viewport picks the window.
    pub candles: &'a [Candle],
    pub viewport: &'a ChartViewport,
    pub overlays: &'a [IndicatorOverlay],
    pub current_price: Option<f64>,
    pub size: SurfaceSize,
    pub show_volume: bool,
    pub timeframe: TimeInterval,
}

/// Candle under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    /// Index into the full series.
    pub index: usize,
    pub candle: Candle,
    pub x: f64,
    pub y: f64,
    pub text: String,
}

struct Window<'a> {
    range: Range<usize>,
    slice: &'a [Candle],
    mapper: CoordinateMapper,
    layout: ChartLayout,
}

impl<'a> Window<'a> {
    fn of(input: &FrameInput<'a>) -> Option<Self> {
        let range = input.viewport.visible_range(input.candles.len());
        let slice = &input.candles[range.clone()];
        let scale = PriceScale::from_candles(slice)?;
        let layout = ChartLayout::new(input.size, input.show_volume);
        let mapper = CoordinateMapper::new(layout.price_pane, scale, slice.len());
        Some(Self { range, slice, mapper, layout })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderPipeline {
    theme: Theme,
}

impl RenderPipeline {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn build(&self, input: &FrameInput) -> Frame {
        let mut frame = Frame::new(input.size);
        self.background(&mut frame, input.size);

        let Some(window) = Window::of(input) else {
            frame.push(DrawCommand::Text {
                text: WAITING_MESSAGE.to_string(),
                at: Point::new(input.size.width / 2.0, input.size.height / 2.0),
                color: self.theme.text,
                font: MESSAGE_FONT,
                align: TextAlign::Center,
            });
            return frame;
        };

        self.grid(&mut frame, &window.layout.price_pane);
        self.overlays(&mut frame, &window, input.overlays);
        self.candles(&mut frame, &window);
        if let Some(pane) = window.layout.volume_pane {
            self.volume(&mut frame, &window, &pane);
        }
        if let Some(price) = input.current_price.filter(|p| p.is_finite()) {
            self.current_price(&mut frame, &window, input.size, price);
        }
        self.axis_labels(&mut frame, &window, input.timeframe);
        frame
    }

    fn background(&self, frame: &mut Frame, size: SurfaceSize) {
        frame.push(DrawCommand::FillRect {
            x: 0.0,
            y: 0.0,
            width: size.width,
            height: size.height,
            color: self.theme.background,
        });
        frame.push(DrawCommand::FillRect {
            x: MARGIN,
            y: MARGIN,
            width: (size.width - MARGIN * 2.0).max(0.0),
            height: (size.height - MARGIN * 2.0).max(0.0),
            color: self.theme.plot_background,
        });
    }

    fn grid(&self, frame: &mut Frame, pane: &PlotArea) {
        let line = |from, to| DrawCommand::Line {
            from,
            to,
            color: self.theme.grid,
            line_width: 1.0,
            dash: None,
        };
        for step in 0..=PRICE_GRID_STEPS {
            let y = pane.top + step as f64 / PRICE_GRID_STEPS as f64 * pane.height;
            frame.push(line(Point::new(pane.left, y), Point::new(pane.right(), y)));
        }
        for step in 0..=TIME_GRID_STEPS {
            let x = pane.left + step as f64 / TIME_GRID_STEPS as f64 * pane.width;
            frame.push(line(Point::new(x, pane.top), Point::new(x, pane.bottom())));
        }
    }

    fn overlays(&self, frame: &mut Frame, window: &Window, overlays: &[IndicatorOverlay]) {
        for overlay in overlays {
            let points: Vec<Point> = window
                .range
                .clone()
                .enumerate()
                .filter_map(|(slot, index)| {
                    let value = overlay.value_at(index)?;
                    Some(Point::new(window.mapper.index_to_x(slot), window.mapper.price_to_y(value)))
                })
                .collect();
            if points.len() >= 2 {
                frame.push(DrawCommand::Polyline {
                    points,
                    color: overlay.spec.color,
                    line_width: 2.0,
                });
            }
        }
    }

    fn candles(&self, frame: &mut Frame, window: &Window) {
        let mapper = &window.mapper;
        let width = mapper.candle_width();
        for (slot, candle) in window.slice.iter().enumerate() {
            let x = mapper.index_to_x(slot);
            let color = self.theme.candle_color(candle.is_bullish());
            let y = |price: Price| mapper.price_to_y(price.value());
            let (open_y, close_y) = (y(candle.ohlcv.open), y(candle.ohlcv.close));

            frame.push(DrawCommand::Line {
                from: Point::new(x, y(candle.ohlcv.high)),
                to: Point::new(x, y(candle.ohlcv.low)),
                color,
                line_width: 1.0,
                dash: None,
            });
            let top = open_y.min(close_y);
            let height = (open_y - close_y).abs().max(1.0);
            frame.push(DrawCommand::FillRect { x: x - width / 2.0, y: top, width, height, color });
            frame.push(DrawCommand::StrokeRect {
                x: x - width / 2.0,
                y: top,
                width,
                height,
                color,
                line_width: 1.0,
            });
        }
    }

    /// Bars scaled to the largest volume in the window.
    fn volume(&self, frame: &mut Frame, window: &Window, pane: &PlotArea) {
        let max_volume =
            window.slice.iter().map(|c| c.ohlcv.volume.value()).fold(0.0_f64, f64::max);
        if max_volume <= 0.0 {
            return;
        }
        let spacing = window.mapper.spacing();
        for (slot, candle) in window.slice.iter().enumerate() {
            let height = candle.ohlcv.volume.value() / max_volume * pane.height;
            let color =
                self.theme.candle_color(candle.is_bullish()).with_alpha(self.theme.volume_alpha);
            frame.push(DrawCommand::FillRect {
                x: pane.left + slot as f64 * spacing,
                y: pane.bottom() - height,
                width: (spacing - 1.0).max(1.0),
                height,
                color,
            });
        }
    }

    fn current_price(&self, frame: &mut Frame, window: &Window, size: SurfaceSize, price: f64) {
        let pane = &window.layout.price_pane;
        let y = window.mapper.price_to_y(price);
        frame.push(DrawCommand::Line {
            from: Point::new(pane.left, y),
            to: Point::new(pane.right(), y),
            color: self.theme.current_price,
            line_width: 2.0,
            dash: Some([5.0, 5.0]),
        });
        frame.push(DrawCommand::Text {
            text: format!("${price:.2}"),
            at: Point::new(size.width - 10.0, y - 5.0),
            color: self.theme.current_price,
            font: PRICE_TAG_FONT,
            align: TextAlign::Right,
        });
    }

    fn axis_labels(&self, frame: &mut Frame, window: &Window, timeframe: TimeInterval) {
        let pane = &window.layout.price_pane;
        let label = |text: String, at: Point, align| DrawCommand::Text {
            text,
            at,
            color: self.theme.text,
            font: LABEL_FONT,
            align,
        };

        // Read prices back from the mapper so labels match the grid lines.
        for step in 0..=PRICE_GRID_STEPS {
            let y = pane.top + step as f64 / PRICE_GRID_STEPS as f64 * pane.height;
            let price = window.mapper.y_to_price(y);
            let at = Point::new(MARGIN - 10.0, y + 4.0);
            frame.push(label(format!("${price:.2}"), at, TextAlign::Right));
        }

        let count = window.slice.len();
        let labels = MAX_TIME_LABELS.min(count);
        let baseline = pane.bottom() + MARGIN - 10.0;
        for step in 0..labels {
            let slot = if labels > 1 { step * (count - 1) / (labels - 1) } else { 0 };
            let open_time = window.slice[slot].open_time.value();
            frame.push(label(
                format_time_label(open_time, timeframe),
                Point::new(window.mapper.index_to_x(slot), baseline),
                TextAlign::Center,
            ));
        }
    }

    /// Candle under `(x, y)`. The slot is resolved inside the window and then
    /// offset into the full series; `None` when `x` is outside the plot.
    pub fn hit_test(&self, input: &FrameInput, x: f64, y: f64) -> Option<Tooltip> {
        let window = Window::of(input)?;
        let slot = window.mapper.x_to_slot(x)?;
        let index = (window.range.start + slot).min(input.candles.len() - 1);
        let candle = input.candles[index].clone();
        Some(Tooltip { index, text: tooltip_text(&candle), candle, x, y })
    }
}

/// Multi-line tooltip body for one candle.
pub fn tooltip_text(candle: &Candle) -> String {
    let ohlcv = &candle.ohlcv;
    format!(
        "{}\nO: {:.2}  H: {:.2}\nL: {:.2}  C: {:.2}\nV: {:.0}  ({:+.2}%)",
        format_date_time(candle.open_time.value()),
        ohlcv.open.value(),
        ohlcv.high.value(),
        ohlcv.low.value(),
        ohlcv.close.value(),
        ohlcv.volume.value(),
        candle.change_percent()
    )
}

/// `(label, color)` per overlay, for the chart legend.
pub fn legend(overlays: &[IndicatorOverlay]) -> Vec<(String, Color)> {
    overlays.iter().map(|overlay| (overlay.spec.label(), overlay.spec.color)).collect()
}
