//! Chart rendering for sampled windows
//!
//! Small axis-free line and candlestick charts drawn directly into RGB
//! buffers and saved as JPEG.

mod candlestick;
mod line;
mod window;

pub use candlestick::CandlestickRenderer;
pub use line::LineRenderer;
pub use window::{
    RenderFailure, RenderReport, RenderPlan, Window, WindowRenderer, WindowState, Windows,
};

use std::fmt;
use std::str::FromStr;

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Common color definitions
pub mod colors {
    use image::Rgb;

    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    pub const GREY: Rgb<u8> = Rgb([128, 128, 128]);
    pub const BLUE: Rgb<u8> = Rgb([31, 119, 180]);
}

/// Kind of chart written for a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    Line,
    Candle,
}

impl PlotKind {
    /// Suffix used in file names
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotKind::Line => "line",
            PlotKind::Candle => "candle",
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(PlotKind::Line),
            "candle" | "candlestick" => Ok(PlotKind::Candle),
            other => Err(Error::InvalidParameter(format!("unknown plot kind '{}'", other))),
        }
    }
}

/// Image configuration
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    pub background: Rgb<u8>,
    pub foreground: Rgb<u8>,
    pub bullish_color: Rgb<u8>,
    pub bearish_color: Rgb<u8>,
    pub margin: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            background: colors::WHITE,
            foreground: colors::BLUE,
            bullish_color: colors::WHITE,
            bearish_color: colors::GREY,
            margin: 1,
        }
    }
}

impl ImageConfig {
    /// Default colors at the given size
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Blank canvas in the background color
    pub fn canvas(&self) -> RgbImage {
        RgbImage::from_pixel(self.width, self.height, self.background)
    }

    /// Drawable extent along x, excluding margins
    fn span_x(&self) -> f64 {
        self.width.saturating_sub(1 + 2 * self.margin) as f64
    }

    /// Drawable extent along y, excluding margins
    fn span_y(&self) -> f64 {
        self.height.saturating_sub(1 + 2 * self.margin) as f64
    }

    /// Map a value in `[min, max]` to a pixel column
    pub fn scale_x(&self, value: f64, min: f64, max: f64) -> i64 {
        let t = if max > min { (value - min) / (max - min) } else { 0.5 };
        (self.margin as f64 + t * self.span_x()).round() as i64
    }

    /// Map a value in `[min, max]` to a pixel row, larger values higher up
    pub fn scale_y(&self, value: f64, min: f64, max: f64) -> i64 {
        let t = if max > min { (value - min) / (max - min) } else { 0.5 };
        (self.margin as f64 + (1.0 - t) * self.span_y()).round() as i64
    }
}

/// Set a pixel, ignoring coordinates outside the image
pub fn put_pixel_clipped(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < img.width() as i64 && y < img.height() as i64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Helper function to draw a filled rectangle
pub fn draw_filled_rect(img: &mut RgbImage, x: i64, y: i64, width: u32, height: u32, color: Rgb<u8>) {
    for dy in 0..height as i64 {
        for dx in 0..width as i64 {
            put_pixel_clipped(img, x + dx, y + dy, color);
        }
    }
}

/// Helper function to draw a rectangle outline
pub fn draw_rect_outline(img: &mut RgbImage, x: i64, y: i64, width: u32, height: u32, color: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    let right = x + width as i64 - 1;
    let bottom = y + height as i64 - 1;
    draw_horizontal_line(img, y, x, right, color);
    draw_horizontal_line(img, bottom, x, right, color);
    draw_vertical_line(img, x, y, bottom, color);
    draw_vertical_line(img, right, y, bottom, color);
}

/// Helper function to draw a vertical line
pub fn draw_vertical_line(img: &mut RgbImage, x: i64, y1: i64, y2: i64, color: Rgb<u8>) {
    let (start, end) = if y1 < y2 { (y1, y2) } else { (y2, y1) };
    for y in start..=end {
        put_pixel_clipped(img, x, y, color);
    }
}

/// Helper function to draw a horizontal line
pub fn draw_horizontal_line(img: &mut RgbImage, y: i64, x1: i64, x2: i64, color: Rgb<u8>) {
    let (start, end) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
    for x in start..=end {
        put_pixel_clipped(img, x, y, color);
    }
}

/// Bresenham line between two points
pub fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel_clipped(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
