//! Candlestick chart renderer

use image::RgbImage;

use crate::data::{price_range, Candle};
use crate::imaging::{colors, draw_filled_rect, draw_rect_outline, draw_vertical_line, ImageConfig};

/// Candlestick renderer; up bars in the bullish color, down bars in the
/// bearish color, both outlined.
pub struct CandlestickRenderer {
    config: ImageConfig,
    body_ratio: f64,
}

impl CandlestickRenderer {
    /// Create a new candlestick renderer
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_config(ImageConfig::sized(width, height))
    }

    pub fn with_config(config: ImageConfig) -> Self {
        Self {
            config,
            body_ratio: 0.6,
        }
    }

    /// Fraction of each candle slot taken by the body
    pub fn body_ratio(mut self, ratio: f64) -> Self {
        self.body_ratio = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Render candles left to right; incomplete candles leave a gap
    pub fn render(&self, candles: &[Candle]) -> RgbImage {
        let mut img = self.config.canvas();

        let Some((min_price, max_price)) = price_range(candles) else {
            return img;
        };

        let usable = self.config.width.saturating_sub(2 * self.config.margin) as f64;
        let slot = usable / candles.len() as f64;
        let body_width = ((slot * self.body_ratio).floor() as u32).max(1);

        for (i, candle) in candles.iter().enumerate() {
            if !candle.is_complete() {
                continue;
            }

            let center = (self.config.margin as f64 + slot * (i as f64 + 0.5)).floor() as i64;
            let high = self.config.scale_y(candle.high, min_price, max_price);
            let low = self.config.scale_y(candle.low, min_price, max_price);
            draw_vertical_line(&mut img, center, high, low, colors::BLACK);

            let top = self.config.scale_y(candle.body_high(), min_price, max_price);
            let bottom = self.config.scale_y(candle.body_low(), min_price, max_price);
            let left = center - (body_width / 2) as i64;
            let body_height = (bottom - top + 1) as u32;

            let fill = if candle.is_bullish() {
                self.config.bullish_color
            } else {
                self.config.bearish_color
            };
            draw_filled_rect(&mut img, left, top, body_width, body_height, fill);
            if body_width > 2 {
                draw_rect_outline(&mut img, left, top, body_width, body_height, colors::BLACK);
            }
        }

        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candles() -> Vec<Candle> {
        let t = NaiveDate::from_ymd_opt(2021, 1, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        vec![
            Candle::new(t, 10.0, 12.0, 9.0, 11.0),
            Candle::new(t, 11.0, 11.5, 8.0, 8.5),
            Candle::new(t, 8.5, 10.0, 8.0, 9.5),
        ]
    }

    #[test]
    fn test_candlestick_render_size() {
        let renderer = CandlestickRenderer::new(24, 16);
        let img = renderer.render(&candles());

        assert_eq!(img.width(), 24);
        assert_eq!(img.height(), 16);
    }

    #[test]
    fn test_bearish_body_is_grey() {
        let renderer = CandlestickRenderer::with_config(ImageConfig {
            margin: 0,
            ..ImageConfig::sized(30, 30)
        });
        let img = renderer.render(&candles());

        assert!(img.pixels().any(|p| *p == colors::GREY));
        assert!(img.pixels().any(|p| *p == colors::BLACK));
    }

    #[test]
    fn test_empty_input_is_blank() {
        let renderer = CandlestickRenderer::new(8, 8);
        let img = renderer.render(&[]);
        assert!(img.pixels().all(|p| *p == colors::WHITE));
    }
}
