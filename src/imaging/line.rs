//! Axis-free scatter + line chart

use image::RgbImage;

use crate::imaging::{draw_filled_rect, draw_line, ImageConfig};

/// Line chart renderer
pub struct LineRenderer {
    config: ImageConfig,
    marker_size: u32,
}

impl LineRenderer {
    /// Create a new line renderer
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_config(ImageConfig::sized(width, height))
    }

    pub fn with_config(config: ImageConfig) -> Self {
        Self {
            config,
            marker_size: 1,
        }
    }

    /// Set marker size in pixels (0 disables markers)
    pub fn marker_size(mut self, size: u32) -> Self {
        self.marker_size = size;
        self
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Render `y` against `x`.
    ///
    /// Points with a non-finite coordinate are left out and break the line.
    pub fn render(&self, x: &[f64], y: &[f64]) -> RgbImage {
        let mut img = self.config.canvas();

        let points: Vec<Option<(f64, f64)>> = x
            .iter()
            .zip(y)
            .map(|(&px, &py)| (px.is_finite() && py.is_finite()).then_some((px, py)))
            .collect();

        let finite: Vec<(f64, f64)> = points.iter().flatten().copied().collect();
        if finite.is_empty() {
            return img;
        }

        let x_min = finite.iter().map(|p| p.0).fold(f64::MAX, f64::min);
        let x_max = finite.iter().map(|p| p.0).fold(f64::MIN, f64::max);
        let y_min = finite.iter().map(|p| p.1).fold(f64::MAX, f64::min);
        let y_max = finite.iter().map(|p| p.1).fold(f64::MIN, f64::max);

        let to_pixel = |(px, py): (f64, f64)| {
            (
                self.config.scale_x(px, x_min, x_max),
                self.config.scale_y(py, y_min, y_max),
            )
        };

        for pair in points.windows(2) {
            if let (Some(a), Some(b)) = (pair[0], pair[1]) {
                draw_line(&mut img, to_pixel(a), to_pixel(b), self.config.foreground);
            }
        }

        if self.marker_size > 0 {
            let half = (self.marker_size / 2) as i64;
            for &point in &finite {
                let (cx, cy) = to_pixel(point);
                draw_filled_rect(
                    &mut img,
                    cx - half,
                    cy - half,
                    self.marker_size,
                    self.marker_size,
                    self.config.foreground,
                );
            }
        }

        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::colors;

    #[test]
    fn test_line_render_size() {
        let renderer = LineRenderer::new(30, 20);
        let img = renderer.render(&[0.0, 1.0, 2.0], &[1.0, 3.0, 2.0]);

        assert_eq!(img.width(), 30);
        assert_eq!(img.height(), 20);
    }

    #[test]
    fn test_line_touches_corners() {
        let renderer = LineRenderer::with_config(ImageConfig {
            margin: 0,
            ..ImageConfig::sized(10, 10)
        });
        let img = renderer.render(&[0.0, 1.0], &[0.0, 1.0]);

        assert_eq!(*img.get_pixel(0, 9), colors::BLUE);
        assert_eq!(*img.get_pixel(9, 0), colors::BLUE);
        assert_eq!(*img.get_pixel(9, 9), colors::WHITE);
    }

    #[test]
    fn test_all_nan_is_blank() {
        let renderer = LineRenderer::new(8, 8);
        let img = renderer.render(&[0.0, 1.0], &[f64::NAN, f64::NAN]);

        assert!(img.pixels().all(|p| *p == colors::WHITE));
    }
}
