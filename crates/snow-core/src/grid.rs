use serde::{Deserialize, Serialize};

use crate::error::{SnowError, SnowResult};

/// Affine placement of a north-up grid in projected metres.
/// `origin_x`/`origin_y` is the outer corner of pixel (0, 0), i.e. the
/// north-west corner of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    /// Pixel width in metres (positive).
    pub pixel_width: f64,
    /// Pixel height in metres (positive; rows grow southwards).
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { origin_x, origin_y, pixel_width, pixel_height }
    }

    /// Identity placement: one metre per pixel, origin at (0, 0).
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Projected coordinates of the centre of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional (row, col) of a projected point. May be negative or beyond
    /// the grid; callers bounds-check.
    pub fn pixel_at(&self, x: f64, y: f64) -> (f64, f64) {
        ((self.origin_y - y) / self.pixel_height, (x - self.origin_x) / self.pixel_width)
    }
}

/// A 2D raster of `f32` samples, row-major, row 0 at the northern edge.
/// Missing data is `NaN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

impl Grid {
    /// Create a new Grid filled with the given value.
    pub fn new(width: usize, height: usize, transform: GeoTransform, fill: f32) -> Self {
        Self { data: vec![fill; width * height], width, height, transform }
    }

    pub fn from_vec(width: usize, height: usize, transform: GeoTransform, data: Vec<f32>) -> SnowResult<Self> {
        if data.len() != width * height {
            return Err(SnowError::ShapeMismatch {
                left_w: width,
                left_h: height,
                right_w: data.len(),
                right_h: 1,
            });
        }
        Ok(Self { data, width, height, transform })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.width == other.width && self.height == other.height
    }

    fn check_shape(&self, other: &Grid) -> SnowResult<()> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(SnowError::ShapeMismatch {
                left_w: self.width,
                left_h: self.height,
                right_w: other.width,
                right_h: other.height,
            })
        }
    }

    /// Apply `f` to every cell, keeping the geo-referencing.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Grid {
        Grid {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
            transform: self.transform,
        }
    }

    /// Combine two same-shaped grids cell by cell.
    pub fn zip_map(&self, other: &Grid, f: impl Fn(f32, f32) -> f32) -> SnowResult<Grid> {
        self.check_shape(other)?;
        Ok(Grid {
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect(),
            width: self.width,
            height: self.height,
            transform: self.transform,
        })
    }

    /// In-place cell-wise addition. `NaN` on either side propagates.
    pub fn add_assign(&mut self, other: &Grid) -> SnowResult<()> {
        self.check_shape(other)?;
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// Number of non-`NaN` cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Mean over non-`NaN` cells; `None` if every cell is missing.
    pub fn valid_mean(&self) -> Option<f64> {
        let (sum, n) = self
            .data
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Projected (min_x, min_y, max_x, max_y) of the outer pixel edges.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let t = &self.transform;
        (
            t.origin_x,
            t.origin_y - self.height as f64 * t.pixel_height,
            t.origin_x + self.width as f64 * t.pixel_width,
            t.origin_y,
        )
    }
}
