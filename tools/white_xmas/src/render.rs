//! PNG map rendering: classified grids, region outlines, legend strip.
//! No text is drawn; titles live in the output file names and the JSON
//! summary written next to each map.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use snow_core::grid::{GeoTransform, Grid};
use snow_core::projection::MapProjection;
use snow_core::regions::Region;

/// Output pixels per grid cell.
pub const DEFAULT_CELL_PIXELS: u32 = 4;

const NO_DATA: Rgba<u8> = Rgba([255, 255, 255, 0]);
const OUTLINE: Rgba<u8> = Rgba([40, 40, 40, 255]);
const LEGEND_BG: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LEGEND_HEIGHT: u32 = 28;
const SWATCH: u32 = 20;

/// Discrete colours for integer-valued class grids.
#[derive(Debug, Clone, Copy)]
pub struct ClassPalette {
    /// Grid value drawn with `colors[0]`.
    pub first_value: i32,
    pub colors: &'static [[u8; 3]],
}

impl ClassPalette {
    pub fn color(&self, v: f32) -> Rgba<u8> {
        if v.is_nan() {
            return NO_DATA;
        }
        let idx = v.round() as i32 - self.first_value;
        match usize::try_from(idx).ok().and_then(|i| self.colors.get(i)) {
            Some(&[r, g, b]) => Rgba([r, g, b, 255]),
            None => NO_DATA,
        }
    }
}

/// White-Christmas probability classes 1–5: yellow, lightblue, tab:blue,
/// darkslateblue, midnightblue.
pub const PROBABILITY: ClassPalette = ClassPalette {
    first_value: 1,
    colors: &[[255, 255, 0], [173, 216, 230], [31, 119, 180], [72, 61, 139], [25, 25, 112]],
};

/// No snow (dimgray) / snow present (lightblue).
pub const WHITE_DAY: ClassPalette = ClassPalette { first_value: 0, colors: &[[105, 105, 105], [173, 216, 230]] };

/// Class shift −4..=4: red for fewer white Christmases, blue for more.
pub const CLASS_SHIFT: ClassPalette = ClassPalette {
    first_value: -4,
    colors: &[
        [103, 0, 31],
        [178, 24, 43],
        [214, 96, 77],
        [244, 165, 130],
        [247, 247, 247],
        [146, 197, 222],
        [67, 147, 195],
        [33, 102, 172],
        [5, 48, 97],
    ],
};

/// One `cell_pixels`-square block per grid cell.
pub fn render_classes(grid: &Grid, palette: &ClassPalette, cell_pixels: u32) -> RgbaImage {
    let s = cell_pixels.max(1);
    RgbaImage::from_fn(grid.width as u32 * s, grid.height as u32 * s, |x, y| {
        palette.color(grid.get((y / s) as usize, (x / s) as usize))
    })
}

/// Draw every region ring. `projection` takes region coordinates into the
/// coordinate system `transform` is expressed in.
pub fn draw_region_outlines(
    img: &mut RgbaImage,
    transform: &GeoTransform,
    cell_pixels: u32,
    regions: &[Region],
    projection: &dyn MapProjection,
) {
    let s = cell_pixels.max(1) as f64;
    let to_px = |x: f64, y: f64| {
        let (px, py) = projection.project(x, y);
        let (row, col) = transform.pixel_at(px, py);
        ((col * s) as f32, (row * s) as f32)
    };

    for region in regions {
        for ring in region.rings() {
            for line in ring.lines() {
                let a = to_px(line.start.x, line.start.y);
                let b = to_px(line.end.x, line.end.y);
                draw_line_segment_mut(img, a, b, OUTLINE);
            }
        }
    }
}

/// Append a strip of palette swatches below the map.
pub fn with_legend(map: &RgbaImage, palette: &ClassPalette) -> RgbaImage {
    let n = palette.colors.len() as u32;
    let width = map.width().max(n * (SWATCH + 4) + 4);
    let mut out = RgbaImage::from_pixel(width, map.height() + LEGEND_HEIGHT, LEGEND_BG);
    image::imageops::overlay(&mut out, map, 0, 0);

    let top = map.height() as i32 + ((LEGEND_HEIGHT - SWATCH) / 2) as i32;
    for (i, &[r, g, b]) in palette.colors.iter().enumerate() {
        let left = 4 + i as i32 * (SWATCH + 4) as i32;
        let rect = Rect::at(left, top).of_size(SWATCH, SWATCH);
        draw_filled_rect_mut(&mut out, rect, Rgba([r, g, b, 255]));
        draw_hollow_rect_mut(&mut out, rect, OUTLINE);
    }
    out
}

pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    img.save(path).with_context(|| format!("Write failed: {}", path.display()))
}
