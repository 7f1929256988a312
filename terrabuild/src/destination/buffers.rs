//! Tile pixel and height buffers.

use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Pixel layout of a tile image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelFormat::Rgba)
    }
}

/// 8-bit colour buffer of one imagery layer.
///
/// Storage is always RGBA; for [`PixelFormat::Rgb`] the alpha channel only
/// records coverage during compositing and is dropped on output. Row 0 is
/// the northern edge.
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    format: PixelFormat,
    image: RgbaImage,
}

impl TileImage {
    /// Allocate a zero-filled (black, transparent) image.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// RGBA value at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Overwrite the RGBA value at `(x, y)`.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        self.image.put_pixel(x, y, Rgba(rgba));
    }

    /// RGB value at `(x, y)`.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let [r, g, b, _] = self.pixel(x, y);
        [r, g, b]
    }

    /// Overwrite the colour at `(x, y)`, leaving alpha alone.
    #[inline]
    pub fn set_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let p = self.image.get_pixel_mut(x, y);
        p.0[0] = rgb[0];
        p.0[1] = rgb[1];
        p.0[2] = rgb[2];
    }

    /// Composite `rgba` over the pixel at `(x, y)`.
    ///
    /// Alpha 0 leaves the pixel untouched, alpha 255 replaces it, anything
    /// else blends. The destination alpha becomes the larger of the two.
    pub fn composite(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let alpha = rgba[3];
        if alpha == 0 {
            return;
        }
        let dst = self.image.get_pixel_mut(x, y);
        if alpha == 255 {
            *dst = Rgba(rgba);
            return;
        }

        let a = alpha as u32;
        for c in 0..3 {
            dst.0[c] = ((rgba[c] as u32 * a + dst.0[c] as u32 * (255 - a) + 127) / 255) as u8;
        }
        dst.0[3] = dst.0[3].max(alpha);
    }

    /// Convert to an image in the tile's pixel format.
    pub fn to_dynamic(&self) -> DynamicImage {
        let rgba = DynamicImage::ImageRgba8(self.image.clone());
        match self.format {
            PixelFormat::Rgba => rgba,
            PixelFormat::Rgb => DynamicImage::ImageRgb8(rgba.into_rgb8()),
        }
    }
}

/// Height gradient `(dz/dx, dz/dy)` in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeightDelta {
    pub dz_dx: f32,
    pub dz_dy: f32,
}

impl HeightDelta {
    pub fn new(dz_dx: f32, dz_dy: f32) -> Self {
        Self { dz_dx, dz_dy }
    }

    /// Component-wise mean of several gradients.
    pub fn mean(deltas: &[HeightDelta]) -> Option<HeightDelta> {
        if deltas.is_empty() {
            return None;
        }
        let n = deltas.len() as f32;
        let (sx, sy) = deltas
            .iter()
            .fold((0.0, 0.0), |(sx, sy), d| (sx + d.dz_dx, sy + d.dz_dy));
        Some(HeightDelta::new(sx / n, sy / n))
    }
}

/// Regular grid of heights.
///
/// Vertex `(c, r)` sits at `origin + (c * x_interval, r * y_interval)`; row 0
/// is the southern edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightField {
    num_columns: u32,
    num_rows: u32,
    /// South-west vertex position.
    pub origin: (f64, f64),
    pub x_interval: f64,
    pub y_interval: f64,
    heights: Vec<f32>,
    /// Depth of the boundary skirt hung below the edges.
    pub skirt_height: f32,
}

impl HeightField {
    /// Allocate a zero-filled grid.
    pub fn new(num_columns: u32, num_rows: u32, origin: (f64, f64), x_interval: f64, y_interval: f64) -> Self {
        Self {
            num_columns,
            num_rows,
            origin,
            x_interval,
            y_interval,
            heights: vec![0.0; num_columns as usize * num_rows as usize],
            skirt_height: 0.0,
        }
    }

    pub fn num_columns(&self) -> u32 {
        self.num_columns
    }

    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    #[inline]
    pub fn height(&self, column: u32, row: u32) -> f32 {
        self.heights[row as usize * self.num_columns as usize + column as usize]
    }

    #[inline]
    pub fn set_height(&mut self, column: u32, row: u32, height: f32) {
        self.heights[row as usize * self.num_columns as usize + column as usize] = height;
    }

    /// Fill every vertex with `height`.
    pub fn fill(&mut self, height: f32) {
        self.heights.iter_mut().for_each(|h| *h = height);
    }

    /// Smallest and largest height.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let first = *self.heights.first()?;
        Some(
            self.heights
                .iter()
                .fold((first, first), |(lo, hi), &h| (lo.min(h), hi.max(h))),
        )
    }

    /// World position of vertex `(column, row)`.
    pub fn vertex_position(&self, column: u32, row: u32) -> (f64, f64) {
        (
            self.origin.0 + column as f64 * self.x_interval,
            self.origin.1 + row as f64 * self.y_interval,
        )
    }

    /// Height gradient at a vertex, one-sided on the boundary.
    pub fn gradient(&self, column: u32, row: u32) -> HeightDelta {
        let dz_dx = if self.num_columns < 2 || self.x_interval == 0.0 {
            0.0
        } else {
            let c0 = column.saturating_sub(1);
            let c1 = (column + 1).min(self.num_columns - 1);
            (self.height(c1, row) - self.height(c0, row)) / ((c1 - c0) as f64 * self.x_interval) as f32
        };
        let dz_dy = if self.num_rows < 2 || self.y_interval == 0.0 {
            0.0
        } else {
            let r0 = row.saturating_sub(1);
            let r1 = (row + 1).min(self.num_rows - 1);
            (self.height(column, r1) - self.height(column, r0)) / ((r1 - r0) as f64 * self.y_interval) as f32
        };
        HeightDelta::new(dz_dx, dz_dy)
    }

    /// Replace the grid with a `num_columns x num_rows` grid of one height
    /// covering the same area.
    pub fn collapse(&mut self, num_columns: u32, num_rows: u32, height: f32) {
        let width = self.x_interval * self.num_columns.saturating_sub(1) as f64;
        let depth = self.y_interval * self.num_rows.saturating_sub(1) as f64;
        self.num_columns = num_columns;
        self.num_rows = num_rows;
        self.x_interval = width / num_columns.saturating_sub(1).max(1) as f64;
        self.y_interval = depth / num_rows.saturating_sub(1).max(1) as f64;
        self.heights = vec![height; num_columns as usize * num_rows as usize];
    }
}
