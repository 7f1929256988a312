//! Affine pixel-to-world transforms.

/// Affine transform mapping raster pixel coordinates to world coordinates.
///
/// Coefficients use the conventional six-term ordering:
///
/// ```text
/// world_x = c[0] + px * c[1] + py * c[2]
/// world_y = c[3] + px * c[4] + py * c[5]
/// ```
///
/// For a north-up raster `c[2]` and `c[4]` are zero and `c[5]` is negative
/// (rows grow southwards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// The identity transform: one world unit per pixel, origin at zero.
    pub fn identity() -> Self {
        Self([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    /// North-up transform with the given top-left origin and pixel sizes.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height])
    }

    /// Map a pixel position to world coordinates.
    #[inline]
    pub fn apply(&self, px: f64, py: f64) -> (f64, f64) {
        let c = &self.0;
        (c[0] + px * c[1] + py * c[2], c[3] + px * c[4] + py * c[5])
    }

    /// Inverse mapping from world coordinates to pixel positions.
    ///
    /// Returns `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<GeoTransform> {
        let c = &self.0;
        let det = c[1] * c[5] - c[2] * c[4];
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = c[5] * inv_det;
        let b = -c[2] * inv_det;
        let d = -c[4] * inv_det;
        let e = c[1] * inv_det;
        Some(GeoTransform([
            -c[0] * a - c[3] * b,
            a,
            b,
            -c[0] * d - c[3] * e,
            d,
            e,
        ]))
    }

    /// Combined pixel spacing of the linear terms.
    ///
    /// `sqrt(c1² + c2² + c4² + c5²)`; used to compare a raster's native
    /// resolution against a required range.
    pub fn resolution(&self) -> f64 {
        let c = &self.0;
        (c[1] * c[1] + c[2] * c[2] + c[4] * c[4] + c[5] * c[5]).sqrt()
    }

    /// Length of one pixel step along the raster's x axis.
    pub fn pixel_size_x(&self) -> f64 {
        (self.0[1] * self.0[1] + self.0[4] * self.0[4]).sqrt()
    }

    /// Length of one pixel step along the raster's y axis.
    pub fn pixel_size_y(&self) -> f64 {
        (self.0[2] * self.0[2] + self.0[5] * self.0[5]).sqrt()
    }

    /// Returns a copy with the linear terms multiplied by `ratio`.
    ///
    /// The origin is unchanged, so the raster keeps its top-left corner and
    /// covers the same area with `1/ratio` as many pixels per axis.
    pub fn scaled(&self, ratio: f64) -> Self {
        let mut c = self.0;
        c[1] *= ratio;
        c[2] *= ratio;
        c[4] *= ratio;
        c[5] *= ratio;
        Self(c)
    }

    /// Returns a copy with the x-axis terms divided by `div_x` and the y-axis
    /// terms divided by `div_y`.
    ///
    /// Used when a configured transform describes the whole raster rather
    /// than a single pixel.
    pub fn divided_per_axis(&self, div_x: f64, div_y: f64) -> Self {
        let mut c = self.0;
        c[1] /= div_x;
        c[4] /= div_x;
        c[2] /= div_y;
        c[5] /= div_y;
        Self(c)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::identity()
    }
}
