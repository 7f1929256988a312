//! Source-to-destination window mapping and band selection.

use crate::extents::GeospatialExtents;
use crate::raster::{BandInfo, ColorInterpretation, RasterDataset, RasterWindow};

/// Where an overlap lands in the source raster and in the destination
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowMapping {
    /// Source pixels, `(0, 0)` at the top-left corner.
    pub source: RasterWindow,
    pub dest_x: u32,
    /// First destination row counted from the southern edge.
    pub dest_y: u32,
    pub dest_width: u32,
    pub dest_height: u32,
}

impl WindowMapping {
    /// First destination row counted from the northern edge.
    pub fn dest_top_row(&self, dest_rows: u32) -> u32 {
        dest_rows - (self.dest_y + self.dest_height)
    }
}

/// Map `overlap` into pixel windows by linear ratio.
///
/// Offsets are rounded outwards so partially covered pixels are included.
/// Returns `None` when either window is empty.
pub(crate) fn map_window(
    source_extents: &GeospatialExtents,
    source_size: (u32, u32),
    dest_extents: &GeospatialExtents,
    dest_size: (u32, u32),
    overlap: &GeospatialExtents,
) -> Option<WindowMapping> {
    let (sx, sw) = axis_window(source_extents.x_min, source_extents.width(), source_size.0, overlap.x_min, overlap.x_max)?;
    let (sy, sh) = axis_window(source_extents.y_min, source_extents.height(), source_size.1, overlap.y_min, overlap.y_max)?;
    let (dx, dw) = axis_window(dest_extents.x_min, dest_extents.width(), dest_size.0, overlap.x_min, overlap.x_max)?;
    let (dy, dh) = axis_window(dest_extents.y_min, dest_extents.height(), dest_size.1, overlap.y_min, overlap.y_max)?;

    Some(WindowMapping {
        // Raster rows run north to south.
        source: RasterWindow::new(sx, source_size.1 - (sy + sh), sw, sh),
        dest_x: dx,
        dest_y: dy,
        dest_width: dw,
        dest_height: dh,
    })
}

fn axis_window(origin: f64, extent: f64, count: u32, lo: f64, hi: f64) -> Option<(u32, u32)> {
    if !(extent > 0.0) || count == 0 {
        return None;
    }
    let n = count as f64;
    let start = (n * (lo - origin) / extent).floor().max(0.0);
    let end = (n * (hi - origin) / extent).ceil().min(n);
    if end <= start {
        return None;
    }
    Some((start as u32, (end - start) as u32))
}

/// Bands feeding an RGB(A) tile image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImageBands {
    pub rgb: [usize; 3],
    pub alpha: Option<usize>,
}

impl ImageBands {
    /// Pick bands by colour interpretation.
    ///
    /// Red, green and blue bands are used when all three exist, together
    /// with an alpha band if present. Otherwise a single band (gray first)
    /// is replicated into all three channels.
    pub fn select(dataset: &dyn RasterDataset) -> Option<Self> {
        let mut gray = None;
        let mut red = None;
        let mut green = None;
        let mut blue = None;
        let mut alpha = None;

        for band in 0..dataset.band_count() {
            match dataset.band_info(band).color {
                ColorInterpretation::Red => red = Some(band),
                ColorInterpretation::Green => green = Some(band),
                ColorInterpretation::Blue => blue = Some(band),
                ColorInterpretation::Alpha => alpha = Some(band),
                ColorInterpretation::Gray | ColorInterpretation::Undefined => gray = Some(band),
            }
        }

        if let (Some(r), Some(g), Some(b)) = (red, green, blue) {
            return Some(Self { rgb: [r, g, b], alpha });
        }

        let single = gray.or(alpha).or(red).or(green).or(blue)?;
        Some(Self {
            rgb: [single; 3],
            alpha: None,
        })
    }

    /// Bands in read order: red, green, blue, then alpha.
    pub fn bands(&self) -> impl Iterator<Item = usize> + '_ {
        self.rgb.iter().copied().chain(self.alpha)
    }
}

/// Band holding elevations: the gray band if any, else the first band.
pub(crate) fn height_band(dataset: &dyn RasterDataset) -> Option<usize> {
    let count = dataset.band_count();
    if count == 0 {
        return None;
    }
    (0..count)
        .find(|&b| {
            matches!(
                dataset.band_info(b).color,
                ColorInterpretation::Gray | ColorInterpretation::Undefined
            )
        })
        .or(Some(0))
}

/// Resample a `src_w x src_h` block to `dst_w x dst_h` bilinearly.
///
/// Output pixel centres are mapped onto the block by ratio. Any output
/// touching a no-data sample becomes no-data itself.
pub(crate) fn resample_bilinear(
    values: &[f32],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    info: &BandInfo,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(dst_w as usize * dst_h as usize);
    let sx = src_w as f64 / dst_w as f64;
    let sy = src_h as f64 / dst_h as f64;
    let no_data = info.no_data.map(|v| v as f32);

    for j in 0..dst_h {
        let v = ((j as f64 + 0.5) * sy - 0.5).clamp(0.0, (src_h - 1) as f64);
        let y0 = v.floor() as u32;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (v - y0 as f64) as f32;

        for i in 0..dst_w {
            let u = ((i as f64 + 0.5) * sx - 0.5).clamp(0.0, (src_w - 1) as f64);
            let x0 = u.floor() as u32;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (u - x0 as f64) as f32;

            let at = |x: u32, y: u32| values[(y * src_w + x) as usize];
            let samples = [at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1)];
            if let Some(nd) = no_data {
                if samples.iter().any(|&s| info.is_no_data(s)) {
                    out.push(nd);
                    continue;
                }
            }
            let top = samples[0] * (1.0 - fx) + samples[1] * fx;
            let bottom = samples[2] * (1.0 - fx) + samples[3] * fx;
            out.push(top * (1.0 - fy) + bottom * fy);
        }
    }
    out
}

/// Bilinear probe at fractional position `(u, v)` of a `w x h` block.
///
/// No-data samples are excluded and the remaining weights renormalised.
/// Returns `None` when every contributing sample is no-data.
pub(crate) fn probe_bilinear(values: &[f32], w: u32, h: u32, u: f64, v: f64, info: &BandInfo) -> Option<f32> {
    let u = u.clamp(0.0, (w - 1) as f64);
    let v = v.clamp(0.0, (h - 1) as f64);
    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = u - x0 as f64;
    let fy = v - y0 as f64;

    let corners = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ];

    let mut sum = 0.0;
    let mut weight = 0.0;
    let mut fallback = None;
    for (x, y, w_xy) in corners {
        let value = values[(y * w + x) as usize];
        if info.is_no_data(value) {
            continue;
        }
        fallback.get_or_insert(value);
        sum += value as f64 * w_xy;
        weight += w_xy;
    }

    if weight > 1e-12 {
        Some((sum / weight) as f32)
    } else {
        fallback
    }
}
