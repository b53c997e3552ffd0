//! Gutter detection for two-column journal pages.
//!
//! The page is downscaled, inverted so ink is bright, binarized with a local
//! mean threshold and then filtered with a tall one-pixel-wide opening so only
//! long vertical strokes remain. The gutter is the mean column of what is left
//! once both edge bands are discarded, mapped back to full resolution.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::OcrError;

/// Column separating the left and right halves of a page.
///
/// Always strictly inside the image it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GutterColumn(u32);

impl GutterColumn {
    /// Validate `column` against an image `width`.
    pub fn new(column: u32, width: u32) -> Result<Self, OcrError> {
        if column == 0 || column >= width {
            return Err(OcrError::DegenerateGutter { column, width });
        }
        Ok(Self(column))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for GutterColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tuning for the gutter detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GutterConfig {
    /// Downscale factor applied before analysis
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Side of the square neighbourhood used for the local mean (odd)
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    /// Subtracted from the local mean; negative values demand brighter ink
    #[serde(default = "default_threshold_offset")]
    pub threshold_offset: i32,
    /// Vertical kernel height is the scaled image height divided by this
    #[serde(default = "default_kernel_divisor")]
    pub kernel_divisor: u32,
    /// Columns ignored at each side, in scaled pixels
    #[serde(default = "default_edge_margin")]
    pub edge_margin: u32,
}

fn default_scale() -> f32 {
    0.5
}

fn default_block_size() -> u32 {
    15
}

fn default_threshold_offset() -> i32 {
    -2
}

fn default_kernel_divisor() -> u32 {
    15
}

fn default_edge_margin() -> u32 {
    200
}

impl Default for GutterConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            block_size: default_block_size(),
            threshold_offset: default_threshold_offset(),
            kernel_divisor: default_kernel_divisor(),
            edge_margin: default_edge_margin(),
        }
    }
}

impl GutterConfig {
    pub fn validate(&self) -> Result<(), OcrError> {
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > 1.0 {
            return Err(OcrError::InvalidConfig(format!(
                "gutter scale must be in (0, 1], got {}",
                self.scale
            )));
        }
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(OcrError::InvalidConfig(format!(
                "gutter block_size must be odd and at least 3, got {}",
                self.block_size
            )));
        }
        if self.kernel_divisor == 0 {
            return Err(OcrError::InvalidConfig(
                "gutter kernel_divisor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the gutter of a two-column page.
pub fn detect_gutter(image: &DynamicImage, config: &GutterConfig) -> Result<GutterColumn, OcrError> {
    config.validate()?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::NoGutter("image has no pixels".to_string()));
    }

    let scaled_width = scale_dimension(width, config.scale);
    let scaled_height = scale_dimension(height, config.scale);
    let mut gray = if (scaled_width, scaled_height) == (width, height) {
        image.to_luma8()
    } else {
        image
            .resize_exact(scaled_width, scaled_height, FilterType::Triangle)
            .to_luma8()
    };
    image::imageops::invert(&mut gray);

    let mask = Mask::adaptive_threshold(&gray, config.block_size, config.threshold_offset);
    let kernel = (scaled_height / config.kernel_divisor).max(1) as usize;
    let mask = mask.erode_vertical(kernel).dilate_vertical(kernel);

    let mean = mask
        .mean_column(config.edge_margin as usize)
        .ok_or_else(|| {
            OcrError::NoGutter(format!(
                "no vertical strokes outside the {} px edge bands of a {}x{} page",
                config.edge_margin, scaled_width, scaled_height
            ))
        })?;

    let column = (mean * width as f64 / scaled_width as f64).round() as u32;
    debug!(
        "Gutter at scaled column {:.1}, full column {} of {}",
        mean, column, width
    );
    GutterColumn::new(column, width)
}

fn scale_dimension(value: u32, scale: f32) -> u32 {
    ((value as f64 * scale as f64).round() as u32).max(1)
}

/// Binary foreground mask, row-major.
struct Mask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Mask {
    /// Foreground where a pixel exceeds its neighbourhood mean minus `offset`.
    ///
    /// The neighbourhood is clipped at the image borders.
    fn adaptive_threshold(src: &GrayImage, block_size: u32, offset: i32) -> Self {
        let width = src.width() as usize;
        let height = src.height() as usize;
        let radius = (block_size / 2) as usize;
        let stride = width + 1;

        // Summed-area table with a zero first row and column.
        let mut table = vec![0i64; stride * (height + 1)];
        for (y, row) in src.rows().enumerate() {
            let mut running = 0i64;
            for (x, pixel) in row.enumerate() {
                running += pixel.0[0] as i64;
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + running;
            }
        }

        let raw = src.as_raw();
        let mut bits = vec![false; width * height];
        for y in 0..height {
            let y0 = y.saturating_sub(radius);
            let y1 = (y + radius + 1).min(height);
            for x in 0..width {
                let x0 = x.saturating_sub(radius);
                let x1 = (x + radius + 1).min(width);
                let sum = table[y1 * stride + x1] - table[y0 * stride + x1]
                    - table[y1 * stride + x0]
                    + table[y0 * stride + x0];
                let count = ((y1 - y0) * (x1 - x0)) as i64;
                let value = raw[y * width + x] as i64;
                bits[y * width + x] = value * count > sum - offset as i64 * count;
            }
        }

        Self {
            width,
            height,
            bits,
        }
    }

    fn erode_vertical(&self, kernel: usize) -> Self {
        self.vertical_filter(kernel, |count, span| count == span)
    }

    fn dilate_vertical(&self, kernel: usize) -> Self {
        self.vertical_filter(kernel, |count, _| count > 0)
    }

    /// Apply a `1 x kernel` rectangular structuring element anchored at its centre.
    ///
    /// Out-of-image rows are ignored. `keep` receives the foreground count and
    /// the number of in-image rows under the kernel.
    fn vertical_filter(&self, kernel: usize, keep: impl Fn(usize, usize) -> bool) -> Self {
        let anchor = kernel / 2;
        let mut bits = vec![false; self.bits.len()];
        let mut prefix = vec![0usize; self.height + 1];

        for x in 0..self.width {
            for y in 0..self.height {
                prefix[y + 1] = prefix[y] + usize::from(self.bits[y * self.width + x]);
            }
            for y in 0..self.height {
                let start = y.saturating_sub(anchor);
                let end = (y + kernel - anchor).min(self.height);
                let count = prefix[end] - prefix[start];
                bits[y * self.width + x] = keep(count, end - start);
            }
        }

        Self {
            width: self.width,
            height: self.height,
            bits,
        }
    }

    /// Mean column index of foreground pixels outside both edge bands.
    fn mean_column(&self, margin: usize) -> Option<f64> {
        let first = margin;
        let last = self.width.saturating_sub(margin);
        if first >= last {
            return None;
        }

        let mut total = 0u64;
        let mut count = 0u64;
        for row in self.bits.chunks_exact(self.width) {
            for (x, _) in row[first..last].iter().enumerate().filter(|(_, &on)| on) {
                total += (first + x) as u64;
                count += 1;
            }
        }

        if count == 0 {
            None
        } else {
            Some(total as f64 / count as f64)
        }
    }
}
