//! Corner-sampled background estimation and alpha masking.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{SegmentationError, SegmentationResult};

/// Manhattan RGB distance below which a pixel counts as background.
pub const DEFAULT_THRESHOLD: u32 = 40;

/// Mean color of the four corner pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundColorEstimate {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl BackgroundColorEstimate {
    /// Sum of absolute channel differences to `[r, g, b]`.
    pub fn distance(&self, rgb: [u8; 3]) -> f32 {
        (rgb[0] as f32 - self.r).abs()
            + (rgb[1] as f32 - self.g).abs()
            + (rgb[2] as f32 - self.b).abs()
    }
}

/// Estimate the background color from the four corners.
///
/// A 1x1 image samples the same pixel four times.
pub fn estimate_background(img: &RgbaImage) -> SegmentationResult<BackgroundColorEstimate> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(SegmentationError::EmptyImage);
    }

    let corners = [
        (0, 0),
        (width - 1, 0),
        (0, height - 1),
        (width - 1, height - 1),
    ];

    let (mut r, mut g, mut b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in corners {
        let px = img.get_pixel(x, y);
        r += px[0] as f32;
        g += px[1] as f32;
        b += px[2] as f32;
    }

    Ok(BackgroundColorEstimate {
        r: r / 4.0,
        g: g / 4.0,
        b: b / 4.0,
    })
}

/// Clear alpha on every pixel close to the estimated background.
///
/// RGB channels are left as they are. Returns the estimate used and the
/// number of pixels cleared.
pub fn segment(
    img: &mut RgbaImage,
    threshold: u32,
) -> SegmentationResult<(BackgroundColorEstimate, usize)> {
    let background = estimate_background(img)?;
    let threshold = threshold as f32;
    let row_len = img.width() as usize * 4;

    let pixels: &mut [u8] = img;
    let cleared = pixels
        .par_chunks_mut(row_len)
        .map(|row| {
            let mut cleared = 0usize;
            for px in row.chunks_exact_mut(4) {
                if background.distance([px[0], px[1], px[2]]) < threshold {
                    px[3] = 0;
                    cleared += 1;
                }
            }
            cleared
        })
        .sum::<usize>();

    Ok((background, cleared))
}

/// Decode an image, remove its background with [`DEFAULT_THRESHOLD`] and
/// encode the result as PNG.
pub fn remove_background(bytes: &[u8]) -> SegmentationResult<(Vec<u8>, BackgroundColorEstimate)> {
    remove_background_with_threshold(bytes, DEFAULT_THRESHOLD)
}

pub fn remove_background_with_threshold(
    bytes: &[u8],
    threshold: u32,
) -> SegmentationResult<(Vec<u8>, BackgroundColorEstimate)> {
    let mut img = image::load_from_memory(bytes)
        .map_err(SegmentationError::Decode)?
        .to_rgba8();

    let (background, cleared) = segment(&mut img, threshold)?;
    debug!(
        width = img.width(),
        height = img.height(),
        cleared,
        threshold,
        "Background removed"
    );

    Ok((encode_png(img)?, background))
}

pub(crate) fn encode_png(img: RgbaImage) -> SegmentationResult<Vec<u8>> {
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(SegmentationError::Encode)?;
    Ok(png)
}
