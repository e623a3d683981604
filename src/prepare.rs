// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Conversion between decoded images and raw BGR buffers.
//!
//! Any decoded image is first converted to 8-bit RGB by `image`: alpha is
//! dropped without compositing, 16-bit and float channels are scaled down and
//! gray is replicated into all three channels. The channels are then
//! reordered to BGR into rows padded to [`ROW_ALIGNMENT`] bytes.
//!
//! [`ROW_ALIGNMENT`]: crate::buffer::ROW_ALIGNMENT

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

use crate::{
    buffer::{BufferDescriptor, RawImage, BYTES_PER_PIXEL},
    error::Error,
};

/// Converts `image` into an input buffer and allocates a zeroed output buffer
/// with the same geometry. The source image is not modified.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] if the image has no pixels.
///
/// # Example
///
/// ```
/// use edge_strips::prepare::prepare;
/// use image::DynamicImage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let decoded = DynamicImage::new_rgba8(10, 4);
/// let (input, output) = prepare(&decoded)?;
/// assert_eq!(input.descriptor(), output.descriptor());
/// assert_eq!(input.stride(), 32);
/// # Ok(())
/// # }
/// ```
pub fn prepare(image: &DynamicImage) -> Result<(RawImage, RawImage), Error> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(Error::InvalidImage { width, height });
    }

    let input = from_rgb(&image.to_rgb8())?;
    let output = RawImage::zeroed(input.descriptor());
    debug!(source = ?image.color(), buffer = %input, "buffers prepared");
    Ok((input, output))
}

/// Decodes the image at `path` and prepares its buffers.
///
/// # Errors
///
/// Returns [`Error::Image`] if the file cannot be read or decoded and
/// [`Error::InvalidImage`] if it has no pixels.
pub fn load(path: impl AsRef<Path>) -> Result<(RawImage, RawImage), Error> {
    let decoded = image::open(path.as_ref())?;
    debug!(path = %path.as_ref().display(), "image decoded");
    prepare(&decoded)
}

/// Copies an RGB image into a BGR buffer with a padded stride.
pub fn from_rgb(rgb: &RgbImage) -> Result<RawImage, Error> {
    let width = rgb.width() as usize;
    let mut raw = RawImage::new(width, rgb.height() as usize)?;

    for (y, src) in rgb.as_raw().chunks_exact(width * BYTES_PER_PIXEL).enumerate() {
        let dst = raw.row_mut(y);
        for (d, s) in dst
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(src.chunks_exact(BYTES_PER_PIXEL))
        {
            d[0] = s[2];
            d[1] = s[1];
            d[2] = s[0];
        }
    }
    Ok(raw)
}

/// Copies a BGR buffer into an RGB image, dropping the row padding.
///
/// # Errors
///
/// Returns [`Error::InvalidBuffer`] if the buffer is larger than an `image`
/// buffer can address.
pub fn to_rgb(raw: &RawImage) -> Result<RgbImage, Error> {
    let (width, height) = rgb_dimensions(&raw.descriptor())?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let offset = x as usize * BYTES_PER_PIXEL;
        let px = &raw.row(y as usize)[offset..offset + BYTES_PER_PIXEL];
        Rgb([px[2], px[1], px[0]])
    }))
}

fn rgb_dimensions(desc: &BufferDescriptor) -> Result<(u32, u32), Error> {
    match (u32::try_from(desc.width()), u32::try_from(desc.height())) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(Error::InvalidBuffer(format!(
            "{desc} exceeds the dimensions of an RGB image"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_load_missing_file() {
        let err = load("/nonexistent/input.png").unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }

    #[test]
    fn test_zero_area() {
        let err = prepare(&DynamicImage::new_rgb8(0, 5)).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidImage {
                width: 0,
                height: 5
            }
        ));
    }

    #[test]
    fn test_bgr_order_and_padding() {
        let mut rgb = RgbImage::new(5, 2);
        rgb.put_pixel(0, 0, Rgb([1, 2, 3]));
        rgb.put_pixel(4, 1, Rgb([7, 8, 9]));

        let (input, output) = prepare(&DynamicImage::ImageRgb8(rgb.clone())).unwrap();
        assert_eq!(input.width(), 5);
        assert_eq!(input.height(), 2);
        assert_eq!(input.stride(), 16);
        assert_eq!(&input.row(0)[..3], &[3, 2, 1]);
        assert_eq!(&input.row(1)[12..15], &[9, 8, 7]);
        assert!(output.as_bytes().iter().all(|&b| b == 0));

        assert_eq!(to_rgb(&input).unwrap(), rgb);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rgb_dimensions_out_of_range() {
        let wide = 1usize << 32;
        let desc = BufferDescriptor::new(wide, 1, wide * BYTES_PER_PIXEL).unwrap();
        assert!(matches!(rgb_dimensions(&desc), Err(Error::InvalidBuffer(_))));

        let tall = BufferDescriptor::new(1, wide, 4).unwrap();
        assert!(matches!(rgb_dimensions(&tall), Err(Error::InvalidBuffer(_))));

        let desc = BufferDescriptor::new(640, 480, 1920).unwrap();
        assert_eq!(rgb_dimensions(&desc).unwrap(), (640, 480));
    }

    #[test]
    fn test_alpha_dropped() {
        let mut rgba = RgbaImage::new(2, 2);
        rgba.put_pixel(1, 1, Rgba([10, 20, 30, 0]));
        let (input, _) = prepare(&DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(&input.row(1)[3..6], &[30, 20, 10]);
    }

    #[test]
    fn test_gray_replicated() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(3, 3, image::Luma([77])));
        let (input, _) = prepare(&gray).unwrap();
        assert!(input.row(2).iter().all(|&b| b == 77));
    }
}
