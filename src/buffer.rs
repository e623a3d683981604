// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Raw BGR buffers and the views handed to kernels.
//!
//! A [`BufferDescriptor`] carries the geometry of a packed 24-bit BGR buffer:
//! width and height in pixels and the row stride in bytes, which may include
//! trailing padding. [`RawImage`] owns such a buffer; [`ImageView`] and
//! [`ImageViewMut`] borrow one, either whole or restricted to a band of rows.
//!
//! Borrowing pins the memory: while a view exists the backing allocation can
//! neither move nor be touched by anyone else, for exactly the lifetime of
//! the dispatch that holds it.

use core::fmt;

use crate::{error::Error, partition::RowRange};

/// Bytes per packed BGR pixel.
pub const BYTES_PER_PIXEL: usize = scharr_sys::BYTES_PER_PIXEL;

/// Row alignment applied by [`padded_stride`].
pub const ROW_ALIGNMENT: usize = 4;

/// Returns the stride of a `width` pixel BGR row padded to a multiple of
/// [`ROW_ALIGNMENT`] bytes, or `None` if it does not fit in `usize`.
pub const fn padded_stride(width: usize) -> Option<usize> {
    match width.checked_mul(BYTES_PER_PIXEL) {
        Some(row_bytes) => row_bytes.div_ceil(ROW_ALIGNMENT).checked_mul(ROW_ALIGNMENT),
        None => None,
    }
}

/// Geometry of a packed BGR buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    width: usize,
    height: usize,
    stride: usize,
}

impl BufferDescriptor {
    /// Creates a validated descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBuffer`] if the width or height is zero or if
    /// `stride < width * 3`.
    pub fn new(width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidBuffer(format!(
                "{width}x{height} buffer has no pixels"
            )));
        }
        let row_bytes = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(|| Error::InvalidBuffer(format!("width {width} overflows")))?;
        if stride < row_bytes {
            return Err(Error::InvalidBuffer(format!(
                "stride {stride} is smaller than {row_bytes} bytes of pixels"
            )));
        }
        if stride.checked_mul(height).is_none() {
            return Err(Error::InvalidBuffer(format!(
                "{height} rows of {stride} bytes overflow"
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
        })
    }

    /// Descriptor with the stride padded by [`padded_stride`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBuffer`] for the same reasons as
    /// [`BufferDescriptor::new`], or if the padded stride overflows.
    pub fn padded(width: usize, height: usize) -> Result<Self, Error> {
        let stride = padded_stride(width)
            .ok_or_else(|| Error::InvalidBuffer(format!("width {width} overflows")))?;
        Self::new(width, height, stride)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub const fn bytes_per_pixel(&self) -> usize {
        BYTES_PER_PIXEL
    }

    /// Bytes of pixel data in a row, excluding padding.
    pub fn row_bytes(&self) -> usize {
        self.width * BYTES_PER_PIXEL
    }

    /// Total size of the buffer, `height * stride`.
    pub fn len(&self) -> usize {
        self.height * self.stride
    }

    /// Always false, a validated descriptor has at least one pixel.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Descriptor of the rows in `range`, sharing width and stride.
    fn band(&self, range: &RowRange) -> Self {
        Self {
            height: range.rows(),
            ..*self
        }
    }

    fn check_len(&self, len: usize) -> Result<(), Error> {
        if len < self.len() {
            return Err(Error::InvalidBuffer(format!(
                "{self} needs {} bytes but only {len} are available",
                self.len()
            )));
        }
        Ok(())
    }

    fn check_band(&self, range: &RowRange) {
        assert!(
            range.start < range.end && range.end <= self.height,
            "band {range} outside of {self}"
        );
    }
}

impl fmt::Display for BufferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} BGR stride:{}",
            self.width, self.height, self.stride
        )
    }
}

/// Owned, zero-initialised BGR buffer.
///
/// # Example
///
/// ```
/// use edge_strips::buffer::RawImage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = RawImage::new(5, 4)?;
/// assert_eq!(img.stride(), 16);
/// assert_eq!(img.as_bytes().len(), 64);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    desc: BufferDescriptor,
    data: Vec<u8>,
}

impl RawImage {
    /// Allocates a zeroed buffer with a padded stride.
    pub fn new(width: usize, height: usize) -> Result<Self, Error> {
        Ok(Self::zeroed(BufferDescriptor::padded(width, height)?))
    }

    /// Allocates a zeroed buffer with the given geometry.
    pub fn zeroed(desc: BufferDescriptor) -> Self {
        Self {
            desc,
            data: vec![0; desc.len()],
        }
    }

    /// Wraps existing bytes, which must hold at least `desc.len()` bytes.
    /// Anything beyond is truncated.
    pub fn from_bytes(desc: BufferDescriptor, mut data: Vec<u8>) -> Result<Self, Error> {
        desc.check_len(data.len())?;
        data.truncate(desc.len());
        Ok(Self { desc, data })
    }

    pub fn descriptor(&self) -> BufferDescriptor {
        self.desc
    }

    pub fn width(&self) -> usize {
        self.desc.width
    }

    pub fn height(&self) -> usize {
        self.desc.height
    }

    pub fn stride(&self) -> usize {
        self.desc.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Pixel bytes of row `y`, excluding padding.
    pub fn row(&self, y: usize) -> &[u8] {
        self.view().row(y)
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.desc.stride;
        &mut self.data[start..start + self.desc.row_bytes()]
    }

    /// Sets every byte, padding included, to zero.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            desc: self.desc,
            data: &self.data,
        }
    }

    pub fn view_mut(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            desc: self.desc,
            data: &mut self.data,
        }
    }
}

impl fmt::Display for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.desc.fmt(f)
    }
}

/// Read-only view of a BGR buffer or of a band of its rows.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    desc: BufferDescriptor,
    data: &'a [u8],
}

impl<'a> ImageView<'a> {
    /// Views caller-owned bytes. Only the first `desc.len()` bytes are
    /// visible through the view.
    pub fn new(desc: BufferDescriptor, data: &'a [u8]) -> Result<Self, Error> {
        desc.check_len(data.len())?;
        Ok(Self {
            desc,
            data: &data[..desc.len()],
        })
    }

    pub fn descriptor(&self) -> BufferDescriptor {
        self.desc
    }

    pub fn width(&self) -> usize {
        self.desc.width
    }

    pub fn height(&self) -> usize {
        self.desc.height
    }

    pub fn stride(&self) -> usize {
        self.desc.stride
    }

    /// All `height * stride` bytes of the view.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.desc.stride;
        &self.data[start..start + self.desc.row_bytes()]
    }

    /// Sub-view of the rows in `range`, its base offset by
    /// `range.start * stride` bytes.
    ///
    /// # Panics
    ///
    /// Panics if the range is empty or extends past the view.
    pub fn band(&self, range: &RowRange) -> ImageView<'a> {
        self.desc.check_band(range);
        let stride = self.desc.stride;
        ImageView {
            desc: self.desc.band(range),
            data: &self.data[range.start * stride..range.end * stride],
        }
    }
}

/// Mutable view of a BGR buffer or of a band of its rows.
#[derive(Debug)]
pub struct ImageViewMut<'a> {
    desc: BufferDescriptor,
    data: &'a mut [u8],
}

impl<'a> ImageViewMut<'a> {
    /// Views caller-owned bytes. Only the first `desc.len()` bytes are
    /// reachable through the view.
    pub fn new(desc: BufferDescriptor, data: &'a mut [u8]) -> Result<Self, Error> {
        desc.check_len(data.len())?;
        Ok(Self {
            desc,
            data: &mut data[..desc.len()],
        })
    }

    pub fn descriptor(&self) -> BufferDescriptor {
        self.desc
    }

    pub fn width(&self) -> usize {
        self.desc.width
    }

    pub fn height(&self) -> usize {
        self.desc.height
    }

    pub fn stride(&self) -> usize {
        self.desc.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        &*self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.desc.stride;
        &mut self.data[start..start + self.desc.row_bytes()]
    }

    /// Shorter-lived view of the same rows.
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            desc: self.desc,
            data: &mut *self.data,
        }
    }

    /// Splits the view into one disjoint mutable view per band. Rows that
    /// belong to no band stay unreachable.
    ///
    /// # Panics
    ///
    /// Panics if a band is empty, extends past the view, or overlaps or
    /// precedes the band before it.
    pub fn into_bands(self, bands: &[RowRange]) -> Vec<ImageViewMut<'a>> {
        let stride = self.desc.stride;
        let mut rest = self.data;
        let mut consumed = 0;
        let mut views = Vec::with_capacity(bands.len());

        for range in bands {
            self.desc.check_band(range);
            assert!(range.start >= consumed, "band {range} overlaps a previous band");
            let skip = (range.start - consumed) * stride;
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(skip);
            let (band, tail) = tail.split_at_mut(range.rows() * stride);
            rest = tail;
            consumed = range.end;
            views.push(ImageViewMut {
                desc: self.desc.band(range),
                data: band,
            });
        }
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_stride() {
        assert_eq!(padded_stride(1), Some(4));
        assert_eq!(padded_stride(4), Some(12));
        assert_eq!(padded_stride(5), Some(16));
        assert_eq!(padded_stride(1920), Some(5760));
    }

    #[test]
    fn test_padded_stride_overflow() {
        assert_eq!(padded_stride(usize::MAX / 2), None);
        // fits as pixel bytes but not once rounded up to the alignment
        assert_eq!(padded_stride(usize::MAX / 3), None);

        assert!(matches!(
            RawImage::new(usize::MAX / 2, 1),
            Err(Error::InvalidBuffer(_))
        ));
        assert!(matches!(
            BufferDescriptor::padded(usize::MAX / 3, 1),
            Err(Error::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(BufferDescriptor::new(0, 4, 12).is_err());
        assert!(BufferDescriptor::new(4, 0, 12).is_err());
        assert!(BufferDescriptor::new(4, 4, 11).is_err());
        assert!(BufferDescriptor::new(usize::MAX, 1, usize::MAX).is_err());

        let desc = BufferDescriptor::new(4, 3, 16).unwrap();
        assert_eq!(desc.row_bytes(), 12);
        assert_eq!(desc.len(), 48);
        assert_eq!(desc.bytes_per_pixel(), 3);
        assert_eq!(desc.to_string(), "4x3 BGR stride:16");
    }

    #[test]
    fn test_short_backing_memory() {
        let desc = BufferDescriptor::new(4, 3, 12).unwrap();
        let data = vec![0u8; 35];
        assert!(matches!(
            ImageView::new(desc, &data),
            Err(Error::InvalidBuffer(_))
        ));
        assert!(RawImage::from_bytes(desc, vec![0; 40]).is_ok());
    }

    #[test]
    fn test_band_offsets() {
        let desc = BufferDescriptor::new(2, 6, 8).unwrap();
        let data: Vec<u8> = (0..48).collect();
        let view = ImageView::new(desc, &data).unwrap();

        let band = view.band(&RowRange::new(1, 2, 5));
        assert_eq!(band.height(), 3);
        assert_eq!(band.stride(), 8);
        assert_eq!(band.as_bytes().len(), 24);
        assert_eq!(band.as_bytes()[0], 16);
        assert_eq!(band.row(1), &[24, 25, 26, 27, 28, 29]);
    }

    #[test]
    fn test_into_bands_disjoint() {
        let mut img = RawImage::new(2, 10).unwrap();
        let bands = [RowRange::new(0, 0, 3), RowRange::new(2, 6, 10)];
        let mut views = img.view_mut().into_bands(&bands);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].height(), 3);
        assert_eq!(views[1].height(), 4);
        views[0].as_bytes_mut().fill(1);
        views[1].as_bytes_mut().fill(2);
        drop(views);

        assert!(img.as_bytes()[..24].iter().all(|&b| b == 1));
        // rows 3..6 belong to no band
        assert!(img.as_bytes()[24..48].iter().all(|&b| b == 0));
        assert!(img.as_bytes()[48..].iter().all(|&b| b == 2));
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn test_into_bands_rejects_overlap() {
        let mut img = RawImage::new(2, 10).unwrap();
        let bands = [RowRange::new(0, 0, 5), RowRange::new(1, 4, 10)];
        img.view_mut().into_bands(&bands);
    }
}
