// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # Scharr Operator Kernels
//!
//! Edge-detection kernels operating on packed 24-bit BGR buffers with an
//! arbitrary row stride. Every kernel follows the caller-allocates contract:
//! the caller owns both buffers, the kernel reads `height * stride` bytes of
//! the input and writes only inside `height * stride` bytes of the output.
//!
//! Two interchangeable variants are provided. They produce byte-identical
//! output and differ only in how they walk the neighborhood:
//!
//! - [`scalar`] evaluates the full 3x3 convolution for every pixel.
//! - [`unrolled`] converts each row to gray once and evaluates the separable
//!   Scharr terms from three rolling gray rows.
//!
//! Both are also exported with a C ABI ([`scharr_operator_scalar`] and
//! [`scharr_operator_unrolled`]) so the crate can be built as a shared object
//! and loaded at runtime.
//!
//! Only pixels with a complete 3x3 neighborhood are written: the first and
//! last row and column of the buffer keep whatever the caller stored there.

use libc::c_int;
use std::slice::{from_raw_parts, from_raw_parts_mut};

/// Bytes per packed BGR pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// Exported symbol name of the scalar variant.
pub const SCALAR_SYMBOL: &str = "scharr_operator_scalar";

/// Exported symbol name of the unrolled variant.
pub const UNROLLED_SYMBOL: &str = "scharr_operator_unrolled";

/// C signature shared by every exported kernel:
/// `(input, output, width, height, stride)`.
pub type ScharrFn = unsafe extern "C" fn(*const u8, *mut u8, c_int, c_int, c_int);

const GX: [[i32; 3]; 3] = [[-3, 0, 3], [-10, 0, 10], [-3, 0, 3]];
const GY: [[i32; 3]; 3] = [[-3, -10, -3], [0, 0, 0], [3, 10, 3]];

#[inline]
fn gray(px: &[u8]) -> i32 {
    (px[0] as i32 + px[1] as i32 + px[2] as i32) / 3
}

#[inline]
fn magnitude(sx: i32, sy: i32) -> u8 {
    ((sx * sx + sy * sy) as f64).sqrt().min(255.0) as u8
}

fn check_contract(input: &[u8], output: &[u8], width: usize, height: usize, stride: usize) {
    assert!(
        stride >= width * BYTES_PER_PIXEL,
        "stride {stride} is smaller than {width} BGR pixels"
    );
    let len = height * stride;
    assert!(input.len() >= len, "input holds {} of {len} bytes", input.len());
    assert!(
        output.len() >= len,
        "output holds {} of {len} bytes",
        output.len()
    );
}

/// Applies the Scharr operator by evaluating the full 3x3 neighborhood of
/// every interior pixel.
///
/// # Panics
///
/// Panics if `stride < width * 3` or if either buffer is shorter than
/// `height * stride` bytes.
pub fn scalar(input: &[u8], output: &mut [u8], width: usize, height: usize, stride: usize) {
    check_contract(input, output, width, height, stride);
    if width < 3 || height < 3 {
        return;
    }

    for y in 1..height - 1 {
        let rows = [
            &input[(y - 1) * stride..],
            &input[y * stride..],
            &input[(y + 1) * stride..],
        ];
        let out = &mut output[y * stride..y * stride + width * BYTES_PER_PIXEL];

        for x in 1..width - 1 {
            let mut sx = 0;
            let mut sy = 0;
            for (i, row) in rows.iter().enumerate() {
                for j in 0..3 {
                    let offset = (x + j - 1) * BYTES_PER_PIXEL;
                    let g = gray(&row[offset..offset + BYTES_PER_PIXEL]);
                    sx += g * GX[i][j];
                    sy += g * GY[i][j];
                }
            }
            let offset = x * BYTES_PER_PIXEL;
            out[offset..offset + BYTES_PER_PIXEL].fill(magnitude(sx, sy));
        }
    }
}

fn fill_gray(gray_row: &mut [i32], row: &[u8]) {
    for (g, px) in gray_row
        .iter_mut()
        .zip(row.chunks_exact(BYTES_PER_PIXEL))
    {
        *g = gray(px);
    }
}

/// Applies the Scharr operator from three rolling gray rows, each input row
/// being converted exactly once.
///
/// Output is byte-identical to [`scalar`].
///
/// # Panics
///
/// Panics if `stride < width * 3` or if either buffer is shorter than
/// `height * stride` bytes.
pub fn unrolled(input: &[u8], output: &mut [u8], width: usize, height: usize, stride: usize) {
    check_contract(input, output, width, height, stride);
    if width < 3 || height < 3 {
        return;
    }

    let row_bytes = width * BYTES_PER_PIXEL;
    let row = |y: usize| &input[y * stride..y * stride + row_bytes];

    let mut prev = vec![0i32; width];
    let mut cur = vec![0i32; width];
    let mut next = vec![0i32; width];
    fill_gray(&mut prev, row(0));
    fill_gray(&mut cur, row(1));

    for y in 1..height - 1 {
        fill_gray(&mut next, row(y + 1));
        let out = &mut output[y * stride..y * stride + row_bytes];

        for x in 1..width - 1 {
            let (l, r) = (x - 1, x + 1);
            let sx = 3 * (prev[r] - prev[l]) + 10 * (cur[r] - cur[l]) + 3 * (next[r] - next[l]);
            let sy = 3 * (next[l] - prev[l]) + 10 * (next[x] - prev[x]) + 3 * (next[r] - prev[r]);
            let offset = x * BYTES_PER_PIXEL;
            out[offset..offset + BYTES_PER_PIXEL].fill(magnitude(sx, sy));
        }

        // prev <- cur <- next; the old prev is overwritten on the next row
        std::mem::swap(&mut prev, &mut cur);
        std::mem::swap(&mut cur, &mut next);
    }
}

/// Rebuilds the caller's buffers from raw C arguments. Returns `None` when the
/// arguments cannot describe a valid buffer pair, in which case the exported
/// kernels do nothing: there is no error channel across the C boundary.
unsafe fn buffers<'a>(
    input: *const u8,
    output: *mut u8,
    width: c_int,
    height: c_int,
    stride: c_int,
) -> Option<(&'a [u8], &'a mut [u8], usize, usize, usize)> {
    if input.is_null() || output.is_null() {
        return None;
    }
    let width = usize::try_from(width).ok()?;
    let height = usize::try_from(height).ok()?;
    let stride = usize::try_from(stride).ok()?;
    if stride < width.checked_mul(BYTES_PER_PIXEL)? {
        return None;
    }
    let len = height.checked_mul(stride)?;
    Some((
        from_raw_parts(input, len),
        from_raw_parts_mut(output, len),
        width,
        height,
        stride,
    ))
}

/// C entry point of [`scalar`].
///
/// # Safety
///
/// The caller must ensure that:
/// - `input` points to at least `height * stride` readable bytes
/// - `output` points to at least `height * stride` writable bytes
/// - the two regions do not overlap and nothing else writes to them for the
///   duration of the call
#[no_mangle]
pub unsafe extern "C" fn scharr_operator_scalar(
    input: *const u8,
    output: *mut u8,
    width: c_int,
    height: c_int,
    stride: c_int,
) {
    if let Some((src, dst, width, height, stride)) = buffers(input, output, width, height, stride)
    {
        scalar(src, dst, width, height, stride);
    }
}

/// C entry point of [`unrolled`].
///
/// # Safety
///
/// Same requirements as [`scharr_operator_scalar`].
#[no_mangle]
pub unsafe extern "C" fn scharr_operator_unrolled(
    input: *const u8,
    output: *mut u8,
    width: c_int,
    height: c_int,
    stride: c_int,
) {
    if let Some((src, dst, width, height, stride)) = buffers(input, output, width, height, stride)
    {
        unrolled(src, dst, width, height, stride);
    }
}
