// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The kernel boundary.
//!
//! A [`Kernel`] filters one band: it reads the input view and writes the
//! output view, both of which share width, band height and stride. Kernels
//! never allocate or free the buffers they are given and must stay within
//! `height * stride` bytes of each view.
//!
//! Two built-in variants are selected through [`KernelVariant`]. A kernel
//! exported by a shared library with the five-argument C signature can be
//! loaded at runtime with [`DynamicKernel`].

use std::{
    error::Error as StdError,
    ffi::c_int,
    fmt,
    path::{Path, PathBuf},
};

use libloading::Library;
use scharr_sys::ScharrFn;
use tracing::debug;

use crate::{
    buffer::{ImageView, ImageViewMut},
    error::Error,
};

/// Failure reported by a kernel for a single band.
pub type KernelError = Box<dyn StdError + Send + Sync>;

/// Capability implemented by every edge-detection kernel.
///
/// Implementations are shared across the worker pool, hence `Send + Sync`.
/// The dispatcher guarantees `input` and `output` have identical geometry.
/// A panic inside [`Kernel::apply`] is caught by the dispatcher and reported
/// as a failure of the band being processed.
pub trait Kernel: Send + Sync {
    /// Identifier reported alongside timing results.
    fn name(&self) -> &str;

    fn apply(&self, input: &ImageView<'_>, output: &mut ImageViewMut<'_>)
        -> Result<(), KernelError>;
}

/// Built-in Scharr kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum KernelVariant {
    /// Full 3x3 convolution per pixel.
    #[default]
    Scalar,
    /// Rolling gray rows with the separable Scharr terms expanded.
    Unrolled,
}

impl KernelVariant {
    pub const ALL: [KernelVariant; 2] = [KernelVariant::Scalar, KernelVariant::Unrolled];

    pub const fn as_str(&self) -> &'static str {
        match self {
            KernelVariant::Scalar => "scalar",
            KernelVariant::Unrolled => "unrolled",
        }
    }

    /// Name of the matching C symbol exported by `scharr-sys`.
    pub const fn symbol(&self) -> &'static str {
        match self {
            KernelVariant::Scalar => scharr_sys::SCALAR_SYMBOL,
            KernelVariant::Unrolled => scharr_sys::UNROLLED_SYMBOL,
        }
    }
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Kernel for KernelVariant {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn apply(
        &self,
        input: &ImageView<'_>,
        output: &mut ImageViewMut<'_>,
    ) -> Result<(), KernelError> {
        let (width, height, stride) = (input.width(), input.height(), input.stride());
        let filter: fn(&[u8], &mut [u8], usize, usize, usize) = match self {
            KernelVariant::Scalar => scharr_sys::scalar,
            KernelVariant::Unrolled => scharr_sys::unrolled,
        };
        filter(input.as_bytes(), output.as_bytes_mut(), width, height, stride);
        Ok(())
    }
}

/// Kernel resolved from a shared library at runtime.
///
/// The symbol must have the signature
/// `void f(const uint8_t *input, uint8_t *output, int width, int height, int stride)`
/// and honor the caller-allocates contract. The library stays loaded for as
/// long as the kernel exists.
pub struct DynamicKernel {
    name: String,
    path: PathBuf,
    func: ScharrFn,
    _lib: Library,
}

impl DynamicKernel {
    /// Loads `path` and resolves `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KernelLoad`] if the library cannot be opened or does
    /// not export `symbol`.
    ///
    /// # Safety
    ///
    /// Loading a library runs its initialisers, and the resolved symbol is
    /// trusted to have the kernel signature. Only load libraries built for
    /// this purpose, such as the `scharr-sys` shared object.
    pub unsafe fn load(path: impl AsRef<Path>, symbol: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        let load_err = |source: libloading::Error| Error::KernelLoad {
            path: path.to_path_buf(),
            symbol: symbol.to_owned(),
            source,
        };
        let lib = Library::new(path).map_err(load_err)?;
        let func: ScharrFn = *lib.get::<ScharrFn>(symbol.as_bytes()).map_err(load_err)?;
        debug!(path = %path.display(), symbol, "kernel loaded");

        Ok(Self {
            name: symbol.to_owned(),
            path: path.to_path_buf(),
            func,
            _lib: lib,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for DynamicKernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DynamicKernel")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Kernel for DynamicKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &self,
        input: &ImageView<'_>,
        output: &mut ImageViewMut<'_>,
    ) -> Result<(), KernelError> {
        let width = c_int::try_from(input.width())?;
        let height = c_int::try_from(input.height())?;
        let stride = c_int::try_from(input.stride())?;
        // SAFETY: both views span height * stride bytes that this call
        // borrows exclusively (output) or shares read-only (input).
        unsafe {
            (self.func)(
                input.as_bytes().as_ptr(),
                output.as_bytes_mut().as_mut_ptr(),
                width,
                height,
                stride,
            )
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RawImage;

    fn checkerboard(width: usize, height: usize) -> RawImage {
        let mut img = RawImage::new(width, height).unwrap();
        for y in 0..height {
            for (x, px) in img.row_mut(y).chunks_exact_mut(3).enumerate() {
                px.fill(if (x / 2 + y / 2) % 2 == 0 { 200 } else { 20 });
            }
        }
        img
    }

    #[test]
    fn test_variants_identical() {
        let input = checkerboard(31, 17);
        let [scalar, unrolled] = KernelVariant::ALL.map(|variant| {
            let mut out = RawImage::zeroed(input.descriptor());
            variant.apply(&input.view(), &mut out.view_mut()).unwrap();
            out
        });
        assert!(scalar.as_bytes().iter().any(|&b| b != 0));
        assert_eq!(scalar, unrolled);
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(KernelVariant::Scalar.name(), "scalar");
        assert_eq!(KernelVariant::Unrolled.to_string(), "unrolled");
        assert_eq!(KernelVariant::Unrolled.symbol(), "scharr_operator_unrolled");
        assert_eq!(KernelVariant::default(), KernelVariant::Scalar);
    }

    #[test]
    fn test_missing_library() {
        let path = "/nonexistent/libscharr_sys.so";
        let err = unsafe { DynamicKernel::load(path, "scharr_operator_scalar") }.unwrap_err();
        assert!(matches!(err, Error::KernelLoad { .. }));
        assert!(err.to_string().contains("scharr_operator_scalar"));
    }
}
