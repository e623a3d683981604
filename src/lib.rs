// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # Edge Strips
//!
//! Parallel edge detection over a single in-memory raster. The image is split
//! into contiguous horizontal bands and an external Scharr kernel is invoked
//! once per band, all bands running concurrently on a worker pool and joined
//! into one output image.
//!
//! ## Pipeline
//!
//! - [`prepare`](prepare::prepare) converts a decoded image into a packed BGR
//!   input buffer with padded rows and allocates a matching output buffer.
//! - [`Partition`] splits the image height into bands, skipping bands thinner
//!   than the 3-row kernel neighborhood.
//! - [`dispatch()`] runs a [`Kernel`] over every band and joins.
//! - [`report`](report::report) summarises the elapsed time, degree and
//!   kernel.
//!
//! ## Example
//!
//! ```
//! use edge_strips::{prepare::prepare, report::report, DispatchOptions, Dispatcher, KernelVariant};
//! use image::DynamicImage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let decoded = DynamicImage::new_rgb8(320, 240);
//! let (input, mut output) = prepare(&decoded)?;
//!
//! let dispatcher = Dispatcher::new(DispatchOptions::with_degree(4))?;
//! let result = dispatcher.run(&input, &mut output, &KernelVariant::Unrolled)?;
//! println!("{}", report(&result));
//! # Ok(())
//! # }
//! ```
//!
//! ## Seams
//!
//! Bands do not overlap, so the rows on either side of a seam are processed
//! without their neighbor in the adjacent band and differ from a single
//! unpartitioned pass. This is a known property of the partitioning; see
//! [`dispatch`](dispatch::dispatch).

pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod partition;
pub mod prepare;
pub mod report;

pub use crate::buffer::{BufferDescriptor, ImageView, ImageViewMut, RawImage};
pub use crate::dispatch::{dispatch, DispatchOptions, DispatchResult, Dispatcher};
pub use crate::error::Error;
pub use crate::kernel::{DynamicKernel, Kernel, KernelError, KernelVariant};
pub use crate::partition::{partition, Partition, RowRange, MIN_BAND_ROWS};
