// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Fork-join dispatch of a kernel over horizontal bands.
//!
//! Every band of a [`Partition`] becomes one task on the worker pool. Tasks
//! read a shared input view and each own a disjoint slice of the output, so
//! they never synchronise with one another; the only blocking point is the
//! join after the last band completes.
//!
//! # Seams
//!
//! Bands do not overlap. The first and last row of a band therefore lack the
//! neighbor row that belongs to the adjacent band and the kernel leaves them
//! unwritten, exactly as it leaves the image border. With a degree above one
//! the rows on either side of every seam differ from a single unpartitioned
//! pass; all other rows are identical. See [`Partition::seam_rows`].

use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    thread,
    time::{Duration, Instant},
};

use enough::{Stop, Unstoppable};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, debug_span, info, info_span, trace, warn, Span};

use crate::{
    buffer::{ImageView, ImageViewMut, RawImage},
    error::Error,
    kernel::Kernel,
    partition::{Partition, RowRange, MIN_BAND_ROWS},
};

/// Outcome of a successful dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchResult {
    /// Wall-clock time from the first band submission to the join.
    pub elapsed: Duration,
    /// Requested parallelism degree.
    pub degree: usize,
    /// Name of the kernel that processed the bands.
    pub variant: String,
    /// Bands handed to the kernel.
    pub bands: usize,
    /// Bands skipped for being thinner than the minimum band height.
    pub skipped: usize,
}

/// Runs `kernel` over every band of `partition`, concurrently on the current
/// rayon pool, and joins.
///
/// The output rows of skipped bands, of the image border and of the seams
/// between bands keep whatever `output` held before the call.
///
/// # Errors
///
/// - [`Error::GeometryMismatch`] if `input` and `output` differ in geometry.
/// - [`Error::InvalidBuffer`] if `partition` was computed for another height.
/// - [`Error::EmptyPartition`] if every band was skipped.
/// - [`Error::KernelInvocationFailed`] for the lowest failing band, reported
///   only after every other band has run to completion. Rows written by the
///   successful bands are kept.
pub fn dispatch(
    input: &ImageView<'_>,
    output: &mut ImageViewMut<'_>,
    partition: &Partition,
    kernel: &dyn Kernel,
) -> Result<DispatchResult, Error> {
    dispatch_with_stop(input, output, partition, kernel, &Unstoppable)
}

/// Same as [`dispatch`], checking `stop` before each band is started.
///
/// Bands already running when `stop` fires complete normally; bands that have
/// not started yet fail with [`Error::Cancelled`].
pub fn dispatch_with_stop(
    input: &ImageView<'_>,
    output: &mut ImageViewMut<'_>,
    partition: &Partition,
    kernel: &dyn Kernel,
    stop: &(dyn Stop + Sync),
) -> Result<DispatchResult, Error> {
    check_geometry(input, output, partition)?;
    if partition.is_empty() {
        return Err(Error::EmptyPartition {
            height: partition.height(),
            degree: partition.degree(),
            min_rows: partition.min_rows(),
        });
    }

    let span = info_span!(
        "dispatch",
        kernel = kernel.name(),
        degree = partition.degree(),
        bands = partition.bands().len(),
    );
    let _guard = span.enter();

    let jobs: Vec<(&RowRange, ImageViewMut<'_>)> = partition
        .bands()
        .iter()
        .zip(output.reborrow().into_bands(partition.bands()))
        .collect();

    let started = Instant::now();
    let outcomes: Vec<Result<(), Error>> = jobs
        .into_par_iter()
        .map(|(band, mut dst)| run_band(&span, band, &input.band(band), &mut dst, kernel, stop))
        .collect();
    let elapsed = started.elapsed();

    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    if let Some(err) = outcomes.into_iter().find_map(Result::err) {
        warn!(failed, elapsed = ?elapsed, "dispatch failed: {err}");
        return Err(err);
    }

    info!(elapsed = ?elapsed, skipped = partition.skipped().len(), "dispatch complete");
    Ok(DispatchResult {
        elapsed,
        degree: partition.degree(),
        variant: kernel.name().to_owned(),
        bands: partition.bands().len(),
        skipped: partition.skipped().len(),
    })
}

fn check_geometry(
    input: &ImageView<'_>,
    output: &ImageViewMut<'_>,
    partition: &Partition,
) -> Result<(), Error> {
    if input.descriptor() != output.descriptor() {
        return Err(Error::GeometryMismatch {
            input: input.descriptor().to_string(),
            output: output.descriptor().to_string(),
        });
    }
    if partition.height() != input.height() {
        return Err(Error::InvalidBuffer(format!(
            "partition of {} rows does not fit {}",
            partition.height(),
            input.descriptor()
        )));
    }
    Ok(())
}

fn run_band(
    parent: &Span,
    band: &RowRange,
    src: &ImageView<'_>,
    dst: &mut ImageViewMut<'_>,
    kernel: &dyn Kernel,
    stop: &(dyn Stop + Sync),
) -> Result<(), Error> {
    let _span = debug_span!(
        parent: parent,
        "band",
        index = band.index,
        start = band.start,
        end = band.end
    )
    .entered();

    if let Err(reason) = stop.check() {
        debug!(?reason, "band cancelled before start");
        return Err(Error::Cancelled {
            band: band.index,
            reason,
        });
    }

    let started = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(|| kernel.apply(src, dst))) {
        Ok(Ok(())) => {
            trace!(elapsed = ?started.elapsed(), "band complete");
            Ok(())
        }
        Ok(Err(cause)) => {
            warn!(%band, "kernel failed: {cause}");
            Err(Error::KernelInvocationFailed {
                band: band.index,
                cause,
            })
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%band, "kernel panicked: {message}");
            Err(Error::KernelInvocationFailed {
                band: band.index,
                cause: message.into(),
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "kernel panicked".to_owned()
    }
}

/// Dispatch settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Number of bands, and of worker threads in a dedicated pool.
    pub degree: usize,
    /// Bands with fewer rows are skipped.
    pub min_band_rows: usize,
}

impl DispatchOptions {
    pub fn with_degree(degree: usize) -> Self {
        Self {
            degree,
            ..Self::default()
        }
    }
}

impl Default for DispatchOptions {
    /// One band per available hardware thread.
    fn default() -> Self {
        Self {
            degree: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            min_band_rows: MIN_BAND_ROWS,
        }
    }
}

/// Partitions images and dispatches kernels on a worker pool.
///
/// # Example
///
/// ```
/// use edge_strips::{DispatchOptions, Dispatcher, KernelVariant, RawImage};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let input = RawImage::new(64, 48)?;
/// let mut output = RawImage::zeroed(input.descriptor());
///
/// let dispatcher = Dispatcher::new(DispatchOptions::with_degree(4))?;
/// let result = dispatcher.run(&input, &mut output, &KernelVariant::Scalar)?;
/// assert_eq!(result.bands, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Dispatcher {
    options: DispatchOptions,
    pool: Option<ThreadPool>,
}

impl Dispatcher {
    /// Creates a dispatcher with a dedicated pool of `options.degree` threads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDegree`] for a degree of zero and
    /// [`Error::ThreadPool`] if the threads cannot be spawned.
    pub fn new(options: DispatchOptions) -> Result<Self, Error> {
        if options.degree == 0 {
            return Err(Error::InvalidDegree(options.degree));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.degree)
            .thread_name(|i| format!("band-worker-{i}"))
            .build()?;
        debug!(threads = options.degree, "worker pool started");
        Ok(Self {
            options,
            pool: Some(pool),
        })
    }

    /// Creates a dispatcher that runs bands on the global rayon pool.
    pub fn with_global_pool(options: DispatchOptions) -> Result<Self, Error> {
        if options.degree == 0 {
            return Err(Error::InvalidDegree(options.degree));
        }
        Ok(Self {
            options,
            pool: None,
        })
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Partitions `height` rows with this dispatcher's options.
    pub fn partition(&self, height: usize) -> Result<Partition, Error> {
        Partition::with_min_rows(height, self.options.degree, self.options.min_band_rows)
    }

    /// Partitions `input` and runs `kernel` over every band into `output`.
    pub fn run(
        &self,
        input: &RawImage,
        output: &mut RawImage,
        kernel: &dyn Kernel,
    ) -> Result<DispatchResult, Error> {
        self.run_with_stop(input, output, kernel, &Unstoppable)
    }

    /// Same as [`Dispatcher::run`], checking `stop` before each band.
    pub fn run_with_stop(
        &self,
        input: &RawImage,
        output: &mut RawImage,
        kernel: &dyn Kernel,
        stop: &(dyn Stop + Sync),
    ) -> Result<DispatchResult, Error> {
        let partition = self.partition(input.height())?;
        let input = input.view();
        let mut output = output.view_mut();
        match &self.pool {
            Some(pool) => {
                pool.install(|| dispatch_with_stop(&input, &mut output, &partition, kernel, stop))
            }
            None => dispatch_with_stop(&input, &mut output, &partition, kernel, stop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::BufferDescriptor, kernel::KernelVariant};

    #[test]
    fn test_empty_partition() {
        let input = RawImage::new(8, 2).unwrap();
        let mut output = RawImage::zeroed(input.descriptor());
        let dispatcher = Dispatcher::new(DispatchOptions::with_degree(5)).unwrap();
        let err = dispatcher
            .run(&input, &mut output, &KernelVariant::Scalar)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::EmptyPartition {
                height: 2,
                degree: 5,
                min_rows: 3
            }
        ));
    }

    #[test]
    fn test_geometry_mismatch() {
        let input = RawImage::new(8, 8).unwrap();
        let mut output = RawImage::zeroed(BufferDescriptor::new(8, 8, 32).unwrap());
        let partition = Partition::new(8, 2).unwrap();
        let err = dispatch(
            &input.view(),
            &mut output.view_mut(),
            &partition,
            &KernelVariant::Scalar,
        )
        .unwrap_err();
        assert!(matches!(err, Error::GeometryMismatch { .. }));
    }

    #[test]
    fn test_partition_height_mismatch() {
        let input = RawImage::new(8, 8).unwrap();
        let mut output = RawImage::zeroed(input.descriptor());
        let partition = Partition::new(9, 2).unwrap();
        let err = dispatch(
            &input.view(),
            &mut output.view_mut(),
            &partition,
            &KernelVariant::Scalar,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidBuffer(_)));
    }

    #[test]
    fn test_zero_degree() {
        assert!(matches!(
            Dispatcher::new(DispatchOptions::with_degree(0)),
            Err(Error::InvalidDegree(0))
        ));
        assert!(Dispatcher::with_global_pool(DispatchOptions::with_degree(0)).is_err());
    }

    #[test]
    fn test_result_fields() {
        let input = RawImage::new(16, 100).unwrap();
        let mut output = RawImage::zeroed(input.descriptor());
        let dispatcher = Dispatcher::with_global_pool(DispatchOptions::with_degree(3)).unwrap();
        let result = dispatcher
            .run(&input, &mut output, &KernelVariant::Unrolled)
            .unwrap();
        assert_eq!(result.degree, 3);
        assert_eq!(result.bands, 3);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.variant, "unrolled");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "kernel panicked");
    }
}
