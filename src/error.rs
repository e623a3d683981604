// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::path::PathBuf;
use thiserror::Error;

use crate::kernel::KernelError;

/// Errors raised while preparing buffers, partitioning or dispatching.
#[derive(Debug, Error)]
pub enum Error {
    /// The decoded source image has no pixels.
    #[error("invalid image: {width}x{height} has no pixels")]
    InvalidImage { width: u32, height: u32 },

    /// A buffer descriptor or its backing memory violates the raw buffer
    /// contract.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Input and output buffers do not share the same geometry.
    #[error("buffer geometry mismatch: input {input} output {output}")]
    GeometryMismatch { input: String, output: String },

    /// A parallelism degree of zero was requested.
    #[error("invalid parallelism degree {0}, must be at least 1")]
    InvalidDegree(usize),

    /// Every band was below the minimum band height, nothing was dispatched.
    #[error("empty partition: {height} rows split {degree} ways leaves no band of {min_rows} rows")]
    EmptyPartition {
        height: usize,
        degree: usize,
        min_rows: usize,
    },

    /// The kernel faulted while processing a band.
    #[error("kernel invocation failed on band {band}: {cause}")]
    KernelInvocationFailed {
        band: usize,
        #[source]
        cause: KernelError,
    },

    /// The band was not started because the dispatch was cancelled.
    #[error("band {band} cancelled: {reason:?}")]
    Cancelled { band: usize, reason: enough::StopReason },

    /// A dynamically loaded kernel could not be resolved.
    #[error("failed to load kernel {symbol} from {}: {source}", .path.display())]
    KernelLoad {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    /// The worker pool could not be created.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Decoding or encoding an image failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Index of the band that caused the failure, if the error is band
    /// specific.
    pub fn band(&self) -> Option<usize> {
        match self {
            Error::KernelInvocationFailed { band, .. } | Error::Cancelled { band, .. } => {
                Some(*band)
            }
            _ => None,
        }
    }
}
