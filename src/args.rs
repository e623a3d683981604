// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edge_strips::{DispatchOptions, KernelVariant, MIN_BAND_ROWS};
use std::{num::NonZeroUsize, path::PathBuf, thread};

/// Built-in kernel selection.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum KernelSetting {
    /// Full 3x3 convolution per pixel
    Scalar,
    /// Rolling gray rows with expanded Scharr terms
    Unrolled,
}

impl From<KernelSetting> for KernelVariant {
    fn from(setting: KernelSetting) -> Self {
        match setting {
            KernelSetting::Scalar => KernelVariant::Scalar,
            KernelSetting::Unrolled => KernelVariant::Unrolled,
        }
    }
}

/// Command-line arguments for the strip edge detector.
///
/// Arguments can be specified via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edge-strips photo.png --output edges.png --kernel unrolled --degree 8
///
/// # Via environment variables
/// export KERNEL=unrolled
/// export DEGREE=8
/// edge-strips photo.png
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image to process (PNG, JPEG, BMP or PNM)
    #[arg(env = "INPUT")]
    pub input: PathBuf,

    /// Where to write the edge image, format chosen by extension
    #[arg(short, long, env = "OUTPUT", default_value = "edges.png")]
    pub output: PathBuf,

    /// Built-in kernel variant
    #[arg(short, long, env = "KERNEL", default_value = "scalar", value_enum)]
    pub kernel: KernelSetting,

    /// Shared library exporting a kernel, overrides --kernel
    #[arg(long, env = "KERNEL_LIBRARY")]
    pub library: Option<PathBuf>,

    /// Symbol to resolve in --library
    #[arg(long, env = "KERNEL_SYMBOL", default_value = "scharr_operator_scalar")]
    pub symbol: String,

    /// Number of bands processed concurrently, defaults to the available
    /// hardware threads
    #[arg(short, long, env = "DEGREE")]
    pub degree: Option<usize>,

    /// Bands with fewer rows are left unprocessed
    #[arg(long, env = "MIN_BAND_ROWS", default_value_t = MIN_BAND_ROWS)]
    pub min_band_rows: usize,

    /// Print the execution report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    /// Requested degree clamped to `[1, available hardware threads]`.
    pub fn degree(&self) -> usize {
        let available = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        self.degree.unwrap_or(available).clamp(1, available)
    }
}

impl From<&Args> for DispatchOptions {
    fn from(args: &Args) -> Self {
        DispatchOptions {
            degree: args.degree(),
            min_band_rows: args.min_band_rows,
        }
    }
}
