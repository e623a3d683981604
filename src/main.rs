// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edge_strips::{
    prepare::{load, to_rgb},
    report::report,
    DispatchOptions, Dispatcher, DynamicKernel, Kernel, KernelVariant,
};
use std::{error::Error, io, time::Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod args;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _tracy = init_tracing(&args);

    if args.tracy && !tracy_enabled(&args) {
        warn!("--tracy ignored, built without the tracy feature");
    }

    run(&args).inspect_err(|e| error!("edge detection failed: {e}"))
}

/// Tracy is only started when requested and compiled in.
fn tracy_enabled(args: &Args) -> bool {
    args.tracy && cfg!(feature = "tracy")
}

/// Installs the fmt subscriber, plus the Tracy layer when enabled. The
/// returned client keeps the profiler alive until `main` exits.
fn init_tracing(args: &Args) -> Option<tracy_client::Client> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));

    let client = tracy_enabled(args).then(tracy_client::Client::start);
    let tracy = client
        .as_ref()
        .map(|_| tracing_tracy::TracyLayer::default());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracy)
        .init();

    client
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let now = Instant::now();
    let (input, mut output) = load(&args.input)?;
    debug!(
        path = %args.input.display(),
        buffer = %input,
        elapsed = ?now.elapsed(),
        "image loaded"
    );

    let kernel: Box<dyn Kernel> = match &args.library {
        // SAFETY: the user names a library built to export the kernel
        // signature, such as the scharr-sys shared object.
        Some(path) => Box::new(unsafe { DynamicKernel::load(path, &args.symbol) }?),
        None => Box::new(KernelVariant::from(args.kernel)),
    };

    let options = DispatchOptions::from(args);
    if let Some(requested) = args.degree {
        if requested != options.degree {
            warn!(requested, degree = options.degree, "degree clamped to hardware threads");
        }
    }

    let dispatcher = Dispatcher::new(options)?;
    let result = dispatcher.run(&input, &mut output, kernel.as_ref())?;

    let summary = report(&result);
    if args.json {
        println!("{}", summary.to_json());
    } else {
        println!("{summary}");
    }

    to_rgb(&output)?.save(&args.output)?;
    info!(path = %args.output.display(), "edge image saved");

    Ok(())
}
