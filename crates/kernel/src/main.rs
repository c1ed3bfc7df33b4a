// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clerkd` entry point.
//!
//! No flags beyond verbosity: `-v` for debug, `-vv` for trace. Exit code
//! 0 on clean shutdown, non-zero when startup fails.

use clerk_kernel::lifecycle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn verbosity_filter(args: &[String]) -> &'static str {
    if args.iter().any(|a| a == "-vv") {
        "trace"
    } else if args.iter().any(|a| a == "-v") {
        "debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let paths = lifecycle::resolve_paths();

    // Logs go to stderr and a daily-rolling file; stdout is protocol.
    let _ = std::fs::create_dir_all(&paths.log_dir);
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "clerkd.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(&args)));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    if let Err(e) = lifecycle::run(paths).await {
        tracing::error!(error = %e, "startup failed");
        eprintln!("clerkd: {e}");
        std::process::exit(1);
    }
}
