//! provides logging helpers

use std::io;

use tracing::Subscriber;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::fmt::format::Format;
use tracing_subscriber::registry::LookupSpan;

/// stderr formatting layer shared by every binary in the workspace
pub fn get_fmt_layer<S>() -> fmt::Layer<S, DefaultFields, Format, fn() -> io::Stderr>
where S: Subscriber + for<'a> LookupSpan<'a>
{
    fmt::layer()
        .with_writer(io::stderr as fn() -> io::Stderr)
        .with_target(true)
}

/// `RUST_LOG` aware filter, falling back to `info` (or `debug` when verbose)
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level(verbose).into())
        .from_env_lossy()
}

fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}
