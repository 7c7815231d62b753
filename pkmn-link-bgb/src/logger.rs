//! Tracing subscriber that writes to stderr or a file.

use std::fs::File;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::parse_args::Verbosity;

/// Target of the per-byte link trace
pub const LINK_BYTES_TARGET: &str = "link_bytes";

/// Filter directives for a verbosity level
pub fn filter_directives(verbosity: Verbosity) -> String {
    match verbosity {
        Verbosity::Quiet => "info".to_string(),
        Verbosity::Verbose => "debug".to_string(),
        Verbosity::Trace => format!("trace,{}=off", LINK_BYTES_TARGET),
        Verbosity::TraceLink => "trace".to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init(verbosity: Verbosity, log_file: Option<&str>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbosity)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.without_time().with_writer(io::stderr).try_init(),
    };
    result.map_err(io::Error::other)
}
