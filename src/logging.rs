//! Tracing subscriber setup. Logs go to stderr so stdout stays free for the
//! per-job lines and the summary.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,stream_uploader=debug"
    } else {
        "warn"
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(filter)
        .try_init();

    if let Err(err) = installed {
        eprintln!("logging already initialised: {err}");
    }
}
