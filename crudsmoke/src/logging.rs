use tracing_subscriber::EnvFilter;

use crate::cli::OutputFormat;

/// Installs the stderr subscriber. `RUST_LOG` overrides the default `info` filter.
pub(crate) fn init(format: OutputFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // Stdout carries the report, so JSON mode logs JSON lines to stderr too.
    let _ = match format {
        OutputFormat::HumanReadable => builder.try_init(),
        OutputFormat::Json => builder.json().try_init(),
    };
}
