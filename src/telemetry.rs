use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Diagnostics go to stderr so stdout stays a clean CSV report.
///
/// `RUST_LOG` overrides the default `warn` level. Calling this twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
