use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter, e.g. `KILLTIMER_LOG=debug`.
pub const LOG_ENV: &str = "KILLTIMER_LOG";

/// Install a stderr subscriber. Quiet (`warn`) unless `verbose` or
/// `KILLTIMER_LOG` says otherwise, so the progress line stays readable.
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
