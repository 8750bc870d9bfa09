use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global fmt subscriber.
///
/// Verbosity comes from `RUST_LOG` and defaults to `info`. Calling this twice
/// is harmless; the second install is ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
