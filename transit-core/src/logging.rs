//! Logging Infrastructure
//!
//! Structured logging setup for development and production. The level
//! defaults to `info` and can be overridden through `RUST_LOG`
//! (EnvFilter syntax, e.g. `RUST_LOG=transit_core=debug,audit=info`).

/// Initialize the logger with the default filter
pub fn init_logger() {
    init_logger_with_level(None);
}

/// Initialize the logger with an explicit default level
pub fn init_logger_with_level(level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.unwrap_or("info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false)
        .init();
}
