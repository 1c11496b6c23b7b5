pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

/// Install the stderr log subscriber. Filtering follows `RUST_LOG`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
