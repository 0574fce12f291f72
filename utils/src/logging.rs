//! Tracing setup for tests and tools that do not carry a pool config.

/// Install a subscriber that writes through the test harness's capture.
///
/// Filtering follows `RUST_LOG`. Calling it again is a no-op, so every test
/// may call it.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
