use tracing::Level;

/// Install the `tracing` subscriber at INFO; `RUST_LOG` overrides it
///
/// ```bash
/// RUST_LOG=debug mvp run ...
/// RUST_LOG=mvp_core=trace mvp triangulate ...
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .init();
}
